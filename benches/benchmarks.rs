use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::hint::black_box;

use tinclass::{Class, ModuleStore};

fn counter() -> Class {
    Class::builder("Counter")
        .getset("count", json!(0))
        .getter("double", |this| {
            Ok(json!(this.get("count")?.as_i64().unwrap_or(0) * 2))
        })
        .build()
}

fn nested() -> (Class, Class) {
    let leaf = Class::builder("Leaf").getset("value", json!(0)).build();
    let root = Class::builder("Root")
        .module("a", &Class::builder("Middle").module("b", &leaf).build())
        .build();
    (root, leaf)
}

fn store_creation_benchmark(c: &mut Criterion) {
    let (root, _) = nested();

    c.bench_function("store_creation", |b| {
        b.iter(|| black_box(ModuleStore::new(&root).unwrap()));
    });
}

fn commit_benchmark(c: &mut Criterion) {
    let class = counter();
    let store = ModuleStore::new(&class).unwrap();

    c.bench_function("commit", |b| {
        let mut i = 0;
        b.iter(|| {
            store.store().commit("SET_COUNT", black_box(json!(i))).unwrap();
            i += 1;
        });
    });
}

fn getter_benchmark(c: &mut Criterion) {
    let class = counter();
    let store = ModuleStore::new(&class).unwrap();

    c.bench_function("getter", |b| {
        b.iter(|| {
            black_box(store.store().getter("double").unwrap());
        });
    });
}

fn get_module_benchmark(c: &mut Criterion) {
    let (root, leaf) = nested();
    let store = ModuleStore::new(&root).unwrap();

    c.bench_function("get_module", |b| {
        b.iter(|| {
            black_box(store.get_module(&leaf, black_box("a/b")).unwrap());
        });
    });
}

fn live_property_benchmark(c: &mut Criterion) {
    let class = counter();
    let store = ModuleStore::new(&class).unwrap();
    let live = store.get_module(&class, "").unwrap();

    c.bench_function("live_get", |b| {
        b.iter(|| {
            black_box(live.get("count").unwrap());
        });
    });

    c.bench_function("live_set", |b| {
        let mut i = 0;
        b.iter(|| {
            live.set("count", black_box(json!(i))).unwrap();
            i += 1;
        });
    });
}

fn commit_subscribe_benchmark(c: &mut Criterion) {
    let class = counter();
    let mut group = c.benchmark_group("commit_subscribe");

    for subscriber_count in [1, 10, 100].iter() {
        let store = ModuleStore::new(&class).unwrap();

        for _ in 0..*subscriber_count {
            store.store().subscribe(|_, _| {
                // Empty subscriber
            });
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.store().commit("SET_COUNT", black_box(json!(i))).unwrap();
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    store_creation_benchmark,
    commit_benchmark,
    getter_benchmark,
    get_module_benchmark,
    live_property_benchmark,
    commit_subscribe_benchmark,
);
criterion_main!(benches);
