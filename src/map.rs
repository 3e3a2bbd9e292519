//! Key maps for host adapters.
//!
//! A UI adapter needs every readable key of a module class (state, getters,
//! get-sets and models) and every invocable one (mutations and actions),
//! each individually resolvable by string. The maps here list those keys,
//! optionally filtered and renamed, and resolve the live module again on
//! every access so they follow dynamic (un)registration.

use crate::binding::LiveModule;
use crate::class::Class;
use crate::error::{Error, Result};
use crate::runtime::ModuleStore;
use crate::store::Completion;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type KeyTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Key filtering and renaming. Neither is interpreted beyond the mapping.
#[derive(Clone, Default)]
pub struct MapOptions {
    pub exclude: Vec<String>,
    pub transform_key: Option<KeyTransform>,
}

impl MapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn transform_key<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.transform_key = Some(Arc::new(f));
        self
    }

    fn admits(&self, key: &str) -> bool {
        !self.exclude.iter().any(|excluded| excluded == key)
    }

    fn rename(&self, key: &str) -> String {
        match &self.transform_key {
            Some(transform) => transform(key),
            None => key.to_string(),
        }
    }
}

impl fmt::Debug for MapOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapOptions")
            .field("exclude", &self.exclude)
            .field("transform_key", &self.transform_key.is_some())
            .finish()
    }
}

/// A module key under the name an adapter exposes it as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappedKey {
    /// Exposed name, after `transform_key`
    pub name: String,
    /// Member key on the module
    pub key: String,
    /// Get-set and model keys accept assignment
    pub writable: bool,
}

fn collect(options: &MapOptions, keys: impl IntoIterator<Item = (String, bool)>) -> Vec<MappedKey> {
    let mut mapped: Vec<MappedKey> = Vec::new();
    for (key, writable) in keys {
        if !options.admits(&key) || mapped.iter().any(|m| m.key == key) {
            continue;
        }
        mapped.push(MappedKey {
            name: options.rename(&key),
            key,
            writable,
        });
    }
    mapped
}

/// Readable keys of `class`: state, getter, get-set and model keys, in that order.
pub fn computed_keys(class: &Class, options: &MapOptions) -> Vec<MappedKey> {
    let states = class.states().into_iter().map(|s| (s.key, false));
    let getters = class.getters().into_iter().map(|g| (g.name, false));
    let getsets = class.getsets().into_iter().map(|g| (g.key, true));
    let models = class.models().into_iter().map(|m| (m.key, true));
    collect(options, states.chain(getters).chain(getsets).chain(models))
}

/// Invocable keys of `class`: mutation keys, then action keys.
pub fn method_keys(class: &Class, options: &MapOptions) -> Vec<MappedKey> {
    let mutations = class.mutations().into_iter().map(|m| (m.key, false));
    let actions = class.actions().into_iter().map(|a| (a.key, false));
    collect(options, mutations.chain(actions))
}

struct Target {
    store: ModuleStore,
    class: Class,
    namespace: String,
}

impl Target {
    fn live(&self) -> Result<LiveModule> {
        self.store.get_module(&self.class, &self.namespace)
    }

    fn find<'a>(&self, keys: &'a [MappedKey], name: &str) -> Result<&'a MappedKey> {
        keys.iter()
            .find(|mapped| mapped.name == name)
            .ok_or_else(|| Error::UnknownMember {
                class: self.class.name().to_string(),
                key: name.to_string(),
            })
    }
}

/// Computed-property map of one module.
pub struct ComputedMap {
    target: Target,
    keys: Vec<MappedKey>,
}

impl ComputedMap {
    pub fn keys(&self) -> &[MappedKey] {
        &self.keys
    }

    /// Read by exposed name. Callable getters are evaluated without an argument.
    pub fn get(&self, name: &str) -> Result<Value> {
        let mapped = self.target.find(&self.keys, name)?;
        self.target.live()?.get(&mapped.key)
    }

    /// Assign by exposed name. Only get-set and model keys are writable.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        let mapped = self.target.find(&self.keys, name)?;
        if !mapped.writable {
            return Err(Error::ReadOnly(name.to_string()));
        }
        self.target.live()?.set(&mapped.key, value)
    }
}

/// Method map of one module.
pub struct MethodMap {
    target: Target,
    keys: Vec<MappedKey>,
}

impl MethodMap {
    pub fn keys(&self) -> &[MappedKey] {
        &self.keys
    }

    /// Invoke by exposed name.
    pub fn call(&self, name: &str, payload: Value) -> Completion {
        let live = self
            .target
            .find(&self.keys, name)
            .and_then(|mapped| Ok((mapped, self.target.live()?)));
        match live {
            Ok((mapped, live)) => live.call(&mapped.key, payload),
            Err(e) => Completion::ready(Err(e)),
        }
    }
}

/// Computed map of the `class` module at `namespace` in `store`.
pub fn map_computed(
    store: &ModuleStore,
    class: &Class,
    namespace: &str,
    options: &MapOptions,
) -> ComputedMap {
    ComputedMap {
        target: Target {
            store: store.clone(),
            class: class.clone(),
            namespace: namespace.to_string(),
        },
        keys: computed_keys(class, options),
    }
}

/// Method map of the `class` module at `namespace` in `store`.
pub fn map_methods(
    store: &ModuleStore,
    class: &Class,
    namespace: &str,
    options: &MapOptions,
) -> MethodMap {
    MethodMap {
        target: Target {
            store: store.clone(),
            class: class.clone(),
            namespace: namespace.to_string(),
        },
        keys: method_keys(class, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn todo() -> Class {
        Class::builder("Todo")
            .state("items", json!(["a", "b"]))
            .getset("draft", json!(""))
            .model("filter", json!(""), "refresh")
            .getter("count", |this| {
                Ok(json!(this.get("items")?.as_array().map_or(0, Vec::len)))
            })
            .mutation("clear", |this, _| this.set("items", json!([])))
            .action("refresh", |_, _| async { Ok(Value::Null) })
            .build()
    }

    #[test]
    fn key_lists() {
        let class = todo();
        let names: Vec<_> = computed_keys(&class, &MapOptions::new())
            .into_iter()
            .map(|m| (m.name, m.writable))
            .collect();
        assert_eq!(
            names,
            [
                ("items".to_string(), false),
                ("count".to_string(), false),
                ("draft".to_string(), true),
                ("filter".to_string(), true),
            ]
        );

        let options = MapOptions::new()
            .exclude(["clear"])
            .transform_key(|key| format!("todo_{key}"));
        let methods: Vec<_> = method_keys(&class, &options)
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(methods, ["todo_refresh"]);
    }

    #[test]
    fn computed_map_reads_and_writes() {
        let class = todo();
        let store = ModuleStore::new(&class).unwrap();
        let computed = map_computed(&store, &class, "", &MapOptions::new());

        assert_eq!(computed.get("count").unwrap(), json!(2));
        computed.set("draft", json!("milk")).unwrap();
        assert_eq!(store.state()["draft"], json!("milk"));
        assert_eq!(
            computed.set("count", json!(1)),
            Err(Error::ReadOnly("count".to_string()))
        );
        assert!(matches!(
            computed.get("missing"),
            Err(Error::UnknownMember { .. })
        ));
    }

    #[tokio::test]
    async fn method_map_invokes() {
        let class = todo();
        let store = ModuleStore::new(&class).unwrap();
        let methods = map_methods(&store, &class, "", &MapOptions::new());

        methods.call("clear", Value::Null).await.unwrap();
        assert_eq!(store.state()["items"], json!([]));
        assert_eq!(methods.call("refresh", Value::Null).await.unwrap(), Value::Null);
    }
}
