//! Compile declaring objects into store module descriptions.
//!
//! The state factory is seeded with the initial value of every state,
//! get-set and model field, one class layer at a time from the base class
//! down, so a subclass redeclaring a key wins whatever the kind. The object's
//! own initial values come last. Mutation bodies run against a
//! [`MutationScope`]; action bodies run against the live module of the
//! object, bound through the directory at dispatch time. Declared submodules
//! compile recursively and are always namespaced.

use crate::binding::LiveModule;
use crate::class::{
    ActionBody, Class, GetSetEntry, ModelEntry, ModuleObject, MutationScope, StateEntry,
};
use crate::debounce::Debouncer;
use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::runtime::ModuleStore;
use crate::store::{ActionContext, ActionHandler, Module, MutationHandler, StateFactory};
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;

pub(crate) fn compile(
    object: &Arc<ModuleObject>,
    directory: &Arc<RwLock<Directory>>,
    namespaced: bool,
) -> Result<Module> {
    let class = object.class();
    let mut module = Module::new().namespaced(namespaced);

    let mut initial = Map::new();
    let layers: Vec<&Class> = class.ancestry().collect();
    for layer in layers.into_iter().rev() {
        for entry in layer.own::<StateEntry>() {
            initial.insert(entry.key, entry.initial);
        }
        for entry in layer.own::<GetSetEntry>() {
            initial.insert(entry.key, entry.initial);
        }
        for entry in layer.own::<ModelEntry>() {
            initial.insert(entry.key, entry.initial);
        }
    }
    initial.extend(object.initial_overrides().clone());
    let initial = Value::Object(initial);
    let factory: StateFactory = Arc::new(move || initial.clone());
    module.set_state_factory(factory);

    for entry in class.mutations() {
        let key = entry.key.clone();
        let object = Arc::clone(object);
        let handler: MutationHandler = Arc::new(move |state: &mut Value, payload| {
            let fields = state_fields(state, &object)?;
            let overridden = entry.overridden.clone();
            let mut scope = MutationScope::new(fields, &object, &entry.key, overridden);
            (entry.body)(&mut scope, payload)
        });
        module.insert_mutation(key, handler);
    }
    let assignments = class
        .getsets()
        .into_iter()
        .map(|entry| (entry.mutation, entry.key))
        .chain(class.models().into_iter().map(|entry| (entry.mutation, entry.key)));
    for (mutation, key) in assignments {
        let object = Arc::clone(object);
        let handler: MutationHandler = Arc::new(move |state: &mut Value, payload| {
            state_fields(state, &object)?.insert(key.clone(), payload);
            Ok(())
        });
        module.insert_mutation(mutation, handler);
    }

    for entry in class.actions() {
        let handler = match entry.options.debounce {
            None => action_handler(object, directory, entry.body),
            Some(window) => {
                debounced_handler(object, directory, entry.body, Debouncer::new(window))
            }
        };
        module.insert_action(entry.key, handler);
    }
    for entry in class.models() {
        let mutation = entry.mutation;
        let followup = entry.followup;
        let handler: ActionHandler = Arc::new(move |ctx: ActionContext, payload: Value| {
            let dispatched = ctx
                .commit(&mutation, payload)
                .and_then(|()| ctx.dispatch(&followup, Value::Null));
            async move { dispatched?.await }.boxed()
        });
        module.insert_action(entry.action, handler);
    }

    for entry in class.getters() {
        module.insert_getter(entry.name, entry.body);
    }

    for (key, child) in object.modules() {
        if key.is_empty() {
            return Err(Error::Configuration(format!(
                "`{}` declares a submodule with an empty key",
                class.name()
            )));
        }
        module.insert_module(key.clone(), compile(child, directory, true)?);
    }

    if let Some(merged) = object.merged() {
        module = module.merge(merged.clone());
    }
    log::trace!(
        "compiled `{}`: {} mutation(s), {} action(s), {} getter(s)",
        class.name(),
        module.mutation_names().count(),
        module.action_names().count(),
        module.getter_names().count()
    );
    Ok(module)
}

fn state_fields<'a>(
    state: &'a mut Value,
    object: &ModuleObject,
) -> Result<&'a mut Map<String, Value>> {
    state.as_object_mut().ok_or_else(|| {
        Error::Configuration(format!(
            "state of `{}` is not an object",
            object.class().name()
        ))
    })
}

fn bind(
    ctx: &ActionContext,
    directory: &Arc<RwLock<Directory>>,
    object: &Arc<ModuleObject>,
) -> Result<LiveModule> {
    ModuleStore::from_parts(ctx.store().clone(), Arc::clone(directory)).bind(object)
}

fn action_handler(
    object: &Arc<ModuleObject>,
    directory: &Arc<RwLock<Directory>>,
    body: ActionBody,
) -> ActionHandler {
    let object = Arc::clone(object);
    let directory = Arc::clone(directory);
    Arc::new(move |ctx: ActionContext, payload: Value| match bind(&ctx, &directory, &object) {
        Ok(this) => body(this, payload),
        Err(e) => futures::future::ready(Err(e)).boxed(),
    })
}

fn debounced_handler(
    object: &Arc<ModuleObject>,
    directory: &Arc<RwLock<Directory>>,
    body: ActionBody,
    debouncer: Debouncer,
) -> ActionHandler {
    let object = Arc::clone(object);
    let directory = Arc::clone(directory);
    Arc::new(move |ctx: ActionContext, payload: Value| match bind(&ctx, &directory, &object) {
        Ok(this) => {
            let body = Arc::clone(&body);
            debouncer.call(payload, move |payload| body(this, payload))
        }
        Err(e) => futures::future::ready(Err(e)).boxed(),
    })
}
