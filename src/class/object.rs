use super::registry::Class;
use crate::store::Module;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_OBJECT_ID: AtomicUsize = AtomicUsize::new(0);

/// An instance of a module class: the declaring object a store is built from.
///
/// Besides its class, an object carries its submodule map, plain instance
/// fields (configuration that is not reactive state), per-instance initial
/// state values and, optionally, a hand-written [`Module`] merged on top of
/// the compiled one.
pub struct ModuleObject {
    id: usize,
    class: Class,
    modules: BTreeMap<String, Arc<ModuleObject>>,
    fields: Map<String, Value>,
    initial: Map<String, Value>,
    merged: Option<Module>,
}

impl ModuleObject {
    /// Instantiate `class`, including every submodule it declares.
    pub fn new(class: &Class) -> Self {
        let modules = class
            .submodules()
            .into_iter()
            .map(|entry| (entry.key, Arc::new(ModuleObject::new(&entry.class))))
            .collect();
        Self {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            class: class.clone(),
            modules,
            fields: Map::new(),
            initial: Map::new(),
            merged: None,
        }
    }

    /// Set a plain instance field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Override the initial value of a state field for this instance.
    pub fn with_state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.initial.insert(key.into(), value);
        self
    }

    /// Add or replace a submodule.
    pub fn with_module(mut self, key: impl Into<String>, module: impl Into<Arc<ModuleObject>>) -> Self {
        self.modules.insert(key.into(), module.into());
        self
    }

    /// Merge a hand-written description on top of the compiled module.
    pub fn merge(mut self, module: Module) -> Self {
        self.merged = Some(match self.merged.take() {
            Some(existing) => existing.merge(module),
            None => module,
        });
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn class(&self) -> &Class {
        &self.class
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub(crate) fn initial_overrides(&self) -> &Map<String, Value> {
        &self.initial
    }

    pub fn module(&self, key: &str) -> Option<&Arc<ModuleObject>> {
        self.modules.get(key)
    }

    pub fn modules(&self) -> &BTreeMap<String, Arc<ModuleObject>> {
        &self.modules
    }

    pub(crate) fn merged(&self) -> Option<&Module> {
        self.merged.as_ref()
    }
}

impl Class {
    /// Shorthand for [`ModuleObject::new`].
    pub fn instantiate(&self) -> ModuleObject {
        ModuleObject::new(self)
    }
}

impl fmt::Debug for ModuleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleObject")
            .field("id", &self.id)
            .field("class", &self.class.name())
            .field("modules", &self.modules)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
