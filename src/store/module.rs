use super::completion::Completion;
use super::store::{evaluate_getter, GetterRecord, Store};
use crate::error::Result;
use crate::namespace::NamespacePath;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Produces a fresh copy of a module's initial state.
pub type StateFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Synchronous state transition on the module-local state.
pub type MutationHandler = Arc<dyn Fn(&mut Value, Value) -> Result<()> + Send + Sync>;

/// Asynchronous operation; invoked at dispatch time, its future is spawned.
pub type ActionHandler =
    Arc<dyn Fn(ActionContext, Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Derived read over module-local state and getters.
pub type GetterHandler = Arc<dyn Fn(&GetterScope<'_>, Value) -> Result<Value> + Send + Sync>;

/// Native module description consumed by [`Store`].
///
/// This is the shape every class module compiles to:
/// `{ state, mutations, actions, getters, modules, namespaced }`.
/// It can also be written by hand and registered next to class modules.
///
/// ```ignore
/// let counter = Module::new()
///     .namespaced(true)
///     .state(|| json!({ "count": 0 }))
///     .mutation("increment", |state, _| {
///         state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
///         Ok(())
///     })
///     .getter("double", |scope, _| {
///         Ok(json!(scope.get("count")?.as_i64().unwrap_or(0) * 2))
///     });
/// ```
#[derive(Clone, Default)]
pub struct Module {
    pub(crate) state: Option<StateFactory>,
    pub(crate) mutations: BTreeMap<String, MutationHandler>,
    pub(crate) actions: BTreeMap<String, ActionHandler>,
    pub(crate) getters: BTreeMap<String, GetterHandler>,
    pub(crate) modules: BTreeMap<String, Module>,
    pub(crate) namespaced: bool,
}

impl Module {
    /// Create an empty, non-namespaced module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix this module's mutations, actions and getters with its key.
    pub fn namespaced(mut self, namespaced: bool) -> Self {
        self.namespaced = namespaced;
        self
    }

    /// Set the state factory. It should return a JSON object.
    pub fn state<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.state = Some(Arc::new(factory));
        self
    }

    pub fn mutation<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Value, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.mutations.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn action<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let handler: ActionHandler = Arc::new(move |ctx, payload| handler(ctx, payload).boxed());
        self.actions.insert(name.into(), handler);
        self
    }

    pub fn getter<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&GetterScope<'_>, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(handler));
        self
    }

    /// Add a nested module under `key`.
    pub fn module(mut self, key: impl Into<String>, module: Module) -> Self {
        self.modules.insert(key.into(), module);
        self
    }

    /// Overlay `other` onto this description.
    ///
    /// State objects are merged key by key and the handler maps are extended;
    /// `other` wins on collisions. The namespaced flag of `self` is kept.
    pub fn merge(mut self, other: Module) -> Module {
        self.state = match (self.state.take(), other.state) {
            (Some(base), Some(overlay)) => {
                let merged: StateFactory = Arc::new(move || merge_objects(base(), overlay()));
                Some(merged)
            }
            (base, overlay) => overlay.or(base),
        };
        self.mutations.extend(other.mutations);
        self.actions.extend(other.actions);
        self.getters.extend(other.getters);
        self.modules.extend(other.modules);
        self
    }

    pub fn is_namespaced(&self) -> bool {
        self.namespaced
    }

    pub fn mutation_names(&self) -> impl Iterator<Item = &str> {
        self.mutations.keys().map(String::as_str)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn getter_names(&self) -> impl Iterator<Item = &str> {
        self.getters.keys().map(String::as_str)
    }

    pub fn module_keys(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn submodule(&self, key: &str) -> Option<&Module> {
        self.modules.get(key)
    }

    /// Initial state of this module including every nested module's state.
    pub fn initial_state(&self) -> Value {
        let mut state = match &self.state {
            Some(factory) => factory(),
            None => Value::Object(Map::new()),
        };
        match &mut state {
            Value::Object(fields) => {
                for (key, module) in &self.modules {
                    fields.insert(key.clone(), module.initial_state());
                }
            }
            _ if !self.modules.is_empty() => {
                log::warn!("module state is not an object; nested module state is dropped");
            }
            _ => {}
        }
        state
    }

    pub(crate) fn descendant(&self, path: &NamespacePath) -> Option<&Module> {
        path.segments()
            .iter()
            .try_fold(self, |module, key| module.modules.get(key))
    }

    pub(crate) fn descendant_mut(&mut self, path: &NamespacePath) -> Option<&mut Module> {
        path.segments()
            .iter()
            .try_fold(self, |module, key| module.modules.get_mut(key))
    }

    pub(crate) fn set_state_factory(&mut self, factory: StateFactory) {
        self.state = Some(factory);
    }

    pub(crate) fn insert_mutation(&mut self, name: String, handler: MutationHandler) {
        self.mutations.insert(name, handler);
    }

    pub(crate) fn insert_action(&mut self, name: String, handler: ActionHandler) {
        self.actions.insert(name, handler);
    }

    pub(crate) fn insert_getter(&mut self, name: String, handler: GetterHandler) {
        self.getters.insert(name, handler);
    }

    pub(crate) fn insert_module(&mut self, key: String, module: Module) {
        self.modules.insert(key, module);
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("namespaced", &self.namespaced)
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("modules", &self.modules)
            .finish()
    }
}

fn merge_objects(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            base.extend(overlay);
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

/// Context handed to action handlers.
///
/// `commit`, `dispatch` and `getter` are qualified with the namespace of the
/// module that registered the action.
#[derive(Clone)]
pub struct ActionContext {
    store: Store,
    path: NamespacePath,
    namespace: NamespacePath,
}

impl ActionContext {
    pub(crate) fn new(store: Store, path: NamespacePath, namespace: NamespacePath) -> Self {
        Self {
            store,
            path,
            namespace,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Location of the module in the module tree.
    pub fn path(&self) -> &NamespacePath {
        &self.path
    }

    /// Namespace used to qualify this module's members.
    pub fn namespace(&self) -> &NamespacePath {
        &self.namespace
    }

    pub fn commit(&self, name: &str, payload: Value) -> Result<()> {
        self.store.commit(&self.namespace.qualify(name), payload)
    }

    pub fn dispatch(&self, name: &str, payload: Value) -> Result<Completion> {
        self.store.dispatch(&self.namespace.qualify(name), payload)
    }

    pub fn getter(&self, name: &str) -> Result<Value> {
        self.store.getter(&self.namespace.qualify(name))
    }

    /// Snapshot of the module-local state.
    pub fn state(&self) -> Value {
        self.store.state_at(&self.path).unwrap_or(Value::Null)
    }

    pub fn root_state(&self) -> Value {
        self.store.state()
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("path", &self.path)
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Read-only view handed to getter handlers.
///
/// State fields and sibling getters are reachable by name through
/// [`GetterScope::get`]; getters are evaluated lazily, on first reference.
pub struct GetterScope<'a> {
    pub(crate) root: &'a Value,
    pub(crate) state: &'a Value,
    pub(crate) namespace: &'a NamespacePath,
    pub(crate) getters: &'a HashMap<String, GetterRecord>,
}

impl<'a> GetterScope<'a> {
    /// Module-local state.
    pub fn state(&self) -> &'a Value {
        self.state
    }

    pub fn root_state(&self) -> &'a Value {
        self.root
    }

    /// A local state field, if present.
    pub fn field(&self, key: &str) -> Option<&'a Value> {
        self.state.get(key)
    }

    /// Evaluate a getter of this module.
    pub fn getter(&self, name: &str) -> Result<Value> {
        self.getter_with(name, Value::Null)
    }

    /// Evaluate a callable getter of this module with an argument.
    pub fn getter_with(&self, name: &str, args: Value) -> Result<Value> {
        evaluate_getter(self.getters, self.root, &self.namespace.qualify(name), args)
    }

    /// Evaluate a getter by its fully qualified name.
    pub fn root_getter(&self, qualified: &str) -> Result<Value> {
        evaluate_getter(self.getters, self.root, qualified, Value::Null)
    }

    /// State field or getter, whichever the module declares under `key`.
    pub fn get(&self, key: &str) -> Result<Value> {
        match self.field(key) {
            Some(value) => Ok(value.clone()),
            None => self.getter(key),
        }
    }
}
