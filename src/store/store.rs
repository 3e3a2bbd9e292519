use super::completion::{current_runtime, Completion};
use super::module::{ActionContext, ActionHandler, GetterHandler, GetterScope, Module, MutationHandler};
use crate::error::{Error, Result};
use crate::namespace::NamespacePath;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Subscriber = Arc<dyn Fn(&MutationEvent, &Value) + Send + Sync>;

/// A committed mutation, as seen by subscribers.
#[derive(Clone, Debug, PartialEq)]
pub struct MutationEvent {
    /// Qualified mutation type
    pub kind: String,
    pub payload: Value,
}

#[derive(Clone)]
pub(crate) struct MutationRecord {
    handler: MutationHandler,
    path: NamespacePath,
}

#[derive(Clone)]
pub(crate) struct ActionRecord {
    handler: ActionHandler,
    path: NamespacePath,
    namespace: NamespacePath,
}

#[derive(Clone)]
pub(crate) struct GetterRecord {
    handler: GetterHandler,
    path: NamespacePath,
    namespace: NamespacePath,
}

/// Handlers of every installed module, keyed by qualified identifier.
#[derive(Default)]
struct Handlers {
    mutations: HashMap<String, Vec<MutationRecord>>,
    actions: HashMap<String, Vec<ActionRecord>>,
    getters: HashMap<String, GetterRecord>,
}

impl Handlers {
    fn collect(root: &Module) -> Self {
        let mut handlers = Self::default();
        handlers.install(root, NamespacePath::root(), NamespacePath::root());
        handlers
    }

    fn install(&mut self, module: &Module, path: NamespacePath, namespace: NamespacePath) {
        for (name, handler) in &module.mutations {
            self.mutations
                .entry(namespace.qualify(name))
                .or_default()
                .push(MutationRecord {
                    handler: Arc::clone(handler),
                    path: path.clone(),
                });
        }
        for (name, handler) in &module.actions {
            self.actions
                .entry(namespace.qualify(name))
                .or_default()
                .push(ActionRecord {
                    handler: Arc::clone(handler),
                    path: path.clone(),
                    namespace: namespace.clone(),
                });
        }
        for (name, handler) in &module.getters {
            let qualified = namespace.qualify(name);
            if self.getters.contains_key(&qualified) {
                log::warn!("duplicate getter `{qualified}` at `{path}` ignored");
                continue;
            }
            self.getters.insert(
                qualified,
                GetterRecord {
                    handler: Arc::clone(handler),
                    path: path.clone(),
                    namespace: namespace.clone(),
                },
            );
        }
        for (key, child) in &module.modules {
            let mut child_namespace = namespace.clone();
            if child.namespaced {
                child_namespace.push(key);
            }
            self.install(child, path.child(key), child_namespace);
        }
    }
}

/// Store runtime: a state tree driven by commits, dispatches and getters.
///
/// Cloning a store is cheap and yields another handle to the same state.
pub struct Store {
    state: Arc<RwLock<Value>>,
    modules: Arc<RwLock<Module>>,
    handlers: Arc<RwLock<Handlers>>,
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl Store {
    /// Create a store from a root module description.
    pub fn new(root: Module) -> Self {
        let state = root.initial_state();
        let handlers = Handlers::collect(&root);
        log::debug!(
            "store created: {} mutation(s), {} action(s), {} getter(s)",
            handlers.mutations.len(),
            handlers.actions.len(),
            handlers.getters.len()
        );
        Self {
            state: Arc::new(RwLock::new(state)),
            modules: Arc::new(RwLock::new(root)),
            handlers: Arc::new(RwLock::new(handlers)),
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get a clone of the whole state tree.
    pub fn state(&self) -> Value {
        self.state.read().clone()
    }

    /// Clone of the state of the module at `path`.
    pub fn state_at(&self, path: &NamespacePath) -> Option<Value> {
        local_state(&self.state.read(), path).cloned()
    }

    /// Read state without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Value) -> R,
    {
        let state = self.state.read();
        f(&state)
    }

    /// Swap the whole state tree, e.g. for time travel or hot reload.
    pub fn replace_state(&self, state: Value) {
        *self.state.write() = state;
    }

    /// Run every mutation registered under `kind`.
    pub fn commit(&self, kind: &str, payload: Value) -> Result<()> {
        let records = self
            .handlers
            .read()
            .mutations
            .get(kind)
            .cloned()
            .ok_or_else(|| Error::UnknownMutation(kind.to_string()))?;
        {
            let mut state = self.state.write();
            let mut undo: Vec<(&NamespacePath, Value)> = Vec::with_capacity(records.len());
            let mut outcome = Ok(());
            for record in &records {
                let Some(local) = local_state_mut(&mut state, &record.path) else {
                    outcome = Err(Error::ModuleNotFound(record.path.to_string()));
                    break;
                };
                undo.push((&record.path, local.clone()));
                outcome = (record.handler)(local, payload.clone());
                if outcome.is_err() {
                    break;
                }
            }
            if let Err(e) = outcome {
                // newest first; a parent snapshot covers its children
                for (path, previous) in undo.into_iter().rev() {
                    if let Some(local) = local_state_mut(&mut state, path) {
                        *local = previous;
                    }
                }
                log::debug!("commit `{kind}` failed, state restored: {e}");
                return Err(e);
            }
        }
        log::trace!("committed `{kind}`");
        self.notify(&MutationEvent {
            kind: kind.to_string(),
            payload,
        });
        Ok(())
    }

    /// Start every action registered under `kind`.
    ///
    /// Handlers are invoked before this returns; their futures run on the
    /// current tokio runtime.
    pub fn dispatch(&self, kind: &str, payload: Value) -> Result<Completion> {
        let records = self
            .handlers
            .read()
            .actions
            .get(kind)
            .cloned()
            .ok_or_else(|| Error::UnknownAction(kind.to_string()))?;
        let runtime = current_runtime(kind)?;
        log::trace!("dispatching `{kind}`");

        let mut pending: Vec<BoxFuture<'static, Result<Value>>> = records
            .into_iter()
            .map(|record| {
                let ctx = ActionContext::new(self.clone(), record.path, record.namespace);
                (record.handler)(ctx, payload.clone())
            })
            .collect();

        let task = if pending.len() == 1 {
            pending.remove(0)
        } else {
            async move {
                let outcomes = futures::future::join_all(pending).await;
                outcomes
                    .into_iter()
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            }
            .boxed()
        };
        Ok(Completion::spawn(&runtime, task))
    }

    /// Evaluate a getter by qualified name.
    pub fn getter(&self, name: &str) -> Result<Value> {
        self.getter_with(name, Value::Null)
    }

    /// Evaluate a callable getter by qualified name.
    pub fn getter_with(&self, name: &str, args: Value) -> Result<Value> {
        let handlers = self.handlers.read();
        let state = self.state.read();
        evaluate_getter(&handlers.getters, &state, name, args)
    }

    /// Qualified names of every installed getter.
    pub fn getter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().getters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Install `module` at `path` (below an already registered parent).
    pub fn register_module(&self, path: impl Into<NamespacePath>, module: Module) -> Result<()> {
        let path = path.into();
        let (parent, key) = path.split_last().ok_or_else(|| {
            Error::Configuration("cannot register a module at the root path".to_string())
        })?;
        {
            let mut root = self.modules.write();
            let parent_module = root
                .descendant_mut(&parent)
                .ok_or_else(|| Error::ModuleNotFound(parent.to_string()))?;
            let mut state = self.state.write();
            let parent_state = local_state_mut(&mut state, &parent)
                .and_then(Value::as_object_mut)
                .ok_or_else(|| Error::ModuleNotFound(parent.to_string()))?;
            parent_state.insert(key.to_string(), module.initial_state());
            parent_module.modules.insert(key.to_string(), module);
        }
        self.reinstall();
        log::debug!("registered module at `{path}`");
        Ok(())
    }

    /// Remove the module at `path` together with its state and handlers.
    ///
    /// Unregistering a path that is not registered is a no-op.
    pub fn unregister_module(&self, path: impl Into<NamespacePath>) -> Result<()> {
        let path = path.into();
        let Some((parent, key)) = path.split_last() else {
            return Err(Error::Configuration(
                "cannot unregister the root module".to_string(),
            ));
        };
        {
            let mut root = self.modules.write();
            let removed = root
                .descendant_mut(&parent)
                .and_then(|module| module.modules.remove(key));
            if removed.is_none() {
                log::warn!("module `{path}` is not registered; nothing to unregister");
                return Ok(());
            }
            let mut state = self.state.write();
            if let Some(fields) = local_state_mut(&mut state, &parent).and_then(Value::as_object_mut) {
                fields.remove(key);
            }
        }
        self.reinstall();
        log::debug!("unregistered module at `{path}`");
        Ok(())
    }

    /// True when a module is installed at `path`.
    pub fn has_module(&self, path: &NamespacePath) -> bool {
        !path.is_root() && self.modules.read().descendant(path).is_some()
    }

    /// Namespace used to qualify members of the module at `path`.
    pub fn namespace_of(&self, path: &NamespacePath) -> Option<NamespacePath> {
        let root = self.modules.read();
        let mut module = &*root;
        let mut namespace = NamespacePath::root();
        for key in path.segments() {
            module = module.modules.get(key)?;
            if module.namespaced {
                namespace.push(key);
            }
        }
        Some(namespace)
    }

    /// Subscribe to committed mutations.
    ///
    /// The callback runs after every successful commit with a snapshot of the
    /// new state. No store lock is held while it runs, so it may commit or
    /// subscribe itself.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&MutationEvent, &Value) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Arc::new(callback));
    }

    /// Notify all subscribers of a committed mutation.
    fn notify(&self, event: &MutationEvent) {
        let subscribers: Vec<Subscriber> = self.subscribers.read().clone();
        if subscribers.is_empty() {
            return;
        }
        let state = self.state();
        for subscriber in &subscribers {
            subscriber(event, &state);
        }
    }

    fn reinstall(&self) {
        let handlers = Handlers::collect(&self.modules.read());
        *self.handlers.write() = handlers;
    }
}

impl Clone for Store {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            modules: Arc::clone(&self.modules),
            handlers: Arc::clone(&self.handlers),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

pub(crate) fn evaluate_getter(
    getters: &HashMap<String, GetterRecord>,
    root: &Value,
    name: &str,
    args: Value,
) -> Result<Value> {
    let record = getters
        .get(name)
        .ok_or_else(|| Error::UnknownGetter(name.to_string()))?;
    let state = local_state(root, &record.path).unwrap_or(&Value::Null);
    let scope = GetterScope {
        root,
        state,
        namespace: &record.namespace,
        getters,
    };
    (record.handler)(&scope, args)
}

pub(crate) fn local_state<'a>(root: &'a Value, path: &NamespacePath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |state, key| state.get(key))
}

fn local_state_mut<'a>(root: &'a mut Value, path: &NamespacePath) -> Option<&'a mut Value> {
    path.segments()
        .iter()
        .try_fold(root, |state, key| state.get_mut(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Module {
        Module::new()
            .state(|| json!({ "count": 0 }))
            .mutation("increment", |state, payload| {
                let by = payload.as_i64().unwrap_or(1);
                state["count"] = json!(state["count"].as_i64().unwrap_or(0) + by);
                Ok(())
            })
            .getter("double", |scope, _| {
                Ok(json!(scope.get("count")?.as_i64().unwrap_or(0) * 2))
            })
            .getter("quadruple", |scope, _| {
                Ok(json!(scope.getter("double")?.as_i64().unwrap_or(0) * 2))
            })
    }

    #[test]
    fn store_commit_and_getters() {
        let store = Store::new(counter());
        store.commit("increment", json!(5)).unwrap();
        assert_eq!(store.state()["count"], json!(5));
        assert_eq!(store.getter("double").unwrap(), json!(10));
        assert_eq!(store.getter("quadruple").unwrap(), json!(20));
    }

    #[test]
    fn store_unknown_types() {
        let store = Store::new(counter());
        assert_eq!(
            store.commit("nope", Value::Null),
            Err(Error::UnknownMutation("nope".to_string()))
        );
        assert_eq!(
            store.getter("nope"),
            Err(Error::UnknownGetter("nope".to_string()))
        );
    }

    #[test]
    fn store_namespacing() {
        let root = Module::new()
            .module("a", counter().namespaced(true).module("b", counter().namespaced(true)))
            .module("plain", counter());
        let store = Store::new(root);

        store.commit("a/increment", json!(1)).unwrap();
        store.commit("a/b/increment", json!(2)).unwrap();
        // the non-namespaced module registers under the root namespace
        store.commit("increment", json!(3)).unwrap();

        let state = store.state();
        assert_eq!(state["a"]["count"], json!(1));
        assert_eq!(state["a"]["b"]["count"], json!(2));
        assert_eq!(state["plain"]["count"], json!(3));
        assert_eq!(store.getter("a/b/double").unwrap(), json!(4));
        assert_eq!(
            store.namespace_of(&NamespacePath::parse("plain")),
            Some(NamespacePath::root())
        );
        assert_eq!(
            store.namespace_of(&NamespacePath::parse("a/b")),
            Some(NamespacePath::parse("a/b"))
        );
    }

    #[test]
    fn store_register_and_unregister() {
        let store = Store::new(Module::new());
        let path = NamespacePath::parse("dyn");
        assert!(!store.has_module(&path));

        store.register_module("dyn", counter().namespaced(true)).unwrap();
        assert!(store.has_module(&path));
        store.commit("dyn/increment", json!(2)).unwrap();
        assert_eq!(store.state()["dyn"]["count"], json!(2));

        store.unregister_module("dyn").unwrap();
        assert!(!store.has_module(&path));
        assert!(store.state().get("dyn").is_none());
        assert!(store.commit("dyn/increment", json!(1)).is_err());
        // idempotent
        store.unregister_module("dyn").unwrap();
    }

    #[test]
    fn store_register_requires_parent() {
        let store = Store::new(Module::new());
        assert_eq!(
            store.register_module(["missing", "child"], counter()),
            Err(Error::ModuleNotFound("missing".to_string()))
        );
        assert!(matches!(
            store.register_module("", counter()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn store_subscribe() {
        let store = Store::new(counter());
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        store.subscribe(move |event, state| {
            assert_eq!(event.kind, "increment");
            assert!(state["count"].as_i64().unwrap() > 0);
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(call_count.load(Ordering::SeqCst), 0);
        store.commit("increment", json!(1)).unwrap();
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        store.commit("increment", json!(1)).unwrap();
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_commit_leaves_state_untouched() {
        let root = Module::new()
            .state(|| json!({ "a": 1 }))
            .mutation("fail", |state, _| {
                state["a"] = json!(99);
                Ok(())
            })
            .module(
                "child",
                Module::new()
                    .state(|| json!({ "b": 1 }))
                    .mutation("fail", |state, _| {
                        state["b"] = json!(99);
                        Err(Error::action("fail"))
                    }),
            );
        let store = Store::new(root);
        let notified = Arc::new(AtomicUsize::new(0));
        let notified_clone = notified.clone();
        store.subscribe(move |_, _| {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(
            store.commit("fail", Value::Null),
            Err(Error::Action("fail".to_string()))
        );
        // the root handler succeeded before the child one failed; neither write survives
        assert_eq!(store.state(), json!({ "a": 1, "child": { "b": 1 } }));
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscriber_may_commit() {
        let store = Store::new(
            counter().mutation("log", |state, _| {
                state["logged"] = json!(true);
                Ok(())
            }),
        );
        let inner = store.clone();
        store.subscribe(move |event, _| {
            if event.kind == "increment" {
                inner.commit("log", Value::Null).unwrap();
            }
        });

        store.commit("increment", json!(1)).unwrap();
        assert_eq!(store.state()["logged"], json!(true));
    }

    #[tokio::test]
    async fn store_dispatch_runs_action() {
        let root = counter().action("bump", |ctx, payload| async move {
            ctx.commit("increment", payload)?;
            ctx.getter("double")
        });
        let store = Store::new(root);
        let doubled = store.dispatch("bump", json!(4)).unwrap().await.unwrap();
        assert_eq!(doubled, json!(8));
        assert!(matches!(
            store.dispatch("nope", Value::Null),
            Err(Error::UnknownAction(_))
        ));
    }

    #[test]
    fn store_replace_state() {
        let store = Store::new(counter());
        store.replace_state(json!({ "count": 21 }));
        assert_eq!(store.getter("double").unwrap(), json!(42));
    }
}
