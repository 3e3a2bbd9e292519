use super::table::{Binding, Member, Method, Read, Write};
use crate::class::{Class, ModuleObject};
use crate::error::{Error, Result};
use crate::namespace::NamespacePath;
use crate::runtime::ModuleStore;
use crate::store::{local_state, Completion};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A declaring object bound to a store.
///
/// Members are reached by key: [`get`](LiveModule::get) and
/// [`set`](LiveModule::set) for properties, [`call`](LiveModule::call) for
/// mutations, actions and callable getters. Every access looks up the
/// module's current namespace and state, so replacing the state tree or
/// moving the module is observed immediately.
///
/// Resolving the same declaring object twice yields handles that are
/// [`ptr_eq`](LiveModule::ptr_eq): they share one cached member table.
#[derive(Clone)]
pub struct LiveModule {
    store: ModuleStore,
    object: Arc<ModuleObject>,
    binding: Arc<Binding>,
}

impl LiveModule {
    pub(crate) fn new(store: ModuleStore, object: Arc<ModuleObject>, binding: Arc<Binding>) -> Self {
        Self {
            store,
            object,
            binding,
        }
    }

    /// Store handle this module is bound to.
    pub fn handle(&self) -> &ModuleStore {
        &self.store
    }

    pub fn object(&self) -> &Arc<ModuleObject> {
        &self.object
    }

    pub fn class(&self) -> &Class {
        self.object.class()
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Location of the module in the module tree.
    pub fn path(&self) -> Result<NamespacePath> {
        self.store
            .directory()
            .read()
            .path_of(&self.object)
            .cloned()
            .ok_or_else(|| self.unregistered())
    }

    /// Namespace qualifying this module's mutations, actions and getters.
    pub fn namespace(&self) -> Result<NamespacePath> {
        let path = self.path()?;
        self.store
            .store()
            .namespace_of(&path)
            .ok_or_else(|| self.unregistered())
    }

    /// Snapshot of the module-local state.
    pub fn state(&self) -> Result<Value> {
        let path = self.path()?;
        self.store
            .store()
            .state_at(&path)
            .ok_or_else(|| Error::ModuleNotFound(path.to_string()))
    }

    /// Plain instance field of the declaring object.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.object.field(key)
    }

    /// Every member key, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.binding.keys().map(str::to_string).collect()
    }

    pub fn has(&self, key: &str) -> bool {
        self.binding.member(key).is_some()
    }

    /// Read a property.
    ///
    /// Callable getters are evaluated without an argument; a submodule key
    /// reads the submodule's state.
    pub fn get(&self, key: &str) -> Result<Value> {
        match self.member(key)? {
            Member::Property { read, .. } => self.read(read),
            Member::Method(Method::Getter(name)) => self.getter(name),
            Member::Method(_) => Err(Error::NotAProperty(key.to_string())),
            Member::Module(child) => self.module(child)?.state(),
        }
    }

    /// Assign a property.
    ///
    /// Get-set properties commit their mutation before this returns. Model
    /// properties dispatch their action; its commit has happened when this
    /// returns but the follow-up action runs detached. Use
    /// [`assign`](LiveModule::assign) to await it.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        match self.member(key)? {
            Member::Property {
                write: Some(Write::Commit(mutation)),
                ..
            } => self.commit(mutation, value),
            Member::Property {
                write: Some(Write::Dispatch(action)),
                ..
            } => self.dispatch(action, value).map(drop),
            _ => Err(Error::ReadOnly(key.to_string())),
        }
    }

    /// Assign a property and observe the outcome of the write.
    pub fn assign(&self, key: &str, value: Value) -> Completion {
        match self.member(key) {
            Ok(Member::Property {
                write: Some(Write::Dispatch(action)),
                ..
            }) => settle(self.dispatch(action, value)),
            Ok(_) => Completion::ready(self.set(key, value).map(|()| Value::Null)),
            Err(e) => Completion::ready(Err(e)),
        }
    }

    /// Invoke a method: commit a mutation, dispatch an action or evaluate a
    /// callable getter with `payload` as its argument.
    ///
    /// Mutations and getters run before this returns and yield a settled
    /// completion; actions are already running.
    pub fn call(&self, key: &str, payload: Value) -> Completion {
        let outcome = match self.member(key) {
            Ok(Member::Method(Method::Commit(mutation))) => {
                self.commit(mutation, payload).map(|()| Value::Null)
            }
            Ok(Member::Method(Method::Dispatch(action))) => {
                return settle(self.dispatch(action, payload))
            }
            Ok(Member::Method(Method::Getter(name))) => self.getter_with(name, payload),
            Ok(_) => Err(Error::NotCallable(key.to_string())),
            Err(e) => Err(e),
        };
        Completion::ready(outcome)
    }

    /// Commit a mutation of this module by name.
    pub fn commit(&self, name: &str, payload: Value) -> Result<()> {
        let namespace = self.namespace()?;
        self.store.store().commit(&namespace.qualify(name), payload)
    }

    /// Dispatch an action of this module by name.
    pub fn dispatch(&self, name: &str, payload: Value) -> Result<Completion> {
        let namespace = self.namespace()?;
        self.store.store().dispatch(&namespace.qualify(name), payload)
    }

    pub fn getter(&self, name: &str) -> Result<Value> {
        self.getter_with(name, Value::Null)
    }

    pub fn getter_with(&self, name: &str, args: Value) -> Result<Value> {
        let namespace = self.namespace()?;
        self.store.store().getter_with(&namespace.qualify(name), args)
    }

    /// Live module of the submodule under `key`, bound on first access.
    pub fn module(&self, key: &str) -> Result<LiveModule> {
        let child = self.object.module(key).ok_or_else(|| Error::UnknownMember {
            class: self.class().name().to_string(),
            key: key.to_string(),
        })?;
        self.store.bind(child)
    }

    /// Resolve another module, relative namespaces starting from this one.
    pub fn resolve(&self, class: &Class, namespace: &str) -> Result<LiveModule> {
        self.store.get_module_from(class, namespace, self)
    }

    /// True when both handles are the same binding of the same object.
    pub fn ptr_eq(&self, other: &LiveModule) -> bool {
        Arc::ptr_eq(&self.object, &other.object) && Arc::ptr_eq(&self.binding, &other.binding)
    }

    fn member(&self, key: &str) -> Result<&Member> {
        self.binding.member(key).ok_or_else(|| Error::UnknownMember {
            class: self.class().name().to_string(),
            key: key.to_string(),
        })
    }

    fn read(&self, read: &Read) -> Result<Value> {
        match read {
            Read::State(key) => {
                let path = self.path()?;
                Ok(self.store.store().read(|root| {
                    local_state(root, &path)
                        .and_then(|state| state.get(key))
                        .cloned()
                        .unwrap_or(Value::Null)
                }))
            }
            Read::Getter(name) => self.getter(name),
            Read::Field(key) => Ok(self.object.field(key).cloned().unwrap_or(Value::Null)),
        }
    }

    fn unregistered(&self) -> Error {
        Error::namespace(
            format!("<{}>", self.class().name()),
            "the module instance is not registered in this store",
        )
    }
}

fn settle(dispatched: Result<Completion>) -> Completion {
    dispatched.unwrap_or_else(|e| Completion::ready(Err(e)))
}

impl fmt::Debug for LiveModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveModule")
            .field("class", &self.class().name())
            .field("path", &self.path().ok())
            .field("members", &self.binding.keys().collect::<Vec<_>>())
            .finish()
    }
}
