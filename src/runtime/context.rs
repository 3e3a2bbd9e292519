use super::handle::{ModuleStore, StoreOptions};
use crate::binding::LiveModule;
use crate::class::{Class, ModuleObject};
use crate::error::{Error, Result};
use crate::namespace::NamespacePath;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::sync::Arc;

// Thread-local stack for scoped handles
thread_local! {
    static STORE_STACK: RefCell<Vec<ModuleStore>> = const { RefCell::new(Vec::new()) };
}

static DEFAULT_STORE: RwLock<Option<ModuleStore>> = parking_lot::const_rwlock(None);

/// Implicit handle for application code.
///
/// The core never reads it. Applications that prefer free functions over
/// passing a [`ModuleStore`] around install one handle at the top level, or
/// scope one to a closure.
///
/// # Examples
///
/// Installing the process-wide default:
///
/// ```
/// use serde_json::json;
/// use tinclass::{Class, ModuleStore};
///
/// let settings = Class::builder("Settings").getset("theme", json!("light")).build();
/// ModuleStore::new(&settings).unwrap().install();
///
/// let live = tinclass::get_module(&settings, "").unwrap();
/// assert_eq!(live.get("theme").unwrap(), json!("light"));
/// ```
///
/// Scoping a handle for isolation:
///
/// ```
/// use serde_json::json;
/// use tinclass::{Class, ModuleStore};
///
/// let counter = Class::builder("Counter").getset("count", json!(0)).build();
/// let store = ModuleStore::new(&counter).unwrap();
/// store.enter(|| {
///     assert!(ModuleStore::current().is_ok());
///     tinclass::get_module(&counter, "").unwrap().set("count", json!(1)).unwrap();
/// });
/// assert_eq!(store.state()["count"], json!(1));
/// ```
impl ModuleStore {
    /// Make this handle the process-wide default, replacing any previous one.
    pub fn install(&self) {
        log::debug!("installed default module store");
        *DEFAULT_STORE.write() = Some(self.clone());
    }

    /// Remove the process-wide default handle, returning it.
    pub fn uninstall() -> Option<ModuleStore> {
        DEFAULT_STORE.write().take()
    }

    /// Run a function with this handle as the current one on this thread.
    ///
    /// This pushes the handle onto the thread-local stack for the duration of
    /// the function, and pops it even if the function panics.
    pub fn enter<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        STORE_STACK.with(|stack| {
            stack.borrow_mut().push(self.clone());
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        STORE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Get the current handle (scoped, or the installed default).
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when no handle is scoped or installed.
    pub fn current() -> Result<ModuleStore> {
        STORE_STACK
            .with(|stack| stack.borrow().last().cloned())
            .or_else(|| DEFAULT_STORE.read().clone())
            .ok_or_else(|| {
                Error::Configuration(
                    "no module store is installed; call `ModuleStore::install` first".to_string(),
                )
            })
    }
}

/// Create a store and install it as the process-wide default.
pub fn create_store(options: impl Into<StoreOptions>) -> Result<ModuleStore> {
    let store = ModuleStore::new(options)?;
    store.install();
    Ok(store)
}

/// [`ModuleStore::get_module`] on the current handle.
pub fn get_module(class: &Class, namespace: &str) -> Result<LiveModule> {
    ModuleStore::current()?.get_module(class, namespace)
}

/// [`ModuleStore::register_module`] on the current handle.
pub fn register_module(
    path: impl Into<NamespacePath>,
    object: impl Into<Arc<ModuleObject>>,
) -> Result<()> {
    ModuleStore::current()?.register_module(path, object)
}

/// [`ModuleStore::unregister_module`] on the current handle.
pub fn unregister_module(path: impl Into<NamespacePath>) -> Result<()> {
    ModuleStore::current()?.unregister_module(path)
}

/// [`ModuleStore::is_registered`] on the current handle; false without one.
pub fn is_registered(path: impl Into<NamespacePath>) -> bool {
    ModuleStore::current().is_ok_and(|store| store.is_registered(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enter_scopes_the_handle() {
        let class = Class::builder("Scoped").getset("value", json!(1)).build();
        let outer = ModuleStore::new(&class).unwrap();
        let inner = ModuleStore::new(&class).unwrap();

        outer.enter(|| {
            inner.enter(|| {
                get_module(&class, "").unwrap().set("value", json!(2)).unwrap();
            });
            get_module(&class, "").unwrap().set("value", json!(3)).unwrap();
        });
        assert_eq!(inner.state()["value"], json!(2));
        assert_eq!(outer.state()["value"], json!(3));
    }

    #[test]
    fn enter_pops_on_panic() {
        let class = Class::builder("Panicky").build();
        let store = ModuleStore::new(&class).unwrap();
        let depth = || STORE_STACK.with(|stack| stack.borrow().len());

        let before = depth();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.enter(|| panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(depth(), before);
    }

    #[test]
    fn free_functions_use_scoped_handle() {
        let root = Class::builder("Root").build();
        let child = Class::builder("Child").getset("value", json!("child")).build();
        let store = ModuleStore::new(&root).unwrap();

        store.enter(|| {
            register_module("child", child.instantiate()).unwrap();
            assert!(is_registered("child"));
            let live = get_module(&child, "child").unwrap();
            assert_eq!(live.get("value").unwrap(), json!("child"));
            unregister_module("child").unwrap();
            assert!(!is_registered("child"));
        });
    }
}
