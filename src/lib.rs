//! # Tinclass
//!
//! Class-style modules for a namespaced flux store.
//!
//! A module is declared once, as a [`Class`]: state fields, getters,
//! mutations, actions, get-set and model fields, virtual properties and
//! nested modules. Tinclass compiles the declarations into the store's
//! native [`Module`] description and hands out [`LiveModule`]s whose
//! members forward to the store by key.
//!
//! ## Declarations
//!
//! - [`Class::builder`] / [`Class::subclass`] record declarations; subclasses
//!   accumulate their parent's declarations and may override mutations while
//!   keeping the inherited body reachable
//! - [`ModuleObject`] is an instance of a class, with instance fields,
//!   per-instance initial state and hand-written modules merged in
//!
//! ## Store
//!
//! - [`ModuleStore`] compiles a module tree, owns the instance directory and
//!   resolves live modules by class and namespace, including relative
//!   namespaces (`..`, `./child`)
//! - modules can be registered and unregistered at runtime
//! - debounced actions coalesce bursts of calls into a single run
//!
//! ```
//! use serde_json::json;
//! use tinclass::{Class, ModuleStore};
//!
//! # fn main() -> tinclass::Result<()> {
//! let list = Class::builder("List")
//!     .getset("filter", json!(""))
//!     .state("items", json!(["apple", "banana"]))
//!     .getter("visible", |this| {
//!         let filter = this.get("filter")?;
//!         let filter = filter.as_str().unwrap_or("");
//!         let items = this.get("items")?;
//!         let visible: Vec<_> = items
//!             .as_array()
//!             .into_iter()
//!             .flatten()
//!             .filter(|item| item.as_str().is_some_and(|s| s.contains(filter)))
//!             .cloned()
//!             .collect();
//!         Ok(json!(visible))
//!     })
//!     .build();
//!
//! let store = ModuleStore::new(&list)?;
//! let live = store.get_module(&list, "")?;
//! live.set("filter", json!("ban"))?;
//! assert_eq!(live.get("visible")?, json!(["banana"]));
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod class;
mod compiler;
pub mod debounce;
pub mod directory;
pub mod error;
pub mod map;
pub mod namespace;
pub mod runtime;
pub mod store;

// Re-export main types for convenience
pub use binding::LiveModule;
pub use class::{ActionOptions, Class, ClassBuilder, ModuleObject, MutationScope};
pub use error::{Error, Result};
pub use map::{map_computed, map_methods, MapOptions};
pub use namespace::NamespacePath;
pub use runtime::{
    create_store, get_module, is_registered, register_module, unregister_module, ModuleStore,
    StoreOptions,
};
pub use store::{Completion, Module, Store};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_works() {
        // Basic smoke test
        let class = Class::builder("Smoke").getset("value", json!(0)).build();
        let store = ModuleStore::new(&class).unwrap();
        let live = store.get_module(&class, "").unwrap();
        assert_eq!(live.get("value").unwrap(), json!(0));
        live.set("value", json!(42)).unwrap();
        assert_eq!(live.get("value").unwrap(), json!(42));
    }
}
