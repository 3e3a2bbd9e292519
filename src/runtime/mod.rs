//! Store handles.
//!
//! [`ModuleStore`] pairs the store runtime with the instance directory of the
//! module tree it was built from. The optional implicit handle in this module
//! serves applications that prefer free functions; nothing else in the crate
//! relies on it.

mod context;
mod handle;

pub use context::{create_store, get_module, is_registered, register_module, unregister_module};
pub use handle::{ModuleStore, StoreOptions};
