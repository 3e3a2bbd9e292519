//! Store runtime.
//!
//! A namespaced state container in the flux style: state changes only through
//! synchronous mutations, asynchronous work runs in actions, and derived reads
//! go through getters. Class modules compile to the [`Module`] description
//! defined here, and hand-written descriptions can be registered next to them.

mod completion;
mod module;
mod store;

pub use completion::Completion;
pub use module::{
    ActionContext, ActionHandler, GetterHandler, GetterScope, Module, MutationHandler,
    StateFactory,
};
pub use store::{MutationEvent, Store};
pub(crate) use store::local_state;
