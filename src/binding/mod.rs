//! Live binding of declaring objects to a store.
//!
//! Resolution finds the declaring object registered at a namespace, checks
//! its class and hands out a [`LiveModule`]: a handle whose members forward
//! to the store's state, commits, dispatches and getters. Member tables are
//! built on first resolution and cached per object.

mod live;
mod resolver;
mod table;

pub use live::LiveModule;
pub use table::{Binding, Member, Method, Read, Write};
