//! Module classes and their declarations.
//!
//! A [`Class`] is the prototype declarations are recorded on: state fields,
//! getters, mutations, actions, get-sets, models, virtual properties and
//! nested modules. Declarations accumulate along the inheritance chain.
//! [`ModuleObject`] is an instance of a class, the declaring object a store
//! compiles and binds.

mod builder;
mod object;
mod registry;
mod scope;

pub use builder::{default_model_action_name, default_mutation_name, ClassBuilder};
pub use object::ModuleObject;
pub use registry::{
    ActionBody, ActionEntry, ActionOptions, Class, Declaration, Declarations, GetSetEntry,
    GetterBody, GetterEntry, Kind, ModelEntry, MutationBody, MutationEntry, StateEntry,
    SubmoduleEntry, VirtualEntry,
};
pub use scope::MutationScope;
