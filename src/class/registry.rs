use super::scope::MutationScope;
use crate::binding::LiveModule;
use crate::error::Result;
use crate::store::GetterScope;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_CLASS_ID: AtomicUsize = AtomicUsize::new(0);

/// Body of a declared mutation.
pub type MutationBody = Arc<dyn Fn(&mut MutationScope<'_>, Value) -> Result<()> + Send + Sync>;

/// Body of a declared getter. Accessor getters receive `Value::Null` as argument.
pub type GetterBody = Arc<dyn Fn(&GetterScope<'_>, Value) -> Result<Value> + Send + Sync>;

/// Body of a declared action, run against the live module.
pub type ActionBody =
    Arc<dyn Fn(LiveModule, Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Category of a declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    State,
    Getter,
    Mutation,
    Action,
    GetSet,
    Model,
    Virtual,
    Submodule,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::State => "state",
            Kind::Getter => "getter",
            Kind::Mutation => "mutation",
            Kind::Action => "action",
            Kind::GetSet => "getset",
            Kind::Model => "model",
            Kind::Virtual => "virtual",
            Kind::Submodule => "submodule",
        };
        f.write_str(name)
    }
}

/// Reactive state field.
#[derive(Clone, Debug, PartialEq)]
pub struct StateEntry {
    pub key: String,
    pub initial: Value,
}

/// Derived read. Accessors are exposed as properties, the others as callables.
#[derive(Clone)]
pub struct GetterEntry {
    pub name: String,
    pub accessor: bool,
    pub(crate) body: GetterBody,
}

/// Synchronous state transition.
///
/// An entry overriding an inherited mutation of the same key keeps a
/// reference to it, reachable through [`MutationScope::call_super`].
#[derive(Clone)]
pub struct MutationEntry {
    pub key: String,
    pub(crate) body: MutationBody,
    pub(crate) overridden: Option<Arc<MutationEntry>>,
}

/// Options of a declared action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionOptions {
    /// Trailing-edge debounce window
    pub debounce: Option<Duration>,
}

/// Asynchronous operation.
#[derive(Clone)]
pub struct ActionEntry {
    pub key: String,
    pub options: ActionOptions,
    pub(crate) body: ActionBody,
}

/// State field paired with a generated assignment mutation.
#[derive(Clone, Debug, PartialEq)]
pub struct GetSetEntry {
    pub key: String,
    pub initial: Value,
    pub mutation: String,
}

/// State field whose assignment commits a mutation and then dispatches `followup`.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelEntry {
    pub key: String,
    pub initial: Value,
    pub mutation: String,
    pub action: String,
    pub followup: String,
}

/// Property redirected to other declared members by name.
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualEntry {
    pub property: String,
    pub getter_source: String,
    pub setter_source: String,
}

/// Declared nested module.
#[derive(Clone, Debug)]
pub struct SubmoduleEntry {
    pub key: String,
    pub class: Class,
}

/// Per-class declaration collections. `None` means "no own collection yet".
#[doc(hidden)]
#[derive(Default)]
pub struct Declarations {
    states: Option<Vec<StateEntry>>,
    getters: Option<Vec<GetterEntry>>,
    mutations: Option<Vec<MutationEntry>>,
    actions: Option<Vec<ActionEntry>>,
    getsets: Option<Vec<GetSetEntry>>,
    models: Option<Vec<ModelEntry>>,
    virtuals: Option<Vec<VirtualEntry>>,
    submodules: Option<Vec<SubmoduleEntry>>,
}

/// A declaration that can be recorded on a [`Class`].
pub trait Declaration: Clone + Send + Sync + 'static {
    const KIND: Kind;

    /// Member key the declaration introduces.
    fn key(&self) -> &str;

    #[doc(hidden)]
    fn slot(declarations: &Declarations) -> &Option<Vec<Self>>;

    #[doc(hidden)]
    fn slot_mut(declarations: &mut Declarations) -> &mut Option<Vec<Self>>;
}

macro_rules! declaration {
    ($entry:ty, $kind:expr, $field:ident, $key:ident) => {
        impl Declaration for $entry {
            const KIND: Kind = $kind;

            fn key(&self) -> &str {
                &self.$key
            }

            fn slot(declarations: &Declarations) -> &Option<Vec<Self>> {
                &declarations.$field
            }

            fn slot_mut(declarations: &mut Declarations) -> &mut Option<Vec<Self>> {
                &mut declarations.$field
            }
        }
    };
}

declaration!(StateEntry, Kind::State, states, key);
declaration!(GetterEntry, Kind::Getter, getters, name);
declaration!(MutationEntry, Kind::Mutation, mutations, key);
declaration!(ActionEntry, Kind::Action, actions, key);
declaration!(GetSetEntry, Kind::GetSet, getsets, key);
declaration!(ModelEntry, Kind::Model, models, key);
declaration!(VirtualEntry, Kind::Virtual, virtuals, property);
declaration!(SubmoduleEntry, Kind::Submodule, submodules, key);

struct ClassInner {
    id: usize,
    name: String,
    parent: Option<Class>,
    declarations: RwLock<Declarations>,
}

/// A module class: the prototype declarations are recorded on.
///
/// Declarations accumulate along the inheritance chain. A subclass sees its
/// parent's declarations followed by its own; recording on a subclass never
/// alters the parent's collections.
///
/// Classes are usually built with [`Class::builder`] or [`Class::subclass`].
#[derive(Clone)]
pub struct Class(Arc<ClassInner>);

impl Class {
    pub(crate) fn new(name: impl Into<String>, parent: Option<Class>) -> Self {
        Self(Arc::new(ClassInner {
            id: NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            parent,
            declarations: RwLock::new(Declarations::default()),
        }))
    }

    /// Process-unique class id.
    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&Class> {
        self.0.parent.as_ref()
    }

    /// True when `self` is `other` or inherits from it.
    pub fn is_a(&self, other: &Class) -> bool {
        self.ancestry().any(|class| class == other)
    }

    /// Append a declaration to this class's own collection of its kind.
    ///
    /// The first own record of a kind starts from a copy of the inherited
    /// collection.
    pub fn record<D: Declaration>(&self, entry: D) {
        let inherited = if D::slot(&self.0.declarations.read()).is_none() {
            self.parent().map(Class::query::<D>).unwrap_or_default()
        } else {
            Vec::new()
        };
        log::trace!("{}: record {} `{}`", self.name(), D::KIND, entry.key());
        let mut declarations = self.0.declarations.write();
        D::slot_mut(&mut declarations)
            .get_or_insert(inherited)
            .push(entry);
    }

    /// Declarations of one kind, inherited ones first.
    pub fn query<D: Declaration>(&self) -> Vec<D> {
        if let Some(own) = D::slot(&self.0.declarations.read()) {
            return own.clone();
        }
        self.parent().map(Class::query::<D>).unwrap_or_default()
    }

    /// Declarations of one kind recorded on this class itself, without the
    /// inherited ones.
    pub fn own<D: Declaration + PartialEq>(&self) -> Vec<D> {
        let mut entries = self.query::<D>();
        let inherited = self.parent().map(Class::query::<D>).unwrap_or_default();
        if entries.starts_with(&inherited) {
            entries.split_off(inherited.len())
        } else {
            // the parent recorded more after this class copied its collection
            entries.retain(|entry| !inherited.contains(entry));
            entries
        }
    }

    /// This class and its ancestors, most derived first.
    pub fn ancestry(&self) -> impl Iterator<Item = &Class> {
        std::iter::successors(Some(self), |class| class.parent())
    }

    pub fn states(&self) -> Vec<StateEntry> {
        self.query()
    }

    pub fn getters(&self) -> Vec<GetterEntry> {
        self.query()
    }

    pub fn mutations(&self) -> Vec<MutationEntry> {
        self.query()
    }

    pub fn actions(&self) -> Vec<ActionEntry> {
        self.query()
    }

    pub fn getsets(&self) -> Vec<GetSetEntry> {
        self.query()
    }

    pub fn models(&self) -> Vec<ModelEntry> {
        self.query()
    }

    pub fn virtuals(&self) -> Vec<VirtualEntry> {
        self.query()
    }

    pub fn submodules(&self) -> Vec<SubmoduleEntry> {
        self.query()
    }

    /// Kind of the member declared under `key`, if any.
    ///
    /// Generated mutation and action names of get-sets and models count as
    /// mutations and actions.
    pub fn member_kind(&self, key: &str) -> Option<Kind> {
        if self.getters().iter().any(|g| g.name == key) {
            return Some(Kind::Getter);
        }
        if self.virtuals().iter().any(|v| v.property == key) {
            return Some(Kind::Virtual);
        }
        let getsets = self.getsets();
        let models = self.models();
        if self.mutations().iter().any(|m| m.key == key)
            || getsets.iter().any(|g| g.mutation == key)
            || models.iter().any(|m| m.mutation == key)
        {
            return Some(Kind::Mutation);
        }
        if self.actions().iter().any(|a| a.key == key) || models.iter().any(|m| m.action == key) {
            return Some(Kind::Action);
        }
        if getsets.iter().any(|g| g.key == key) {
            return Some(Kind::GetSet);
        }
        if models.iter().any(|m| m.key == key) {
            return Some(Kind::Model);
        }
        if self.states().iter().any(|s| s.key == key) {
            return Some(Kind::State);
        }
        if self.submodules().iter().any(|s| s.key == key) {
            return Some(Kind::Submodule);
        }
        None
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Class {}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("parent", &self.parent().map(Class::name))
            .finish()
    }
}

impl fmt::Debug for GetterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetterEntry")
            .field("name", &self.name)
            .field("accessor", &self.accessor)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for MutationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationEntry")
            .field("key", &self.key)
            .field("overrides", &self.overridden.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ActionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionEntry")
            .field("key", &self.key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(key: &str, initial: Value) -> StateEntry {
        StateEntry {
            key: key.to_string(),
            initial,
        }
    }

    #[test]
    fn record_preserves_order() {
        let class = Class::new("Test", None);
        class.record(state("a", json!(1)));
        class.record(state("b", json!(2)));
        let keys: Vec<_> = class.states().into_iter().map(|s| s.key).collect();
        assert_eq!(keys, ["a", "b"]);
        assert!(class.getters().is_empty());
    }

    #[test]
    fn own_excludes_inherited_entries() {
        let base = Class::new("Base", None);
        base.record(state("a", json!(1)));
        let sub = Class::new("Sub", Some(base.clone()));
        assert!(sub.own::<StateEntry>().is_empty());

        sub.record(state("a", json!(2)));
        assert_eq!(sub.own::<StateEntry>(), [state("a", json!(2))]);
        assert_eq!(base.own::<StateEntry>(), [state("a", json!(1))]);

        // recorded on the parent after the subclass copied its collection
        base.record(state("late", json!(0)));
        assert_eq!(sub.own::<StateEntry>(), [state("a", json!(2))]);

        let names: Vec<_> = sub.ancestry().map(Class::name).collect();
        assert_eq!(names, ["Sub", "Base"]);
    }

    #[test]
    fn subclass_copies_inherited_collection() {
        let base = Class::new("Base", None);
        base.record(state("a", json!(1)));

        let sub = Class::new("Sub", Some(base.clone()));
        // nothing own yet: inherited collection is visible
        assert_eq!(sub.states().len(), 1);

        sub.record(state("b", json!(2)));
        let keys: Vec<_> = sub.states().into_iter().map(|s| s.key).collect();
        assert_eq!(keys, ["a", "b"]);
        // the parent's collection is untouched
        assert_eq!(base.states().len(), 1);
    }

    #[test]
    fn is_a_walks_parents() {
        let base = Class::new("Base", None);
        let sub = Class::new("Sub", Some(base.clone()));
        let other = Class::new("Other", None);
        assert!(sub.is_a(&base));
        assert!(sub.is_a(&sub));
        assert!(!base.is_a(&sub));
        assert!(!sub.is_a(&other));
    }

    #[test]
    fn member_kind_covers_generated_names() {
        let class = Class::new("Test", None);
        class.record(GetSetEntry {
            key: "value".to_string(),
            initial: json!(0),
            mutation: "SET_VALUE".to_string(),
        });
        class.record(ModelEntry {
            key: "filter".to_string(),
            initial: json!(""),
            mutation: "SET_FILTER".to_string(),
            action: "setModel_filter".to_string(),
            followup: "read".to_string(),
        });
        assert_eq!(class.member_kind("value"), Some(Kind::GetSet));
        assert_eq!(class.member_kind("SET_VALUE"), Some(Kind::Mutation));
        assert_eq!(class.member_kind("filter"), Some(Kind::Model));
        assert_eq!(class.member_kind("setModel_filter"), Some(Kind::Action));
        assert_eq!(class.member_kind("missing"), None);
    }
}
