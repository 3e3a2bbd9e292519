use super::registry::{
    ActionBody, ActionEntry, ActionOptions, Class, GetSetEntry, GetterBody, GetterEntry,
    ModelEntry, MutationBody, MutationEntry, StateEntry, SubmoduleEntry, VirtualEntry,
};
use super::scope::MutationScope;
use crate::binding::LiveModule;
use crate::error::Result;
use crate::store::GetterScope;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Name of the mutation generated for a get-set or model field.
pub fn default_mutation_name(key: &str) -> String {
    format!("SET_{}", key.to_uppercase())
}

/// Name of the action generated for a model field.
pub fn default_model_action_name(key: &str) -> String {
    format!("setModel_{key}")
}

/// Declares the members of a module class.
///
/// Every call records its declaration on the class immediately, in call
/// order. [`ClassBuilder::build`] hands the class out.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tinclass::Class;
///
/// let counter = Class::builder("Counter")
///     .getset("count", json!(0))
///     .getter("double", |this| Ok(json!(this.get("count")?.as_i64().unwrap_or(0) * 2)))
///     .mutation("increment", |this, by| {
///         let count = this.get("count")?.as_i64().unwrap_or(0);
///         this.set("count", json!(count + by.as_i64().unwrap_or(1)))
///     })
///     .build();
///
/// assert_eq!(counter.getsets()[0].mutation, "SET_COUNT");
/// ```
#[derive(Debug)]
pub struct ClassBuilder {
    class: Class,
}

impl Class {
    /// Start declaring a new base class.
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            class: Class::new(name, None),
        }
    }

    /// Start declaring a class inheriting every declaration of `self`.
    pub fn subclass(&self, name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            class: Class::new(name, Some(self.clone())),
        }
    }
}

impl ClassBuilder {
    /// Reactive, read-only state field.
    pub fn state(self, key: impl Into<String>, initial: Value) -> Self {
        self.class.record(StateEntry {
            key: key.into(),
            initial,
        });
        self
    }

    /// State field with a generated `SET_<KEY>` assignment mutation.
    pub fn getset(self, key: impl Into<String>, initial: Value) -> Self {
        let key = key.into();
        let mutation = default_mutation_name(&key);
        self.getset_named(key, initial, mutation)
    }

    pub fn getset_named(
        self,
        key: impl Into<String>,
        initial: Value,
        mutation: impl Into<String>,
    ) -> Self {
        self.class.record(GetSetEntry {
            key: key.into(),
            initial,
            mutation: mutation.into(),
        });
        self
    }

    /// State field whose assignment commits `SET_<KEY>` and then dispatches
    /// `followup`, through a generated `setModel_<key>` action.
    pub fn model(self, key: impl Into<String>, initial: Value, followup: impl Into<String>) -> Self {
        let key = key.into();
        let mutation = default_mutation_name(&key);
        let action = default_model_action_name(&key);
        self.model_named(key, initial, followup, mutation, action)
    }

    pub fn model_named(
        self,
        key: impl Into<String>,
        initial: Value,
        followup: impl Into<String>,
        mutation: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        self.class.record(ModelEntry {
            key: key.into(),
            initial,
            mutation: mutation.into(),
            action: action.into(),
            followup: followup.into(),
        });
        self
    }

    /// Accessor getter, exposed as a property of live modules.
    pub fn getter<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&GetterScope<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        let body: GetterBody = Arc::new(move |this, _| f(this));
        self.class.record(GetterEntry {
            name: name.into(),
            accessor: true,
            body,
        });
        self
    }

    /// Callable getter, re-evaluated with its argument on every call.
    pub fn getter_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&GetterScope<'_>, Value) -> Result<Value> + Send + Sync + 'static,
    {
        let body: GetterBody = Arc::new(f);
        self.class.record(GetterEntry {
            name: name.into(),
            accessor: false,
            body,
        });
        self
    }

    /// Synchronous mutation.
    ///
    /// When an ancestor declares a mutation under the same key, its
    /// implementation stays reachable through [`MutationScope::call_super`].
    pub fn mutation<F>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut MutationScope<'_>, Value) -> Result<()> + Send + Sync + 'static,
    {
        let key = key.into();
        let overridden = self
            .class
            .parent()
            .and_then(|parent| parent.mutations().into_iter().rev().find(|m| m.key == key))
            .map(Arc::new);
        let body: MutationBody = Arc::new(f);
        self.class.record(MutationEntry {
            key,
            body,
            overridden,
        });
        self
    }

    /// Asynchronous action. The body receives the live module it runs on.
    pub fn action<F, Fut>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(LiveModule, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.action_with(key, ActionOptions::default(), f)
    }

    pub fn action_with<F, Fut>(self, key: impl Into<String>, options: ActionOptions, f: F) -> Self
    where
        F: Fn(LiveModule, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let body: ActionBody = Arc::new(move |this, payload| f(this, payload).boxed());
        self.class.record(ActionEntry {
            key: key.into(),
            options,
            body,
        });
        self
    }

    /// Action whose calls within `window` of each other run once, after the last one.
    pub fn debounced_action<F, Fut>(self, key: impl Into<String>, window: Duration, f: F) -> Self
    where
        F: Fn(LiveModule, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let options = ActionOptions {
            debounce: Some(window),
        };
        self.action_with(key, options, f)
    }

    /// Property reading through `getter_source` and writing through `setter_source`.
    ///
    /// Sources are resolved by name when a live module is bound.
    pub fn virtual_property(
        self,
        property: impl Into<String>,
        getter_source: impl Into<String>,
        setter_source: impl Into<String>,
    ) -> Self {
        self.class.record(VirtualEntry {
            property: property.into(),
            getter_source: getter_source.into(),
            setter_source: setter_source.into(),
        });
        self
    }

    /// Nested module, instantiated with every object of this class.
    pub fn module(self, key: impl Into<String>, class: &Class) -> Self {
        self.class.record(SubmoduleEntry {
            key: key.into(),
            class: class.clone(),
        });
        self
    }

    pub fn build(self) -> Class {
        self.class
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_names() {
        assert_eq!(default_mutation_name("pageSize"), "SET_PAGESIZE");
        assert_eq!(default_model_action_name("filter"), "setModel_filter");

        let class = Class::builder("Test")
            .getset_named("value", json!(1), "assignValue")
            .model("filter", json!(""), "read")
            .build();
        assert_eq!(class.getsets()[0].mutation, "assignValue");
        let model = &class.models()[0];
        assert_eq!(model.mutation, "SET_FILTER");
        assert_eq!(model.action, "setModel_filter");
        assert_eq!(model.followup, "read");
    }

    #[test]
    fn getter_kinds() {
        let class = Class::builder("Test")
            .getter("total", |_| Ok(json!(1)))
            .getter_fn("find", |_, id| Ok(id))
            .build();
        let getters = class.getters();
        assert!(getters[0].accessor);
        assert!(!getters[1].accessor);
    }

    #[test]
    fn overriding_mutation_captures_inherited() {
        let base = Class::builder("Base")
            .mutation("reset", |_, _| Ok(()))
            .build();
        let sub = base.subclass("Sub").mutation("reset", |_, _| Ok(())).build();
        let fresh = base.subclass("Fresh").mutation("other", |_, _| Ok(())).build();

        let mutations = sub.mutations();
        assert_eq!(mutations.len(), 2);
        assert!(mutations[0].overridden.is_none());
        assert!(mutations[1].overridden.is_some());
        assert!(fresh.mutations()[1].overridden.is_none());
    }

    #[test]
    fn debounced_action_records_window() {
        let class = Class::builder("Test")
            .action("plain", |_, payload| async move { Ok(payload) })
            .debounced_action("search", Duration::from_millis(50), |_, _| async {
                Ok(Value::Null)
            })
            .build();
        let actions = class.actions();
        assert_eq!(actions[0].options.debounce, None);
        assert_eq!(actions[1].options.debounce, Some(Duration::from_millis(50)));
    }
}
