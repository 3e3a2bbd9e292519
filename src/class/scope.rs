use super::object::ModuleObject;
use super::registry::{Kind, MutationEntry};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Restricted view a mutation body runs against.
///
/// Only state fields can be read and written; plain instance fields are
/// readable. Mutations, actions and getters are not reachable from here:
/// [`MutationScope::call`] fails with [`Error::ScopeViolation`] for every
/// declared member.
pub struct MutationScope<'a> {
    state: &'a mut Map<String, Value>,
    object: &'a ModuleObject,
    mutation: &'a str,
    overridden: Option<Arc<MutationEntry>>,
}

impl<'a> MutationScope<'a> {
    pub(crate) fn new(
        state: &'a mut Map<String, Value>,
        object: &'a ModuleObject,
        mutation: &'a str,
        overridden: Option<Arc<MutationEntry>>,
    ) -> Self {
        Self {
            state,
            object,
            mutation,
            overridden,
        }
    }

    /// Module-local state fields.
    pub fn state(&self) -> &Map<String, Value> {
        &*self.state
    }

    /// Read a state field or a plain instance field.
    pub fn get(&self, key: &str) -> Result<Value> {
        if let Some(value) = self.state.get(key) {
            return Ok(value.clone());
        }
        if let Some(value) = self.object.field(key) {
            return Ok(value.clone());
        }
        Err(self.denied(key))
    }

    /// Write a state field.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        if !self.is_state(key) {
            return Err(self.denied(key));
        }
        self.state.insert(key.to_string(), value);
        Ok(())
    }

    /// Update a state field in place.
    pub fn update<F>(&mut self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Value),
    {
        if !self.is_state(key) {
            return Err(self.denied(key));
        }
        f(self.state.entry(key.to_string()).or_insert(Value::Null));
        Ok(())
    }

    /// Invoke another member. Always fails: mutations cannot reach mutations,
    /// actions or getters.
    pub fn call(&mut self, member: &str, _payload: Value) -> Result<Value> {
        Err(self.denied(member))
    }

    /// Run the inherited implementation of the current mutation against the
    /// same state.
    pub fn call_super(&mut self, payload: Value) -> Result<()> {
        let entry = self.overridden.clone().ok_or_else(|| {
            Error::declaration(
                self.object.class().name(),
                format!("mutation `{}` has no inherited implementation", self.mutation),
            )
        })?;
        let mut scope = MutationScope {
            state: &mut *self.state,
            object: self.object,
            mutation: self.mutation,
            overridden: entry.overridden.clone(),
        };
        (entry.body)(&mut scope, payload)
    }

    fn is_state(&self, key: &str) -> bool {
        self.state.contains_key(key)
            || matches!(
                self.object.class().member_kind(key),
                Some(Kind::State | Kind::GetSet | Kind::Model)
            )
    }

    fn denied(&self, key: &str) -> Error {
        match self.object.class().member_kind(key) {
            Some(Kind::State | Kind::GetSet | Kind::Model) | None => Error::UnknownMember {
                class: self.object.class().name().to_string(),
                key: key.to_string(),
            },
            Some(_) => Error::ScopeViolation {
                member: key.to_string(),
                mutation: self.mutation.to_string(),
            },
        }
    }
}
