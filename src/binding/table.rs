use crate::class::{Class, ModuleObject};
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Where a property reads from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Read {
    /// Module-local state field
    State(String),
    /// Getter, qualified with the module namespace at access time
    Getter(String),
    /// Plain instance field of the declaring object
    Field(String),
}

/// Where a property assignment goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
    Commit(String),
    Dispatch(String),
}

/// What invoking a method does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Commit(String),
    Dispatch(String),
    /// Callable getter, evaluated with the call argument
    Getter(String),
}

/// One member of a live module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Member {
    Property { read: Read, write: Option<Write> },
    Method(Method),
    /// Declared submodule, resolved when first dereferenced
    Module(String),
}

/// Member table of a declaring object, built once per object and cached.
///
/// It holds names only. Namespace and state are looked up when a member is
/// used, so a bound module always sees the current state tree.
#[derive(Clone, Debug)]
pub struct Binding {
    class: Class,
    members: BTreeMap<String, Member>,
}

impl Binding {
    pub(crate) fn build(object: &ModuleObject) -> Result<Self> {
        let class = object.class();
        let getsets = class.getsets();
        let models = class.models();
        let states = class.states();
        let mutations = class.mutations();
        let actions = class.actions();
        let getters = class.getters();
        let mut members = BTreeMap::new();

        for entry in &getsets {
            members.insert(
                entry.key.clone(),
                Member::Property {
                    read: Read::State(entry.key.clone()),
                    write: Some(Write::Commit(entry.mutation.clone())),
                },
            );
            members.insert(
                entry.mutation.clone(),
                Member::Method(Method::Commit(entry.mutation.clone())),
            );
        }
        for entry in &models {
            members.insert(
                entry.key.clone(),
                Member::Property {
                    read: Read::State(entry.key.clone()),
                    write: Some(Write::Dispatch(entry.action.clone())),
                },
            );
            members.insert(
                entry.mutation.clone(),
                Member::Method(Method::Commit(entry.mutation.clone())),
            );
            members.insert(
                entry.action.clone(),
                Member::Method(Method::Dispatch(entry.action.clone())),
            );
        }
        for entry in &states {
            members
                .entry(entry.key.clone())
                .or_insert_with(|| Member::Property {
                    read: Read::State(entry.key.clone()),
                    write: None,
                });
        }
        for entry in &mutations {
            members.insert(
                entry.key.clone(),
                Member::Method(Method::Commit(entry.key.clone())),
            );
        }
        for entry in &actions {
            members.insert(
                entry.key.clone(),
                Member::Method(Method::Dispatch(entry.key.clone())),
            );
        }
        for entry in &getters {
            let member = if entry.accessor {
                Member::Property {
                    read: Read::Getter(entry.name.clone()),
                    write: None,
                }
            } else {
                Member::Method(Method::Getter(entry.name.clone()))
            };
            members.insert(entry.name.clone(), member);
        }

        for entry in class.virtuals() {
            let read = getters
                .iter()
                .find(|g| g.name == entry.getter_source)
                .map(|g| Read::Getter(g.name.clone()))
                .or_else(|| {
                    let key = &entry.getter_source;
                    let is_state = getsets.iter().any(|g| &g.key == key)
                        || models.iter().any(|m| &m.key == key)
                        || states.iter().any(|s| &s.key == key);
                    is_state.then(|| Read::State(key.clone()))
                })
                .ok_or_else(|| {
                    Error::declaration(
                        class.name(),
                        format!(
                            "virtual property `{}` reads from `{}`, which is not a getter or state field",
                            entry.property, entry.getter_source
                        ),
                    )
                })?;

            let source = &entry.setter_source;
            let write = if mutations.iter().any(|m| &m.key == source)
                || getsets.iter().any(|g| &g.mutation == source)
                || models.iter().any(|m| &m.mutation == source)
            {
                Write::Commit(source.clone())
            } else if actions.iter().any(|a| &a.key == source)
                || models.iter().any(|m| &m.action == source)
            {
                Write::Dispatch(source.clone())
            } else {
                return Err(Error::declaration(
                    class.name(),
                    format!(
                        "virtual property `{}` writes through `{}`, which is not a mutation or action",
                        entry.property, source
                    ),
                ));
            };

            members.insert(
                entry.property.clone(),
                Member::Property {
                    read,
                    write: Some(write),
                },
            );
        }

        for key in object.fields().keys() {
            members
                .entry(key.clone())
                .or_insert_with(|| Member::Property {
                    read: Read::Field(key.clone()),
                    write: None,
                });
        }
        for key in object.modules().keys() {
            members.insert(key.clone(), Member::Module(key.clone()));
        }

        log::trace!("bound `{}` with {} member(s)", class.name(), members.len());
        Ok(Self {
            class: class.clone(),
            members,
        })
    }

    pub fn class(&self) -> &Class {
        &self.class
    }

    pub fn member(&self, key: &str) -> Option<&Member> {
        self.members.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(key, member)| (key.as_str(), member))
    }
}
