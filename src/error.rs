//! Error types for declaration, resolution and store operations.
//!
//! Every failure in the crate is reported through [`Error`]. Errors are raised
//! synchronously where they are detected and are never retried internally.

use std::fmt::Display;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the registry, the resolver and the store runtime.
///
/// `Error` is `Clone` because a single debounced action outcome is delivered
/// to every caller of the burst.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed or ambiguous declaration, detected at bind time.
    #[error("invalid declaration on `{class}`: {message}")]
    Declaration {
        /// Class carrying the declaration
        class: String,
        /// What went wrong
        message: String,
    },

    /// A namespace could not be resolved to a registered module.
    #[error("cannot resolve namespace `{namespace}`: {reason}")]
    NamespaceResolution {
        /// Namespace as supplied by the caller
        namespace: String,
        /// Why resolution failed
        reason: String,
    },

    /// The module found at a namespace is not an instance of the requested class.
    #[error(
        "module at namespace `{namespace}` is a `{found}`, not a `{requested}`; the namespace is probably wrong"
    )]
    TypeMismatch {
        /// Requested class name
        requested: String,
        /// Class of the module actually registered there
        found: String,
        /// Namespace that was looked up
        namespace: String,
    },

    /// A mutation body tried to reach a member it may not use.
    #[error("`{member}` is not permitted inside mutation `{mutation}`")]
    ScopeViolation {
        /// Member the mutation tried to use
        member: String,
        /// Mutation that was running
        mutation: String,
    },

    /// Store options or module descriptions that cannot be used.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No mutation is registered under this qualified type.
    #[error("unknown mutation type `{0}`")]
    UnknownMutation(String),

    /// No action is registered under this qualified type.
    #[error("unknown action type `{0}`")]
    UnknownAction(String),

    /// No getter is registered under this qualified name.
    #[error("unknown getter `{0}`")]
    UnknownGetter(String),

    /// The key is not a member of the module.
    #[error("`{key}` is not a member of `{class}`")]
    UnknownMember {
        /// Class the key was looked up on
        class: String,
        /// Missing key
        key: String,
    },

    /// Assignment to a property without a setter.
    #[error("property `{0}` is read-only")]
    ReadOnly(String),

    /// The member exists but cannot be invoked.
    #[error("`{0}` is not callable")]
    NotCallable(String),

    /// The member is a method and cannot be read as a property.
    #[error("`{0}` is a method, not a property")]
    NotAProperty(String),

    /// No module is registered at the given path.
    #[error("no module registered at `{0}`")]
    ModuleNotFound(String),

    /// An action body rejected.
    #[error("action failed: {0}")]
    Action(String),

    /// An action task was cancelled or panicked before settling.
    #[error("action aborted: {0}")]
    Aborted(String),
}

impl Error {
    /// Build an [`Error::Action`] rejection from any displayable reason.
    pub fn action(reason: impl Display) -> Self {
        Error::Action(reason.to_string())
    }

    pub(crate) fn namespace(namespace: impl Display, reason: impl Display) -> Self {
        Error::NamespaceResolution {
            namespace: namespace.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn declaration(class: impl Display, message: impl Display) -> Self {
        Error::Declaration {
            class: class.to_string(),
            message: message.to_string(),
        }
    }
}
