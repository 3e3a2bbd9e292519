//! Namespace paths and qualified identifiers.
//!
//! A namespace path is the chain of submodule keys leading from the root module
//! to a nested one. The root itself is the empty path. Qualified identifiers
//! join the path and a member name with `/` (`a/b/value`); root members keep
//! their bare name.
//!
//! Relative namespaces start with path operators: a single leading `.` means
//! "below the context module", and one or more leading `..` segments ascend
//! from the context module before applying the remaining segments.

use crate::error::{Error, Result};
use std::fmt;

const CURRENT: &str = ".";
const PARENT: &str = "..";

/// Chain of submodule keys locating a module in the tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespacePath(Vec<String>);

impl NamespacePath {
    /// The root sentinel.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse an absolute `/`-joined path. Empty segments are ignored, so `""`
    /// and `"/"` both denote the root.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of the submodule `key` below this one.
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }

    /// Split into the parent path and the last key. `None` for the root.
    pub fn split_last(&self) -> Option<(NamespacePath, &str)> {
        let (last, parent) = self.0.split_last()?;
        Some((Self(parent.to_vec()), last.as_str()))
    }

    /// True when `self` equals `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &NamespacePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// `/`-joined form, empty for the root.
    pub fn joined(&self) -> String {
        self.0.join("/")
    }

    /// Qualify a member name with this namespace.
    ///
    /// ```
    /// use tinclass::NamespacePath;
    ///
    /// assert_eq!(NamespacePath::root().qualify("value"), "value");
    /// assert_eq!(NamespacePath::parse("a/b").qualify("value"), "a/b/value");
    /// ```
    pub fn qualify(&self, name: &str) -> String {
        if self.is_root() {
            name.to_string()
        } else {
            format!("{}/{}", self.joined(), name)
        }
    }

    pub(crate) fn push(&mut self, key: &str) {
        self.0.push(key.to_string());
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.joined())
        }
    }
}

impl From<&str> for NamespacePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for NamespacePath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&String> for NamespacePath {
    fn from(path: &String) -> Self {
        Self::parse(path)
    }
}

impl From<&NamespacePath> for NamespacePath {
    fn from(path: &NamespacePath) -> Self {
        path.clone()
    }
}

impl From<Vec<String>> for NamespacePath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for NamespacePath {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for NamespacePath {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

/// True when the namespace starts with a `.` or `..` operator segment.
pub fn is_relative(namespace: &str) -> bool {
    matches!(namespace.split('/').next(), Some(CURRENT) | Some(PARENT))
}

/// Resolve a namespace as supplied to the resolver.
///
/// Absolute namespaces ignore `context`. Relative namespaces need the context
/// module's path. Operator segments must all lead the namespace, at most one
/// `.` is allowed, `.` and `..` cannot be combined, and ascending above the
/// root is an error.
pub fn resolve(namespace: &str, context: Option<&NamespacePath>) -> Result<NamespacePath> {
    if !is_relative(namespace) {
        let segments: Vec<&str> = namespace.split('/').filter(|s| !s.is_empty()).collect();
        if segments.iter().any(|s| *s == CURRENT || *s == PARENT) {
            return Err(Error::namespace(
                namespace,
                "path operators must lead the namespace",
            ));
        }
        return Ok(NamespacePath::parse(namespace));
    }

    let mut segments = namespace.split('/').filter(|s| !s.is_empty()).peekable();
    let mut current = 0usize;
    let mut ascend = 0usize;
    while let Some(&segment) = segments.peek() {
        match segment {
            CURRENT => current += 1,
            PARENT => ascend += 1,
            _ => break,
        }
        segments.next();
    }
    let rest: Vec<&str> = segments.collect();

    if current > 1 {
        return Err(Error::namespace(
            namespace,
            "at most one `.` segment is permitted",
        ));
    }
    if current == 1 && ascend > 0 {
        return Err(Error::namespace(
            namespace,
            "`.` and `..` cannot be combined",
        ));
    }
    if rest.iter().any(|s| *s == CURRENT || *s == PARENT) {
        return Err(Error::namespace(
            namespace,
            "path operators must lead the namespace",
        ));
    }

    let context = context.ok_or_else(|| {
        Error::namespace(namespace, "a relative namespace requires a context module")
    })?;
    if ascend > context.len() {
        return Err(Error::namespace(
            namespace,
            format!("cannot ascend {ascend} level(s) from `{context}`"),
        ));
    }

    let mut resolved = NamespacePath(context.0[..context.len() - ascend].to_vec());
    for segment in rest {
        resolved.push(segment);
    }
    Ok(resolved)
}
