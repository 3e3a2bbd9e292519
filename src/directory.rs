//! Instance directory: which declaring object lives at which path of a store.
//!
//! Every store handle owns one directory with two maps, path to object and
//! object to path, plus the cache of bound member tables. Objects never
//! point back at the store; resolution goes through the directory instead.

use crate::binding::Binding;
use crate::class::ModuleObject;
use crate::namespace::NamespacePath;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Default)]
pub struct Directory {
    by_path: BTreeMap<NamespacePath, Arc<ModuleObject>>,
    by_object: HashMap<usize, NamespacePath>,
    bindings: HashMap<usize, Arc<Binding>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a whole module tree below the root path.
    pub fn index(&mut self, root: &Arc<ModuleObject>) {
        self.register(&NamespacePath::root(), root);
    }

    /// Index the subtree of `object`, depth first, with `object` at `path`.
    ///
    /// Whatever was indexed at or below `path` before is dropped first.
    /// Module keys are used as path segments verbatim; a key containing `/`
    /// yields a path that cannot be looked up.
    pub fn register(&mut self, path: &NamespacePath, object: &Arc<ModuleObject>) {
        let replaced = self.unregister(path);
        if replaced > 0 {
            log::trace!("replaced {replaced} directory entries at `{path}`");
        }
        self.insert_tree(path, object);
    }

    fn insert_tree(&mut self, path: &NamespacePath, object: &Arc<ModuleObject>) {
        self.by_path.insert(path.clone(), Arc::clone(object));
        self.by_object.insert(object.id(), path.clone());
        log::trace!("indexed `{}` at `{path}`", object.class().name());
        for (key, child) in object.modules() {
            self.insert_tree(&path.child(key), child);
        }
    }

    /// Remove `path` and every path below it. Returns the number of entries removed.
    pub fn unregister(&mut self, path: &NamespacePath) -> usize {
        let removed: Vec<NamespacePath> = self
            .by_path
            .range(path.clone()..)
            .take_while(|(candidate, _)| candidate.starts_with(path))
            .map(|(candidate, _)| candidate.clone())
            .collect();
        for candidate in &removed {
            if let Some(object) = self.by_path.remove(candidate) {
                self.forget(object.id(), candidate);
            }
        }
        removed.len()
    }

    pub fn lookup(&self, path: &NamespacePath) -> Option<&Arc<ModuleObject>> {
        self.by_path.get(path)
    }

    pub fn path_of(&self, object: &ModuleObject) -> Option<&NamespacePath> {
        self.by_object.get(&object.id())
    }

    pub fn contains(&self, path: &NamespacePath) -> bool {
        self.by_path.contains_key(path)
    }

    /// Every indexed path, parents before children.
    pub fn paths(&self) -> impl Iterator<Item = &NamespacePath> {
        self.by_path.keys()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub(crate) fn binding(&self, object: &ModuleObject) -> Option<Arc<Binding>> {
        self.bindings.get(&object.id()).cloned()
    }

    /// Cache `binding` for `object` unless one is cached already; returns the cached one.
    pub(crate) fn cache_binding(&mut self, object: &ModuleObject, binding: Binding) -> Arc<Binding> {
        Arc::clone(
            self.bindings
                .entry(object.id())
                .or_insert_with(|| Arc::new(binding)),
        )
    }

    fn forget(&mut self, id: usize, path: &NamespacePath) {
        if self.by_object.get(&id) == Some(path) {
            self.by_object.remove(&id);
            self.bindings.remove(&id);
        }
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("paths", &self.by_path.keys().collect::<Vec<_>>())
            .field("bound", &self.bindings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;

    fn tree() -> Arc<ModuleObject> {
        let leaf = Class::builder("Leaf").build();
        let middle = Class::builder("Middle").module("b", &leaf).build();
        let root = Class::builder("Root")
            .module("a", &middle)
            .module("ab", &leaf)
            .build();
        Arc::new(root.instantiate())
    }

    #[test]
    fn index_records_both_directions() {
        let root = tree();
        let mut directory = Directory::new();
        directory.index(&root);

        let paths: Vec<String> = directory.paths().map(|p| p.joined()).collect();
        assert_eq!(paths, ["", "a", "a/b", "ab"]);

        let b = directory.lookup(&NamespacePath::parse("a/b")).unwrap().clone();
        assert_eq!(b.class().name(), "Leaf");
        assert_eq!(directory.path_of(&b), Some(&NamespacePath::parse("a/b")));
        assert_eq!(directory.path_of(&root), Some(&NamespacePath::root()));
    }

    #[test]
    fn unregister_removes_subtree_only() {
        let root = tree();
        let mut directory = Directory::new();
        directory.index(&root);
        let b = directory.lookup(&NamespacePath::parse("a/b")).unwrap().clone();

        // `ab` shares a prefix string with `a` but is not below it
        assert_eq!(directory.unregister(&NamespacePath::parse("a")), 2);
        assert!(!directory.contains(&NamespacePath::parse("a")));
        assert!(!directory.contains(&NamespacePath::parse("a/b")));
        assert!(directory.contains(&NamespacePath::parse("ab")));
        assert!(directory.path_of(&b).is_none());

        assert_eq!(directory.unregister(&NamespacePath::parse("a")), 0);
    }

    #[test]
    fn register_below_existing_tree() {
        let root = tree();
        let mut directory = Directory::new();
        directory.index(&root);

        let extra = Arc::new(Class::builder("Extra").build().instantiate());
        directory.register(&NamespacePath::parse("a/x"), &extra);
        assert_eq!(directory.len(), 5);
        assert_eq!(directory.path_of(&extra), Some(&NamespacePath::parse("a/x")));
    }

    #[test]
    fn register_replaces_whole_subtree() {
        let root = tree();
        let mut directory = Directory::new();
        directory.index(&root);
        let old_b = directory.lookup(&NamespacePath::parse("a/b")).unwrap().clone();

        let bare = Arc::new(Class::builder("Bare").build().instantiate());
        directory.register(&NamespacePath::parse("a"), &bare);

        assert!(Arc::ptr_eq(
            directory.lookup(&NamespacePath::parse("a")).unwrap(),
            &bare
        ));
        assert!(!directory.contains(&NamespacePath::parse("a/b")));
        assert!(directory.path_of(&old_b).is_none());
        assert!(directory.contains(&NamespacePath::parse("ab")));
        assert_eq!(directory.len(), 3);
    }
}
