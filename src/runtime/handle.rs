use crate::class::{Class, ModuleObject};
use crate::compiler::compile;
use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::namespace::NamespacePath;
use crate::store::{Module, Store};
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type ObjectFactory = Arc<dyn Fn() -> ModuleObject + Send + Sync>;

/// What a [`ModuleStore`] is created from.
#[derive(Clone)]
pub enum StoreOptions {
    /// Instantiate the class, with its declared submodules
    Class(Class),
    /// Use an existing declaring object
    Object(Arc<ModuleObject>),
    /// Build the declaring object on creation
    Factory(ObjectFactory),
    /// A bare module description. It has no declarations to compile and is
    /// rejected; register descriptions with [`ModuleStore::register_raw`].
    Raw(Module),
}

impl StoreOptions {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn() -> ModuleObject + Send + Sync + 'static,
    {
        StoreOptions::Factory(Arc::new(f))
    }
}

impl From<Class> for StoreOptions {
    fn from(class: Class) -> Self {
        StoreOptions::Class(class)
    }
}

impl From<&Class> for StoreOptions {
    fn from(class: &Class) -> Self {
        StoreOptions::Class(class.clone())
    }
}

impl From<ModuleObject> for StoreOptions {
    fn from(object: ModuleObject) -> Self {
        StoreOptions::Object(Arc::new(object))
    }
}

impl From<Arc<ModuleObject>> for StoreOptions {
    fn from(object: Arc<ModuleObject>) -> Self {
        StoreOptions::Object(object)
    }
}

impl From<Module> for StoreOptions {
    fn from(module: Module) -> Self {
        StoreOptions::Raw(module)
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOptions::Class(class) => f.debug_tuple("Class").field(class).finish(),
            StoreOptions::Object(object) => f.debug_tuple("Object").field(object).finish(),
            StoreOptions::Factory(_) => f.write_str("Factory"),
            StoreOptions::Raw(module) => f.debug_tuple("Raw").field(module).finish(),
        }
    }
}

/// Store built from a module class, together with its instance directory.
///
/// This is the explicit handle every registration and resolution goes
/// through. Cloning is cheap; clones share the store and the directory.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tinclass::{Class, ModuleStore};
///
/// let todo = Class::builder("Todo")
///     .getset("title", json!(""))
///     .build();
/// let store = ModuleStore::new(&todo).unwrap();
///
/// let live = store.get_module(&todo, "").unwrap();
/// live.set("title", json!("write docs")).unwrap();
/// assert_eq!(store.state()["title"], json!("write docs"));
/// ```
#[derive(Clone)]
pub struct ModuleStore {
    store: Store,
    directory: Arc<RwLock<Directory>>,
}

impl ModuleStore {
    /// Compile the root declaring object and create the store.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for [`StoreOptions::Raw`] or an invalid module tree.
    pub fn new(options: impl Into<StoreOptions>) -> Result<Self> {
        let root = match options.into() {
            StoreOptions::Class(class) => Arc::new(class.instantiate()),
            StoreOptions::Object(object) => object,
            StoreOptions::Factory(factory) => Arc::new(factory()),
            StoreOptions::Raw(_) => {
                return Err(Error::Configuration(
                    "store options must be a module class or declaring object".to_string(),
                ))
            }
        };
        let directory = Arc::new(RwLock::new(Directory::new()));
        let module = compile(&root, &directory, false)?;
        let store = Store::new(module);
        directory.write().index(&root);
        log::debug!(
            "module store created for `{}` ({} module(s))",
            root.class().name(),
            directory.read().len()
        );
        Ok(Self { store, directory })
    }

    pub(crate) fn from_parts(store: Store, directory: Arc<RwLock<Directory>>) -> Self {
        Self { store, directory }
    }

    /// The underlying store runtime.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn state(&self) -> Value {
        self.store.state()
    }

    pub(crate) fn directory(&self) -> &Arc<RwLock<Directory>> {
        &self.directory
    }

    /// Compile `object` and install it, with its submodules, at `path`.
    ///
    /// The parent of `path` must be registered.
    pub fn register_module(
        &self,
        path: impl Into<NamespacePath>,
        object: impl Into<Arc<ModuleObject>>,
    ) -> Result<()> {
        let path = path.into();
        let object = object.into();
        let module = compile(&object, &self.directory, true)?;
        self.store.register_module(&path, module)?;
        self.directory.write().register(&path, &object);
        Ok(())
    }

    /// Install a hand-written module description at `path`.
    ///
    /// It has no declaring object, so it cannot be resolved to a live module.
    pub fn register_raw(&self, path: impl Into<NamespacePath>, module: Module) -> Result<()> {
        self.store.register_module(path, module)
    }

    /// Remove the module at `path` and everything below it.
    ///
    /// Unregistering a path that is not registered is a no-op.
    pub fn unregister_module(&self, path: impl Into<NamespacePath>) -> Result<()> {
        let path = path.into();
        self.store.unregister_module(&path)?;
        let removed = self.directory.write().unregister(&path);
        log::trace!("dropped {removed} directory entries at `{path}`");
        Ok(())
    }

    /// True when a module is installed at `path`.
    pub fn is_registered(&self, path: impl Into<NamespacePath>) -> bool {
        self.store.has_module(&path.into())
    }
}

impl fmt::Debug for ModuleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleStore")
            .field("store", &self.store)
            .field("directory", &*self.directory.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_class(name: &str, value: &str) -> Class {
        Class::builder(name).getset("field", json!(value)).build()
    }

    #[test]
    fn raw_options_are_rejected() {
        assert!(matches!(
            ModuleStore::new(Module::new()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn factory_options() {
        let class = field_class("Test", "initial");
        let factory_class = class.clone();
        let store = ModuleStore::new(StoreOptions::factory(move || {
            factory_class.instantiate().with_state("field", json!("from factory"))
        }))
        .unwrap();
        assert_eq!(store.state()["field"], json!("from factory"));
    }

    #[test]
    fn dynamic_registration() {
        let store = ModuleStore::new(Class::builder("Root").build()).unwrap();
        let x = field_class("X", "x");
        let y = field_class("Y", "y");

        store.register_module("x", x.instantiate()).unwrap();
        store.register_module(["x", "y"], y.instantiate()).unwrap();
        assert!(store.is_registered("x/y"));
        assert_eq!(store.state()["x"]["y"]["field"], json!("y"));
        assert!(store.directory().read().contains(&NamespacePath::parse("x/y")));

        store.unregister_module("x/y").unwrap();
        assert!(!store.is_registered("x/y"));
        assert!(store.is_registered("x"));
        assert!(store.state()["x"].get("y").is_none());
        assert!(!store.directory().read().contains(&NamespacePath::parse("x/y")));
    }

    #[test]
    fn failed_registration_leaves_directory_untouched() {
        let store = ModuleStore::new(Class::builder("Root").build()).unwrap();
        let y = field_class("Y", "y");
        assert!(store.register_module("missing/y", y.instantiate()).is_err());
        assert_eq!(store.directory().read().len(), 1);
    }
}
