use super::live::LiveModule;
use super::table::Binding;
use crate::class::{Class, ModuleObject};
use crate::error::{Error, Result};
use crate::namespace::{self, NamespacePath};
use crate::runtime::ModuleStore;
use std::sync::Arc;

impl ModuleStore {
    /// Live module of type `class` at an absolute namespace (`""` for the root).
    ///
    /// # Errors
    ///
    /// [`Error::NamespaceResolution`] when nothing is registered there or the
    /// namespace is relative, [`Error::TypeMismatch`] when the module found is
    /// not a `class`, [`Error::Declaration`] when its declarations cannot be
    /// bound.
    pub fn get_module(&self, class: &Class, namespace: &str) -> Result<LiveModule> {
        let path = namespace::resolve(namespace, None)?;
        self.resolve_typed(class, &path)
    }

    /// Like [`get_module`](ModuleStore::get_module), with `.` and `..`
    /// resolved against the path of `context`.
    pub fn get_module_from(
        &self,
        class: &Class,
        namespace: &str,
        context: &LiveModule,
    ) -> Result<LiveModule> {
        let path = if namespace::is_relative(namespace) {
            let base = context.path()?;
            namespace::resolve(namespace, Some(&base))?
        } else {
            namespace::resolve(namespace, None)?
        };
        self.resolve_typed(class, &path)
    }

    /// Live module at an absolute namespace, whatever its class.
    pub fn module_at(&self, namespace: &str) -> Result<LiveModule> {
        let path = namespace::resolve(namespace, None)?;
        let object = self.lookup(&path)?;
        self.bind(&object)
    }

    /// Live module of the root object.
    pub fn root(&self) -> Result<LiveModule> {
        self.module_at("")
    }

    /// Bind a registered declaring object, reusing its cached member table.
    pub(crate) fn bind(&self, object: &Arc<ModuleObject>) -> Result<LiveModule> {
        let cached = {
            let directory = self.directory().read();
            if directory.path_of(object).is_none() {
                return Err(Error::namespace(
                    format!("<{}>", object.class().name()),
                    "the module instance is not registered in this store",
                ));
            }
            directory.binding(object)
        };
        let binding = match cached {
            Some(binding) => binding,
            None => {
                let binding = Binding::build(object)?;
                self.directory().write().cache_binding(object, binding)
            }
        };
        Ok(LiveModule::new(self.clone(), Arc::clone(object), binding))
    }

    fn lookup(&self, path: &NamespacePath) -> Result<Arc<ModuleObject>> {
        self.directory()
            .read()
            .lookup(path)
            .cloned()
            .ok_or_else(|| Error::namespace(path, "no module instance at this namespace"))
    }

    fn resolve_typed(&self, class: &Class, path: &NamespacePath) -> Result<LiveModule> {
        let object = self.lookup(path)?;
        if !object.class().is_a(class) {
            return Err(Error::TypeMismatch {
                requested: class.name().to_string(),
                found: object.class().name().to_string(),
                namespace: path.to_string(),
            });
        }
        log::trace!("resolved `{}` at `{path}`", class.name());
        self.bind(&object)
    }
}
