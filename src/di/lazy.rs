use crate::di::ComponentRegistry;
use crate::error::{ContainerError, Result};
use std::sync::{Arc, OnceLock, Weak};

/// A deferred reference to a named component, used to break dependency cycles.
///
/// `LazyRef<T>` holds a weak handle to the registry and resolves the component
/// only on first access, after every factory involved in the cycle has
/// returned. Obtain one with [`ComponentRegistry::lazy`], which refuses cyclic
/// requests when circular references are disabled.
///
/// Once resolved the reference is cached; it never keeps the registry alive.
pub struct LazyRef<T: ?Sized + Send + Sync + 'static> {
    registry: Weak<ComponentRegistry>,
    name: String,
    instance: OnceLock<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> LazyRef<T> {
    pub(crate) fn new(registry: Weak<ComponentRegistry>, name: impl Into<String>) -> Self {
        Self {
            registry,
            name: name.into(),
            instance: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_resolved(&self) -> bool {
        self.instance.get().is_some()
    }

    /// Resolve the component, caching it on success.
    ///
    /// # Errors
    /// Fails if the registry has been dropped or the lookup itself fails.
    pub fn get(&self) -> Result<Arc<T>> {
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }
        let registry = self.registry.upgrade().ok_or_else(|| {
            ContainerError::Internal(format!(
                "Registry behind lazy reference '{}' has been released",
                self.name
            ))
        })?;
        let resolved = registry.get::<T>(&self.name)?;
        Ok(Arc::clone(self.instance.get_or_init(|| resolved)))
    }
}

impl<T: ?Sized + Send + Sync + 'static> Clone for LazyRef<T> {
    fn clone(&self) -> Self {
        let instance = OnceLock::new();
        if let Some(resolved) = self.instance.get() {
            let _ = instance.set(Arc::clone(resolved));
        }
        Self {
            registry: self.registry.clone(),
            name: self.name.clone(),
            instance,
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> std::fmt::Debug for LazyRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyRef")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
