use super::container::{Container, ContainerInner};
use super::hooks::ContainerHooks;
use super::source::DescriptorSource;
use crate::config::{ContainerSettings, Environment};
use crate::di::ComponentRegistry;
use crate::lifecycle::ShutdownHooks;
use crate::messaging::Listener;
use crate::postprocess::FactoryPostProcessor;
use std::sync::Arc;
use uuid::Uuid;

/// Builder for constructing a [`Container`]
///
/// The container is built inactive; call [`Container::refresh`] to load it.
///
/// # Example
/// ```
/// use corral::context::ContainerBuilder;
/// use corral::di::ComponentDescriptor;
///
/// let container = ContainerBuilder::new()
///     .display_name("billing")
///     .descriptors(|registry| {
///         registry.register_descriptor(
///             ComponentDescriptor::builder("rate", |_| Ok(0.2f64)).build(),
///         )?;
///         Ok(())
///     })
///     .build();
///
/// container.refresh().unwrap();
/// assert_eq!(*container.get::<f64>("rate").unwrap(), 0.2);
/// container.close();
/// ```
pub struct ContainerBuilder {
    id: Option<String>,
    display_name: Option<String>,
    parent: Option<Container>,
    environment: Option<Environment>,
    source: Option<Arc<dyn DescriptorSource>>,
    allow_definition_overriding: Option<bool>,
    allow_circular_references: Option<bool>,
    hooks: ContainerHooks,
    factory_post_processors: Vec<Arc<dyn FactoryPostProcessor>>,
    listeners: Vec<Arc<dyn Listener>>,
    shutdown_hooks: Option<Arc<ShutdownHooks>>,
    register_shutdown_hook: bool,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self {
            id: None,
            display_name: None,
            parent: None,
            environment: None,
            source: None,
            allow_definition_overriding: None,
            allow_circular_references: None,
            hooks: ContainerHooks::default(),
            factory_post_processors: Vec::new(),
            listeners: Vec::new(),
            shutdown_hooks: None,
            register_shutdown_hook: false,
        }
    }

    /// Set the id; defaults to a unique `Container@<uuid>` string
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the display name; defaults to the id
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the parent container
    ///
    /// Events published in the child reach the parent's listeners, lookups
    /// fall back to the parent's registry and the parent's environment fills
    /// in properties the child does not define.
    pub fn parent(mut self, parent: &Container) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Set the collaborator that populates each new registry
    pub fn descriptor_source(mut self, source: impl DescriptorSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Populate each new registry with a closure
    pub fn descriptors<F>(self, load: F) -> Self
    where
        F: Fn(&ComponentRegistry) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.descriptor_source(load)
    }

    pub fn allow_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_definition_overriding = Some(allow);
        self
    }

    pub fn allow_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = Some(allow);
        self
    }

    pub fn hooks(mut self, hooks: ContainerHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn factory_post_processor(mut self, processor: Arc<dyn FactoryPostProcessor>) -> Self {
        self.factory_post_processors.push(processor);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Use a specific hook set instead of the process-wide one
    pub fn shutdown_hooks(mut self, hooks: Arc<ShutdownHooks>) -> Self {
        self.shutdown_hooks = Some(hooks);
        self
    }

    /// Register a shutdown hook after every successful refresh
    pub fn register_shutdown_hook(mut self, register: bool) -> Self {
        self.register_shutdown_hook = register;
        self
    }

    /// Apply settings bound from an [`Environment`]
    pub fn settings(mut self, settings: ContainerSettings) -> Self {
        if let Some(id) = settings.id {
            self.id = Some(id);
        }
        if let Some(name) = settings.display_name {
            self.display_name = Some(name);
        }
        if settings.allow_definition_overriding.is_some() {
            self.allow_definition_overriding = settings.allow_definition_overriding;
        }
        if settings.allow_circular_references.is_some() {
            self.allow_circular_references = settings.allow_circular_references;
        }
        self.register_shutdown_hook |= settings.register_shutdown_hook;
        self
    }

    /// Build the container
    pub fn build(self) -> Container {
        let id = self
            .id
            .unwrap_or_else(|| format!("Container@{}", Uuid::new_v4().simple()));
        let display_name = self.display_name.unwrap_or_else(|| id.clone());

        let environment = self.environment.unwrap_or_default();
        if let Some(parent) = &self.parent {
            environment.merge(parent.environment());
        }

        let source: Arc<dyn DescriptorSource> = match self.source {
            Some(source) => source,
            None => Arc::new(|_: &ComponentRegistry| -> anyhow::Result<()> { Ok(()) }),
        };

        Container {
            inner: Arc::new(ContainerInner::new(
                id,
                display_name,
                self.parent,
                environment,
                source,
                self.hooks,
                self.allow_definition_overriding,
                self.allow_circular_references,
                self.shutdown_hooks.unwrap_or_else(ShutdownHooks::global),
                self.register_shutdown_hook,
                self.factory_post_processors,
                self.listeners,
            )),
        }
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContainerState;

    #[test]
    fn test_defaults() {
        let container = ContainerBuilder::new().build();
        assert!(container.id().starts_with("Container@"));
        assert_eq!(container.display_name(), container.id());
        assert_eq!(container.state(), ContainerState::Fresh);
        assert!(container.parent().is_none());
        assert!(container.startup_timestamp().is_none());
    }

    #[test]
    fn test_settings_from_environment() {
        let env = Environment::new();
        env.set("container.id", "orders");
        env.set("container.display-name", "Order service");
        env.set("container.allow-circular-references", "false");
        let settings = ContainerSettings::from_environment(&env).unwrap();

        let container = ContainerBuilder::new()
            .environment(env)
            .settings(settings)
            .build();
        assert_eq!(container.id(), "orders");
        assert_eq!(container.display_name(), "Order service");
        assert_eq!(container.inner.allow_circular_references, Some(false));
        assert_eq!(container.inner.allow_definition_overriding, None);
    }

    #[test]
    fn test_child_merges_parent_environment() {
        let parent_env = Environment::new();
        parent_env.set("region", "eu-west");
        parent_env.set("tier", "parent");
        let parent = ContainerBuilder::new().environment(parent_env).build();

        let child_env = Environment::new();
        child_env.set("tier", "child");
        let child = ContainerBuilder::new()
            .parent(&parent)
            .environment(child_env)
            .build();

        assert_eq!(child.environment().get("region").as_deref(), Some("eu-west"));
        assert_eq!(child.environment().get("tier").as_deref(), Some("child"));
        assert_eq!(child.parent().map(Container::id), Some(parent.id()));
    }
}
