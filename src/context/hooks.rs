use super::Container;
use crate::config::Environment;
use crate::di::ComponentRegistry;
use crate::error::{ContainerError, Result};
use std::sync::Arc;

type EnvironmentHook = Arc<dyn Fn(&Environment) -> anyhow::Result<()> + Send + Sync>;
type RegistryHook = Arc<dyn Fn(&ComponentRegistry) -> anyhow::Result<()> + Send + Sync>;
type ContainerHook = Arc<dyn Fn(&Container) -> anyhow::Result<()> + Send + Sync>;

/// Optional callbacks a container runs at fixed points of its refresh and
/// close sequences. Every hook defaults to doing nothing.
///
/// | hook | runs |
/// |---|---|
/// | `init_property_sources` | before required properties are validated |
/// | `customize_registry` | on each new registry, before descriptors load |
/// | `post_process_registry` | after loading, before factory post-processors |
/// | `on_refresh` | after the broadcaster exists, before listeners register |
/// | `on_close` | after singletons are destroyed |
#[derive(Clone, Default)]
pub struct ContainerHooks {
    init_property_sources: Option<EnvironmentHook>,
    customize_registry: Option<RegistryHook>,
    post_process_registry: Option<RegistryHook>,
    on_refresh: Option<ContainerHook>,
    on_close: Option<ContainerHook>,
}

impl ContainerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_property_sources<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Environment) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.init_property_sources = Some(Arc::new(hook));
        self
    }

    pub fn customize_registry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ComponentRegistry) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.customize_registry = Some(Arc::new(hook));
        self
    }

    pub fn post_process_registry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ComponentRegistry) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.post_process_registry = Some(Arc::new(hook));
        self
    }

    pub fn on_refresh<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Container) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_refresh = Some(Arc::new(hook));
        self
    }

    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Container) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(hook));
        self
    }

    pub(crate) fn run_init_property_sources(&self, environment: &Environment) -> Result<()> {
        run("init_property_sources", self.init_property_sources.as_ref(), environment)
    }

    pub(crate) fn run_customize_registry(&self, registry: &ComponentRegistry) -> Result<()> {
        run("customize_registry", self.customize_registry.as_ref(), registry)
    }

    pub(crate) fn run_post_process_registry(&self, registry: &ComponentRegistry) -> Result<()> {
        run("post_process_registry", self.post_process_registry.as_ref(), registry)
    }

    pub(crate) fn run_on_refresh(&self, container: &Container) -> Result<()> {
        run("on_refresh", self.on_refresh.as_ref(), container)
    }

    pub(crate) fn run_on_close(&self, container: &Container) -> Result<()> {
        run("on_close", self.on_close.as_ref(), container)
    }
}

fn run<A: ?Sized>(
    name: &'static str,
    hook: Option<&Arc<dyn Fn(&A) -> anyhow::Result<()> + Send + Sync>>,
    arg: &A,
) -> Result<()> {
    match hook {
        Some(hook) => hook(arg).map_err(|source| ContainerError::Hook { hook: name, source }),
        None => Ok(()),
    }
}

impl std::fmt::Debug for ContainerHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerHooks")
            .field("init_property_sources", &self.init_property_sources.is_some())
            .field("customize_registry", &self.customize_registry.is_some())
            .field("post_process_registry", &self.post_process_registry.is_some())
            .field("on_refresh", &self.on_refresh.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}
