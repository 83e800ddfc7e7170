use crate::di::{ComponentDescriptor, ComponentRegistry};

/// Populates a fresh registry with descriptors and aliases.
///
/// Called once per refresh, on a registry whose policy flags are already
/// set. Any failure aborts the refresh and is reported as a descriptor
/// source error carrying the container's display name.
pub trait DescriptorSource: Send + Sync {
    fn load_descriptors(&self, registry: &ComponentRegistry) -> anyhow::Result<()>;
}

impl<F> DescriptorSource for F
where
    F: Fn(&ComponentRegistry) -> anyhow::Result<()> + Send + Sync,
{
    fn load_descriptors(&self, registry: &ComponentRegistry) -> anyhow::Result<()> {
        self(registry)
    }
}

/// A fixed list of descriptors and aliases, registered in order on every
/// refresh.
#[derive(Debug, Clone, Default)]
pub struct StaticDescriptorSource {
    descriptors: Vec<ComponentDescriptor>,
    aliases: Vec<(String, String)>,
}

impl StaticDescriptorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, descriptor: ComponentDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn alias(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.push((name.into(), alias.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl DescriptorSource for StaticDescriptorSource {
    fn load_descriptors(&self, registry: &ComponentRegistry) -> anyhow::Result<()> {
        for descriptor in &self.descriptors {
            registry.register_descriptor(descriptor.clone())?;
        }
        for (name, alias) in &self.aliases {
            registry.register_alias(name, alias)?;
        }
        tracing::debug!(
            "Loaded {} descriptors and {} aliases",
            self.descriptors.len(),
            self.aliases.len()
        );
        Ok(())
    }
}
