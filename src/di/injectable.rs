use crate::di::ComponentRegistry;

/// Trait for types that can build themselves from the registry
///
/// Register one with [`ComponentDescriptor::injectable`](crate::di::ComponentDescriptor::injectable).
///
/// # Example
/// ```
/// use corral::di::{ComponentDescriptor, ComponentRegistry, Injectable};
/// use std::sync::Arc;
///
/// pub struct Database {
///     pub url: String,
/// }
///
/// pub struct UserService {
///     database: Arc<Database>,
/// }
///
/// impl Injectable for UserService {
///     fn inject(registry: &ComponentRegistry) -> anyhow::Result<Self> {
///         Ok(Self {
///             database: registry.get::<Database>("database")?,
///         })
///     }
/// }
///
/// let descriptor = ComponentDescriptor::injectable::<UserService>("userService").build();
/// assert_eq!(descriptor.name(), "userService");
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Create an instance by resolving dependencies from the registry
    ///
    /// # Errors
    /// Returns an error if any required dependency cannot be resolved.
    fn inject(registry: &ComponentRegistry) -> anyhow::Result<Self>;
}
