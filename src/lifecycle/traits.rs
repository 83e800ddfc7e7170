//! Lifecycle hook traits
//!
//! These traits define the contract for components that need to participate
//! in container lifecycle events.

use super::LifecycleError;

/// Called once a component has been constructed and post-processed
///
/// Use this hook to:
/// - Validate injected collaborators
/// - Open connections that the constructor deferred
/// - Warm up caches
///
/// Attach it to a descriptor with
/// [`DescriptorBuilder::init_hook`](crate::di::DescriptorBuilder::init_hook).
///
/// # Example
///
/// ```rust,ignore
/// use corral::lifecycle::{OnInit, LifecycleError};
///
/// impl OnInit for DatabaseService {
///     fn on_init(&self) -> Result<(), LifecycleError> {
///         self.pool.connect()
///             .map_err(|e| LifecycleError::hook_failed("database", e.to_string()))
///     }
/// }
/// ```
pub trait OnInit: Send + Sync {
    /// Called after construction, between the before- and after-initialization
    /// post-processor passes
    fn on_init(&self) -> Result<(), LifecycleError>;
}

/// Called when the owning registry destroys its singletons
///
/// Use this hook to:
/// - Close database connections
/// - Flush buffers
/// - Release acquired resources
///
/// # Note
///
/// Singletons are destroyed in **reverse order** of their creation, and a
/// singleton's dependents are destroyed before the singleton itself.
pub trait OnDestroy: Send + Sync {
    /// Called once, during registry teardown
    fn on_destroy(&self) -> Result<(), LifecycleError>;
}

/// A component with explicit start/stop semantics
///
/// Lifecycle components are started by the
/// [`LifecycleProcessor`](super::LifecycleProcessor) after every singleton of
/// the registry has been created, in ascending [`phase`](Lifecycle::phase)
/// order, and stopped in descending phase order when the container closes.
///
/// Components are shared, so implementations keep their running state behind
/// interior mutability.
///
/// # Example
///
/// ```rust,ignore
/// use corral::lifecycle::{Lifecycle, LifecycleError};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Poller {
///     running: AtomicBool,
/// }
///
/// impl Lifecycle for Poller {
///     fn start(&self) -> Result<(), LifecycleError> {
///         self.running.store(true, Ordering::SeqCst);
///         Ok(())
///     }
///
///     fn stop(&self) -> Result<(), LifecycleError> {
///         self.running.store(false, Ordering::SeqCst);
///         Ok(())
///     }
///
///     fn is_running(&self) -> bool {
///         self.running.load(Ordering::SeqCst)
///     }
/// }
/// ```
pub trait Lifecycle: Send + Sync {
    /// Start this component
    fn start(&self) -> Result<(), LifecycleError>;

    /// Stop this component
    fn stop(&self) -> Result<(), LifecycleError>;

    fn is_running(&self) -> bool;

    /// Phase used for ordering: lower phases start first and stop last
    fn phase(&self) -> i32 {
        0
    }

    /// Whether the component starts on container refresh, rather than only
    /// on an explicit [`Container::start`](crate::Container::start)
    fn is_auto_startup(&self) -> bool {
        true
    }
}
