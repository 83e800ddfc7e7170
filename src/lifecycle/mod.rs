//! Lifecycle Module
//!
//! Init/destroy hooks for individual components, start/stop semantics for
//! long-running ones, and process-exit hooks for containers.
//!
//! # Lifecycle Phases
//!
//! ```text
//! 1. Descriptors loaded, post-processors run
//!    ↓
//! 2. Singletons created
//!    - OnInit (each component)          ← init callback
//!    ↓
//! 3. LifecycleProcessor::on_refresh     ← Lifecycle::start, ascending phase
//!    ↓
//! [Running...]
//!    ↓
//! 4. Container::close (explicit, or from a shutdown hook)
//!    ↓
//! 5. LifecycleProcessor::on_close       ← Lifecycle::stop, descending phase
//!    ↓
//! 6. Singletons destroyed
//!    - OnDestroy (reverse creation order) ← destroy callback
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use corral::di::ComponentDescriptor;
//! use corral::lifecycle::{LifecycleError, OnDestroy, OnInit};
//!
//! impl OnInit for DatabaseService {
//!     fn on_init(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Initializing database connection");
//!         Ok(())
//!     }
//! }
//!
//! impl OnDestroy for DatabaseService {
//!     fn on_destroy(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Closing database connections");
//!         Ok(())
//!     }
//! }
//!
//! let descriptor = ComponentDescriptor::injectable::<DatabaseService>("database")
//!     .init_hook()
//!     .destroy_hook()
//!     .build();
//! ```

mod error;
mod processor;
mod shutdown;
mod traits;

pub use error::{LifecycleError, Result};
pub use processor::{DefaultLifecycleProcessor, LifecycleProcessor};
pub use shutdown::{
    HookId, ShutdownHandler, ShutdownHooks, install_signal_handler, shutdown_signal,
};
pub use traits::{Lifecycle, OnDestroy, OnInit};
