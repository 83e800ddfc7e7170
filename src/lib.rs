//! # Corral
//!
//! A refreshable dependency-injection container for Rust.
//!
//! A [`Container`] loads component descriptors into a fresh
//! [`ComponentRegistry`] on every refresh, runs registry- and component-level
//! post-processors, delivers events to listeners (buffering the ones published
//! before listeners exist), creates its singletons and starts lifecycle
//! components. Closing it stops and destroys everything exactly once, in
//! reverse order.
//!
//! ## Features
//!
//! - **Replaceable registry**: each refresh builds and installs a new registry
//!   only after the previous one is fully torn down
//! - **Atomic refresh**: a failed refresh destroys what it created and leaves
//!   the container inactive and ready for a retry
//! - **Trait object support**: view components as `Arc<dyn Trait>`
//! - **Events**: synchronous listeners, early-event buffering, propagation to
//!   parent containers
//! - **Lifecycle**: phase-ordered start/stop, init/destroy callbacks, process
//!   exit hooks
//!
//! ## Quick Start
//!
//! ```rust
//! use corral::prelude::*;
//!
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! let container = ContainerBuilder::new()
//!     .display_name("app")
//!     .descriptors(|registry| {
//!         registry.register_descriptor(
//!             ComponentDescriptor::builder("greeter", |_| {
//!                 Ok(Greeter { greeting: "hello".into() })
//!             })
//!             .build(),
//!         )?;
//!         Ok(())
//!     })
//!     .listener(Arc::new(FnListener::new(|event: &Event| {
//!         tracing::info!("{} from {}", event.name(), event.source());
//!         Ok(())
//!     })))
//!     .build();
//!
//! container.refresh()?;
//! assert_eq!(container.get::<Greeter>("greeter")?.greeting, "hello");
//! container.close();
//! # Ok::<(), corral::ContainerError>(())
//! ```

pub mod caches;
pub mod config;
pub mod context;
pub mod di;
pub mod diagnostics;
pub mod error;
pub mod lifecycle;
pub mod messaging;
pub mod postprocess;

// Re-export core types
pub use config::{ContainerSettings, Environment};
pub use context::{Container, ContainerBuilder, ContainerHooks, ContainerState, WeakContainer};
pub use di::{ComponentDescriptor, ComponentRegistry, Injectable, LazyRef, Scope};
pub use error::{ContainerError, Result};

/// Prelude module for convenient imports
///
/// ```
/// use corral::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ContainerSettings, Environment};
    pub use crate::context::{
        Container, ContainerBuilder, ContainerHooks, ContainerState, DescriptorSource,
        MessageSource, StaticDescriptorSource, StaticMessageSource, WeakContainer,
    };
    pub use crate::di::{
        ComponentDescriptor, ComponentRef, ComponentRegistry, DescriptorBuilder, Injectable,
        LazyRef, Scope,
    };
    pub use crate::error::{ContainerError, Result};
    pub use crate::lifecycle::{
        Lifecycle, LifecycleError, LifecycleProcessor, OnDestroy, OnInit, ShutdownHandler,
        ShutdownHooks, shutdown_signal,
    };
    pub use crate::messaging::{
        Event, EventBroadcaster, EventKind, EventPublisher, FnListener, Listener, PayloadListener,
    };
    pub use crate::postprocess::{ComponentPostProcessor, FactoryPostProcessor, OrderHint};
    pub use std::sync::Arc;
}
