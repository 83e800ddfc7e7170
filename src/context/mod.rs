//! The refreshable container.
//!
//! A [`Container`] owns one [`ComponentRegistry`](crate::di::ComponentRegistry)
//! at a time. `refresh` replaces it with a freshly loaded one and `close`
//! tears it down; both are serialized per container.

mod builder;
mod container;
mod hooks;
mod message;
mod source;


pub use builder::ContainerBuilder;
pub use container::{
    Container, ContainerState, ENVIRONMENT_NAME, EVENT_BROADCASTER_NAME, LIFECYCLE_PROCESSOR_NAME,
    MESSAGE_SOURCE_NAME, WeakContainer,
};
pub use hooks::ContainerHooks;
pub use message::{DelegatingMessageSource, MessageSource, StaticMessageSource, format_message};
pub use source::{DescriptorSource, StaticDescriptorSource};
