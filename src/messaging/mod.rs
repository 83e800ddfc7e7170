//! Synchronous container events.
//!
//! Events published before a container's broadcaster exists are buffered
//! and delivered once listeners are registered during refresh.

mod broadcaster;
mod event;
mod listener;
mod publisher;

pub use broadcaster::{ErrorHandler, EventBroadcaster, ListenerMatcher, SimpleEventBroadcaster};
pub use event::{Event, EventKind, Payload};
pub use listener::{FnListener, Listener, PayloadListener};
pub use publisher::EventPublisher;
