use super::{Event, Payload};
use crate::error::Result;

/// Publishes events into a container.
///
/// Components can look one up by type; the container registers itself as
/// the resolvable `dyn EventPublisher`.
pub trait EventPublisher: Send + Sync {
    fn publish_event(&self, event: Event) -> Result<()>;

    /// Publish `payload` wrapped in an event sourced at this publisher.
    fn publish_payload(&self, payload: Payload) -> Result<()>;
}

impl dyn EventPublisher + '_ {
    pub fn publish<T: Send + Sync + 'static>(&self, value: T) -> Result<()> {
        self.publish_payload(Payload::new(value))
    }
}
