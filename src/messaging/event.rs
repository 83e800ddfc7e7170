use crate::caches::short_type_name;
use chrono::{DateTime, Utc};
use std::any::{Any, TypeId};
use std::sync::Arc;
use strum_macros::AsRefStr;
use uuid::Uuid;

/// An arbitrary value published as an event.
#[derive(Clone)]
pub struct Payload {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: Arc<str>,
}

impl Payload {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: short_type_name::<T>(),
        }
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// The container finished a refresh
    Refreshed,
    /// Lifecycle components were started explicitly
    Started,
    /// Lifecycle components were stopped explicitly
    Stopped,
    /// The container is closing
    Closed,
    /// An application-defined event identified by name
    Custom(String),
    /// A published value wrapped in an envelope
    Payload(Payload),
}

/// Something that happened in a container, delivered to its listeners and
/// then to the listeners of every ancestor container.
#[derive(Debug, Clone)]
pub struct Event {
    id: Uuid,
    source: String,
    timestamp: DateTime<Utc>,
    kind: EventKind,
}

impl Event {
    pub fn new(source: impl Into<String>, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn custom(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(source, EventKind::Custom(name.into()))
    }

    pub fn payload<T: Send + Sync + 'static>(source: impl Into<String>, value: T) -> Self {
        Self::new(source, EventKind::Payload(Payload::new(value)))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Id of the container that published the event.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Name used in logs and errors.
    pub fn name(&self) -> &str {
        match &self.kind {
            EventKind::Custom(name) => name,
            EventKind::Payload(payload) => payload.type_name(),
            other => other.as_ref(),
        }
    }

    /// The wrapped value, if this is a payload event carrying a `T`.
    pub fn payload_as<T: 'static>(&self) -> Option<&T> {
        match &self.kind {
            EventKind::Payload(payload) => payload.downcast_ref::<T>(),
            _ => None,
        }
    }
}
