use super::Event;
use std::marker::PhantomData;

/// Receives events from a container's broadcaster.
pub trait Listener: Send + Sync {
    fn on_event(&self, event: &Event) -> anyhow::Result<()>;

    /// Whether this listener wants `event`. Defaults to every event.
    fn supports(&self, _event: &Event) -> bool {
        true
    }
}

type Filter = Box<dyn Fn(&Event) -> bool + Send + Sync>;

/// A listener backed by a closure, optionally filtered.
///
/// # Example
/// ```
/// use corral::messaging::{Event, EventKind, FnListener, Listener};
///
/// let listener = FnListener::new(|event: &Event| {
///     println!("{} from {}", event.name(), event.source());
///     Ok(())
/// })
/// .filter(|event| matches!(event.kind(), EventKind::Refreshed));
///
/// assert!(listener.supports(&Event::new("app", EventKind::Refreshed)));
/// assert!(!listener.supports(&Event::new("app", EventKind::Closed)));
/// ```
pub struct FnListener<F> {
    handler: F,
    filter: Option<Filter>,
}

impl<F> FnListener<F>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            filter: None,
        }
    }

    pub fn filter<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }
}

impl<F> Listener for FnListener<F>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        (self.handler)(event)
    }

    fn supports(&self, event: &Event) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(event))
    }
}

/// A listener for payload events carrying a `T`; other events are skipped.
pub struct PayloadListener<T, F> {
    handler: F,
    _payload: PhantomData<fn(&T)>,
}

impl<T, F> PayloadListener<T, F>
where
    T: 'static,
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _payload: PhantomData,
        }
    }
}

impl<T, F> Listener for PayloadListener<T, F>
where
    T: 'static,
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        match event.payload_as::<T>() {
            Some(payload) => (self.handler)(payload),
            None => Ok(()),
        }
    }

    fn supports(&self, event: &Event) -> bool {
        event.payload_as::<T>().is_some()
    }
}
