use super::{Event, Listener};
use crate::di::ComponentRegistry;
use crate::error::{ContainerError, Result};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Decides whether a listener receives an event.
pub type ListenerMatcher = Arc<dyn Fn(&dyn Listener, &Event) -> bool + Send + Sync>;

/// Receives listener failures instead of aborting the broadcast.
pub type ErrorHandler = Arc<dyn Fn(&Event, anyhow::Error) + Send + Sync>;

/// Synchronous delivery of events to registered listeners.
pub trait EventBroadcaster: Send + Sync {
    fn add_listener(&self, listener: Arc<dyn Listener>);

    /// Register a listener defined as a component, resolved at delivery time.
    fn add_listener_component(&self, name: &str);

    fn remove_listener(&self, listener: &Arc<dyn Listener>) -> bool;

    fn remove_all_listeners(&self);

    /// Deliver `event` to every matching listener, in registration order.
    fn broadcast(&self, event: &Event) -> Result<()>;

    fn listener_count(&self) -> usize;
}

#[derive(Clone)]
enum Entry {
    Instance(Arc<dyn Listener>),
    Component(String),
}

/// Default [`EventBroadcaster`].
///
/// Listeners run on the publishing thread. Without an error handler the
/// first failing listener stops the broadcast and its error is returned.
pub struct SimpleEventBroadcaster {
    registry: Option<Weak<ComponentRegistry>>,
    entries: RwLock<Vec<Entry>>,
    matcher: ListenerMatcher,
    error_handler: RwLock<Option<ErrorHandler>>,
}

impl Default for SimpleEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleEventBroadcaster {
    pub fn new() -> Self {
        Self {
            registry: None,
            entries: RwLock::new(Vec::new()),
            matcher: Arc::new(|listener: &dyn Listener, event: &Event| listener.supports(event)),
            error_handler: RwLock::new(None),
        }
    }

    /// A broadcaster able to resolve listener components from `registry`.
    pub fn with_registry(registry: &Arc<ComponentRegistry>) -> Self {
        Self {
            registry: Some(Arc::downgrade(registry)),
            ..Self::new()
        }
    }

    /// Replace the default matcher, which asks each listener's
    /// [`supports`](Listener::supports).
    pub fn with_matcher<M>(mut self, matcher: M) -> Self
    where
        M: Fn(&dyn Listener, &Event) -> bool + Send + Sync + 'static,
    {
        self.matcher = Arc::new(matcher);
        self
    }

    pub fn set_error_handler(&self, handler: Option<ErrorHandler>) {
        *self.error_handler.write() = handler;
    }

    fn resolve(&self, entries: &[Entry]) -> Result<Vec<Arc<dyn Listener>>> {
        let mut listeners: Vec<Arc<dyn Listener>> = Vec::with_capacity(entries.len());
        for entry in entries {
            let listener = match entry {
                Entry::Instance(listener) => Arc::clone(listener),
                Entry::Component(name) => {
                    let registry = self
                        .registry
                        .as_ref()
                        .and_then(Weak::upgrade)
                        .ok_or(ContainerError::NotInitialized("component registry"))?;
                    registry.get::<dyn Listener>(name)?
                }
            };
            if !listeners.iter().any(|known| Arc::ptr_eq(known, &listener)) {
                listeners.push(listener);
            }
        }
        Ok(listeners)
    }
}

impl EventBroadcaster for SimpleEventBroadcaster {
    fn add_listener(&self, listener: Arc<dyn Listener>) {
        let mut entries = self.entries.write();
        let known = entries.iter().any(|entry| match entry {
            Entry::Instance(existing) => Arc::ptr_eq(existing, &listener),
            Entry::Component(_) => false,
        });
        if !known {
            entries.push(Entry::Instance(listener));
        }
    }

    fn add_listener_component(&self, name: &str) {
        let mut entries = self.entries.write();
        let known = entries
            .iter()
            .any(|entry| matches!(entry, Entry::Component(existing) if existing == name));
        if !known {
            entries.push(Entry::Component(name.to_string()));
        }
    }

    fn remove_listener(&self, listener: &Arc<dyn Listener>) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| match entry {
            Entry::Instance(existing) => !Arc::ptr_eq(existing, listener),
            Entry::Component(_) => true,
        });
        entries.len() != before
    }

    fn remove_all_listeners(&self) {
        self.entries.write().clear();
    }

    fn broadcast(&self, event: &Event) -> Result<()> {
        let entries = self.entries.read().clone();
        let listeners = self.resolve(&entries)?;
        let handler = self.error_handler.read().clone();

        for listener in listeners {
            if !(self.matcher)(listener.as_ref(), event) {
                continue;
            }
            if let Err(e) = listener.on_event(event) {
                match &handler {
                    Some(handler) => handler(event, e),
                    None => {
                        return Err(ContainerError::Listener {
                            event: event.name().to_string(),
                            source: e,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn listener_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::ComponentDescriptor;
    use crate::messaging::{EventKind, FnListener};
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(label: &'static str, log: &Log) -> Arc<dyn Listener> {
        let log = Arc::clone(log);
        Arc::new(FnListener::new(move |event: &Event| {
            log.lock().push(format!("{label}:{}", event.name()));
            Ok(())
        }))
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let log: Log = Arc::default();
        let broadcaster = SimpleEventBroadcaster::new();
        let first = recorder("first", &log);
        broadcaster.add_listener(Arc::clone(&first));
        broadcaster.add_listener(recorder("second", &log));
        broadcaster.add_listener(first);

        broadcaster
            .broadcast(&Event::custom("ctx", "ping"))
            .unwrap();
        assert_eq!(broadcaster.listener_count(), 2);
        assert_eq!(*log.lock(), vec!["first:ping", "second:ping"]);
    }

    #[test]
    fn test_component_listeners_resolved_at_broadcast() {
        let log: Log = Arc::default();
        let registry = ComponentRegistry::new();
        let broadcaster = SimpleEventBroadcaster::with_registry(&registry);
        broadcaster.add_listener_component("audit");

        let sink = Arc::clone(&log);
        registry
            .register_descriptor(
                ComponentDescriptor::builder("audit", move |_| {
                    let sink = Arc::clone(&sink);
                    Ok(FnListener::new(move |event: &Event| {
                        sink.lock().push(format!("audit:{}", event.name()));
                        Ok(())
                    }))
                })
                .listener()
                .build(),
            )
            .unwrap();

        broadcaster
            .broadcast(&Event::new("ctx", EventKind::Refreshed))
            .unwrap();
        assert_eq!(*log.lock(), vec!["audit:refreshed"]);
    }

    #[test]
    fn test_failure_stops_broadcast_without_handler() {
        let log: Log = Arc::default();
        let broadcaster = SimpleEventBroadcaster::new();
        broadcaster.add_listener(Arc::new(FnListener::new(|_: &Event| {
            anyhow::bail!("listener exploded")
        })));
        broadcaster.add_listener(recorder("after", &log));

        let err = broadcaster
            .broadcast(&Event::custom("ctx", "boom"))
            .unwrap_err();
        assert!(matches!(err, ContainerError::Listener { ref event, .. } if event == "boom"));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_error_handler_keeps_delivering() {
        let log: Log = Arc::default();
        let failures: Log = Arc::default();
        let broadcaster = SimpleEventBroadcaster::new();
        let sink = Arc::clone(&failures);
        broadcaster.set_error_handler(Some(Arc::new(move |event: &Event, e: anyhow::Error| {
            sink.lock().push(format!("{}:{e}", event.name()));
        })));
        broadcaster.add_listener(Arc::new(FnListener::new(|_: &Event| {
            anyhow::bail!("listener exploded")
        })));
        broadcaster.add_listener(recorder("after", &log));

        broadcaster
            .broadcast(&Event::custom("ctx", "boom"))
            .unwrap();
        assert_eq!(*failures.lock(), vec!["boom:listener exploded"]);
        assert_eq!(*log.lock(), vec!["after:boom"]);
    }

    #[test]
    fn test_custom_matcher_and_removal() {
        let log: Log = Arc::default();
        let broadcaster = SimpleEventBroadcaster::new()
            .with_matcher(|_, event| !matches!(event.kind(), EventKind::Closed));
        let listener = recorder("only", &log);
        broadcaster.add_listener(Arc::clone(&listener));

        broadcaster
            .broadcast(&Event::new("ctx", EventKind::Closed))
            .unwrap();
        broadcaster
            .broadcast(&Event::new("ctx", EventKind::Started))
            .unwrap();
        assert_eq!(*log.lock(), vec!["only:started"]);

        assert!(broadcaster.remove_listener(&listener));
        assert!(!broadcaster.remove_listener(&listener));
        assert_eq!(broadcaster.listener_count(), 0);
    }
}
