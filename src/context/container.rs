use super::hooks::ContainerHooks;
use super::message::{DelegatingMessageSource, MessageSource};
use super::source::DescriptorSource;
use crate::caches;
use crate::config::Environment;
use crate::di::ComponentRegistry;
use crate::diagnostics;
use crate::error::{ContainerError, Result};
use crate::lifecycle::{DefaultLifecycleProcessor, HookId, LifecycleProcessor, ShutdownHooks};
use crate::messaging::{
    Event, EventBroadcaster, EventKind, EventPublisher, Listener, Payload, SimpleEventBroadcaster,
};
use crate::postprocess::{self, FactoryPostProcessor};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use strum_macros::{AsRefStr, Display};

/// Reserved name of the message source component.
pub const MESSAGE_SOURCE_NAME: &str = "messageSource";
/// Reserved name of the event broadcaster component.
pub const EVENT_BROADCASTER_NAME: &str = "eventBroadcaster";
/// Reserved name of the lifecycle processor component.
pub const LIFECYCLE_PROCESSOR_NAME: &str = "lifecycleProcessor";
/// Name the container's [`Environment`] is registered under.
pub const ENVIRONMENT_NAME: &str = "environment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// Never refreshed, or the last refresh failed
    Fresh,
    Active,
    Closed,
}

pub(super) struct ContainerInner {
    pub(super) id: String,
    pub(super) display_name: String,
    pub(super) parent: Option<Container>,
    pub(super) environment: Environment,
    pub(super) source: Arc<dyn DescriptorSource>,
    pub(super) hooks: ContainerHooks,
    pub(super) allow_definition_overriding: Option<bool>,
    pub(super) allow_circular_references: Option<bool>,
    pub(super) shutdown_hooks: Arc<ShutdownHooks>,
    pub(super) register_shutdown_hook_on_refresh: bool,
    pub(super) factory_post_processors: RwLock<Vec<Arc<dyn FactoryPostProcessor>>>,
    pub(super) static_listeners: RwLock<Vec<Arc<dyn Listener>>>,

    startup: RwLock<Option<DateTime<Utc>>>,
    active: AtomicBool,
    closed: AtomicBool,
    /// Serializes refresh and close.
    cycle_lock: ReentrantMutex<()>,
    /// Guards the registry reference only, never the work of building it.
    registry: Mutex<Option<Arc<ComponentRegistry>>>,
    early_events: Mutex<Option<Vec<Event>>>,
    broadcaster: RwLock<Option<Arc<dyn EventBroadcaster>>>,
    lifecycle_processor: RwLock<Option<Arc<dyn LifecycleProcessor>>>,
    message_source: RwLock<Option<Arc<dyn MessageSource>>>,
    shutdown_hook: Mutex<Option<HookId>>,
}

impl ContainerInner {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        id: String,
        display_name: String,
        parent: Option<Container>,
        environment: Environment,
        source: Arc<dyn DescriptorSource>,
        hooks: ContainerHooks,
        allow_definition_overriding: Option<bool>,
        allow_circular_references: Option<bool>,
        shutdown_hooks: Arc<ShutdownHooks>,
        register_shutdown_hook_on_refresh: bool,
        factory_post_processors: Vec<Arc<dyn FactoryPostProcessor>>,
        static_listeners: Vec<Arc<dyn Listener>>,
    ) -> Self {
        Self {
            id,
            display_name,
            parent,
            environment,
            source,
            hooks,
            allow_definition_overriding,
            allow_circular_references,
            shutdown_hooks,
            register_shutdown_hook_on_refresh,
            factory_post_processors: RwLock::new(factory_post_processors),
            static_listeners: RwLock::new(static_listeners),
            startup: RwLock::new(None),
            active: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            cycle_lock: ReentrantMutex::new(()),
            registry: Mutex::new(None),
            early_events: Mutex::new(None),
            broadcaster: RwLock::new(None),
            lifecycle_processor: RwLock::new(None),
            message_source: RwLock::new(None),
            shutdown_hook: Mutex::new(None),
        }
    }
}

/// A refreshable container of components.
///
/// Each [`refresh`](Container::refresh) builds a brand-new
/// [`ComponentRegistry`] from the descriptor source, runs the post-processor
/// pipeline, registers listeners, creates every non-lazy singleton and starts
/// lifecycle components. [`close`](Container::close) tears all of it down
/// exactly once. Cloning a `Container` clones a handle to the same container.
///
/// Build one with [`ContainerBuilder`](super::ContainerBuilder).
#[derive(Clone)]
pub struct Container {
    pub(super) inner: Arc<ContainerInner>,
}

/// A non-owning handle to a [`Container`].
#[derive(Clone)]
pub struct WeakContainer {
    inner: Weak<ContainerInner>,
}

impl WeakContainer {
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

impl std::fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(container) => write!(f, "WeakContainer({})", container.id()),
            None => f.write_str("WeakContainer(<dropped>)"),
        }
    }
}

impl Container {
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn display_name(&self) -> &str {
        &self.inner.display_name
    }

    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    pub fn environment(&self) -> &Environment {
        &self.inner.environment
    }

    /// When the last refresh started.
    pub fn startup_timestamp(&self) -> Option<DateTime<Utc>> {
        *self.inner.startup.read()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ContainerState {
        if self.is_active() {
            ContainerState::Active
        } else if self.is_closed() {
            ContainerState::Closed
        } else {
            ContainerState::Fresh
        }
    }

    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------

    /// Build a new registry and bring the container to the active state.
    ///
    /// Any previous registry is destroyed first. On failure every singleton
    /// created by this attempt is destroyed, the new registry is released
    /// and the container is left inactive, ready for another attempt.
    pub fn refresh(&self) -> Result<()> {
        let _cycle = self.inner.cycle_lock.lock();
        let started = Instant::now();
        tracing::info!("Refreshing {}", self.inner.display_name);

        let result = self.refresh_cycle();
        match &result {
            Ok(()) => tracing::info!(
                "Refreshed {} in {:?}",
                self.inner.display_name,
                started.elapsed()
            ),
            Err(e) => {
                tracing::warn!(
                    "Exception encountered during refresh of {} - cancelling refresh attempt: {}",
                    self.inner.display_name,
                    e
                );
                self.cancel_refresh();
            }
        }

        caches::reset_common_caches();
        result
    }

    fn refresh_cycle(&self) -> Result<()> {
        self.prepare_refresh()?;
        let registry = self.obtain_fresh_registry()?;
        self.prepare_registry(&registry)?;
        self.inner.hooks.run_post_process_registry(&registry)?;

        let processors = self.inner.factory_post_processors.read().clone();
        postprocess::invoke_factory_post_processors(&registry, &processors)?;
        postprocess::register_component_post_processors(&registry)?;

        self.init_message_source(&registry)?;
        self.init_event_broadcaster(&registry)?;
        self.inner.hooks.run_on_refresh(self)?;
        self.register_listeners(&registry)?;

        registry.pre_instantiate_singletons()?;
        self.finish_refresh(&registry)
    }

    fn prepare_refresh(&self) -> Result<()> {
        *self.inner.startup.write() = Some(Utc::now());
        self.inner.closed.store(false, Ordering::SeqCst);
        self.inner.active.store(true, Ordering::SeqCst);

        self.inner
            .hooks
            .run_init_property_sources(&self.inner.environment)?;
        self.inner.environment.validate_required_properties()?;

        *self.inner.early_events.lock() = Some(Vec::new());
        Ok(())
    }

    /// Tear down the current registry, then build, load and install a new one.
    fn obtain_fresh_registry(&self) -> Result<Arc<ComponentRegistry>> {
        let previous = self.inner.registry.lock().clone();
        if let Some(previous) = previous {
            previous.destroy_singletons();
            self.release_registry();
        }

        let parent_registry = self
            .inner
            .parent
            .as_ref()
            .and_then(|parent| parent.get_registry().ok());
        let registry = ComponentRegistry::with_parent(parent_registry);
        registry.set_serialization_id(Some(self.inner.id.clone()));

        if let Err(e) = self.load_registry(&registry) {
            registry.destroy_singletons();
            registry.set_serialization_id(None);
            return Err(e);
        }

        *self.inner.registry.lock() = Some(Arc::clone(&registry));
        tracing::debug!("Installed {}", registry);
        Ok(registry)
    }

    fn load_registry(&self, registry: &ComponentRegistry) -> Result<()> {
        if let Some(allow) = self.inner.allow_definition_overriding {
            registry.set_allow_definition_overriding(allow);
        }
        if let Some(allow) = self.inner.allow_circular_references {
            registry.set_allow_circular_references(allow);
        }
        self.inner.hooks.run_customize_registry(registry)?;

        self.inner
            .source
            .load_descriptors(registry)
            .map_err(|source| ContainerError::DescriptorSource {
                display_name: self.inner.display_name.clone(),
                source,
            })
    }

    fn release_registry(&self) -> Option<Arc<ComponentRegistry>> {
        let released = self.inner.registry.lock().take();
        if let Some(registry) = &released {
            registry.set_serialization_id(None);
        }
        released
    }

    fn prepare_registry(&self, registry: &ComponentRegistry) -> Result<()> {
        if !registry.contains_local(ENVIRONMENT_NAME) {
            registry.register_singleton(ENVIRONMENT_NAME, Arc::new(self.inner.environment.clone()))?;
        }
        registry.register_resolvable::<dyn EventPublisher>(Arc::new(self.downgrade()));
        registry.register_resolvable::<WeakContainer>(Arc::new(self.downgrade()));
        registry.ignore_dependency_type::<Container>();
        registry.ignore_dependency_type::<ComponentRegistry>();
        Ok(())
    }

    fn init_message_source(&self, registry: &ComponentRegistry) -> Result<()> {
        let parent_source = self
            .inner
            .parent
            .as_ref()
            .and_then(|parent| parent.inner.message_source.read().clone());

        let source = if registry.contains_local(MESSAGE_SOURCE_NAME) {
            let source = registry.get::<dyn MessageSource>(MESSAGE_SOURCE_NAME)?;
            if parent_source.is_some() && source.parent_source().is_none() {
                source.set_parent_source(parent_source);
            }
            tracing::debug!("Using message source component '{}'", MESSAGE_SOURCE_NAME);
            source
        } else {
            let source: Arc<dyn MessageSource> =
                Arc::new(DelegatingMessageSource::new(parent_source));
            registry.register_shared::<dyn MessageSource>(MESSAGE_SOURCE_NAME, Arc::clone(&source))?;
            tracing::debug!(
                "No '{}' component, using DelegatingMessageSource",
                MESSAGE_SOURCE_NAME
            );
            source
        };
        *self.inner.message_source.write() = Some(source);
        Ok(())
    }

    fn init_event_broadcaster(&self, registry: &Arc<ComponentRegistry>) -> Result<()> {
        let broadcaster = if registry.contains_local(EVENT_BROADCASTER_NAME) {
            tracing::debug!("Using event broadcaster component '{}'", EVENT_BROADCASTER_NAME);
            registry.get::<dyn EventBroadcaster>(EVENT_BROADCASTER_NAME)?
        } else {
            let broadcaster: Arc<dyn EventBroadcaster> =
                Arc::new(SimpleEventBroadcaster::with_registry(registry));
            registry.register_shared::<dyn EventBroadcaster>(
                EVENT_BROADCASTER_NAME,
                Arc::clone(&broadcaster),
            )?;
            tracing::debug!(
                "No '{}' component, using SimpleEventBroadcaster",
                EVENT_BROADCASTER_NAME
            );
            broadcaster
        };
        *self.inner.broadcaster.write() = Some(broadcaster);
        Ok(())
    }

    /// Seed the broadcaster, then deliver the events buffered this cycle.
    fn register_listeners(&self, registry: &ComponentRegistry) -> Result<()> {
        let broadcaster = self.broadcaster()?;

        let listeners = self.inner.static_listeners.read().clone();
        for listener in listeners {
            broadcaster.add_listener(listener);
        }
        for name in registry.names_for_type::<dyn Listener>() {
            broadcaster.add_listener_component(&name);
        }

        let early = self.inner.early_events.lock().take();
        if let Some(events) = early {
            tracing::debug!("Delivering {} early events", events.len());
            for event in &events {
                broadcaster.broadcast(event)?;
            }
        }
        Ok(())
    }

    fn finish_refresh(&self, registry: &Arc<ComponentRegistry>) -> Result<()> {
        self.init_lifecycle_processor(registry)?;
        self.lifecycle_processor()?.on_refresh()?;

        self.publish_event(Event::new(self.inner.id.clone(), EventKind::Refreshed))?;

        diagnostics::register(self);
        if self.inner.register_shutdown_hook_on_refresh {
            self.register_shutdown_hook()?;
        }
        Ok(())
    }

    fn init_lifecycle_processor(&self, registry: &Arc<ComponentRegistry>) -> Result<()> {
        let processor = if registry.contains_local(LIFECYCLE_PROCESSOR_NAME) {
            tracing::debug!(
                "Using lifecycle processor component '{}'",
                LIFECYCLE_PROCESSOR_NAME
            );
            registry.get::<dyn LifecycleProcessor>(LIFECYCLE_PROCESSOR_NAME)?
        } else {
            let processor: Arc<dyn LifecycleProcessor> =
                Arc::new(DefaultLifecycleProcessor::new(registry));
            registry.register_shared::<dyn LifecycleProcessor>(
                LIFECYCLE_PROCESSOR_NAME,
                Arc::clone(&processor),
            )?;
            tracing::debug!(
                "No '{}' component, using DefaultLifecycleProcessor",
                LIFECYCLE_PROCESSOR_NAME
            );
            processor
        };
        *self.inner.lifecycle_processor.write() = Some(processor);
        Ok(())
    }

    fn cancel_refresh(&self) {
        let processor = self.inner.lifecycle_processor.write().take();
        if let Some(processor) = processor
            && processor.is_running()
            && let Err(e) = processor.on_close()
        {
            tracing::warn!("Failed to stop lifecycle components: {}", e);
        }

        if let Some(registry) = self.release_registry() {
            registry.destroy_singletons();
        }

        *self.inner.early_events.lock() = None;
        *self.inner.broadcaster.write() = None;
        *self.inner.message_source.write() = None;
        diagnostics::unregister(&self.inner.id);
        self.inner.active.store(false, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Close
    // ------------------------------------------------------------------

    /// Close the container. Only the first call on an active container has
    /// any effect; failures during teardown are logged.
    pub fn close(&self) {
        let _cycle = self.inner.cycle_lock.lock();
        self.do_close();

        let hook = self.inner.shutdown_hook.lock().take();
        if let Some(id) = hook {
            self.inner.shutdown_hooks.remove(id);
        }
    }

    fn do_close(&self) {
        if !self.is_active()
            || self
                .inner
                .closed
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            return;
        }
        tracing::info!("Closing {}", self.inner.display_name);
        diagnostics::unregister(&self.inner.id);

        if let Err(e) = self.publish_event(Event::new(self.inner.id.clone(), EventKind::Closed)) {
            tracing::warn!("Exception thrown from listener while handling close event: {}", e);
        }

        let processor = self.inner.lifecycle_processor.read().clone();
        if let Some(processor) = processor
            && let Err(e) = processor.on_close()
        {
            tracing::warn!("Exception thrown from lifecycle processor on close: {}", e);
        }

        let registry = self.inner.registry.lock().clone();
        if let Some(registry) = registry {
            registry.destroy_singletons();
        }
        self.release_registry();

        if let Err(e) = self.inner.hooks.run_on_close(self) {
            tracing::warn!("Close hook of {} failed: {}", self.inner.display_name, e);
        }

        *self.inner.early_events.lock() = None;
        *self.inner.broadcaster.write() = None;
        *self.inner.lifecycle_processor.write() = None;
        *self.inner.message_source.write() = None;
        self.inner.active.store(false, Ordering::SeqCst);
        tracing::debug!("Closed {}", self.inner.display_name);
    }

    /// Close this container when the process is asked to terminate.
    ///
    /// Registering twice is a no-op; an explicit [`close`](Self::close)
    /// removes the hook again.
    pub fn register_shutdown_hook(&self) -> Result<()> {
        let mut slot = self.inner.shutdown_hook.lock();
        if slot.is_some() {
            return Ok(());
        }
        let weak = self.downgrade();
        let id = self.inner.shutdown_hooks.register(
            format!("close {}", self.inner.display_name),
            move || {
                if let Some(container) = weak.upgrade() {
                    container.close();
                }
            },
        )?;
        *slot = Some(id);
        Ok(())
    }

    pub fn has_shutdown_hook(&self) -> bool {
        self.inner.shutdown_hook.lock().is_some()
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    /// Add a factory post-processor for the next refresh.
    pub fn add_factory_post_processor(&self, processor: Arc<dyn FactoryPostProcessor>) {
        self.inner.factory_post_processors.write().push(processor);
    }

    /// Register a listener. It is delivered events immediately if the
    /// broadcaster exists, and kept for every later refresh.
    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        let broadcaster = self.inner.broadcaster.read().clone();
        if let Some(broadcaster) = broadcaster {
            broadcaster.add_listener(Arc::clone(&listener));
        }
        let mut listeners = self.inner.static_listeners.write();
        if !listeners.iter().any(|known| Arc::ptr_eq(known, &listener)) {
            listeners.push(listener);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.static_listeners.read().len()
    }

    fn broadcaster(&self) -> Result<Arc<dyn EventBroadcaster>> {
        self.inner
            .broadcaster
            .read()
            .clone()
            .ok_or(ContainerError::NotInitialized("event broadcaster"))
    }

    fn lifecycle_processor(&self) -> Result<Arc<dyn LifecycleProcessor>> {
        self.inner
            .lifecycle_processor
            .read()
            .clone()
            .ok_or(ContainerError::NotInitialized("lifecycle processor"))
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Publish an event to this container's listeners, then to every
    /// ancestor container's listeners.
    ///
    /// During a refresh, until listeners are registered, the event is
    /// buffered and delivered once they are.
    pub fn publish_event(&self, event: Event) -> Result<()> {
        tracing::trace!(
            "Publishing event in {}: {}",
            self.inner.display_name,
            event.name()
        );

        let buffered = {
            let mut early = self.inner.early_events.lock();
            match early.as_mut() {
                Some(buffer) => {
                    buffer.push(event.clone());
                    true
                }
                None => false,
            }
        };
        if !buffered {
            self.broadcaster()?.broadcast(&event)?;
        }

        if let Some(parent) = &self.inner.parent {
            parent.publish_event(event)?;
        }
        Ok(())
    }

    /// Publish `value` wrapped in a payload event.
    pub fn publish<T: Send + Sync + 'static>(&self, value: T) -> Result<()> {
        self.publish_event(Event::payload(self.inner.id.clone(), value))
    }

    // ------------------------------------------------------------------
    // Component access
    // ------------------------------------------------------------------

    /// The installed registry.
    ///
    /// # Errors
    /// Fails with [`ContainerError::InactiveContainer`] before the first
    /// refresh, after a failed refresh and after close.
    pub fn get_registry(&self) -> Result<Arc<ComponentRegistry>> {
        self.inner
            .registry
            .lock()
            .clone()
            .ok_or_else(|| ContainerError::InactiveContainer {
                display_name: self.inner.display_name.clone(),
            })
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.get_registry()?.get::<T>(name)
    }

    pub fn get_by_type<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get_registry()?.get_by_type::<T>()
    }

    pub fn components_of<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<(String, Arc<T>)>> {
        self.get_registry()?.components_of::<T>()
    }

    pub fn contains_component(&self, name: &str) -> bool {
        self.get_registry()
            .is_ok_and(|registry| registry.contains_component(name))
    }

    pub fn component_names(&self) -> Result<Vec<String>> {
        Ok(self.get_registry()?.descriptor_names())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start every lifecycle component, including those without auto-startup.
    pub fn start(&self) -> Result<()> {
        self.lifecycle_processor()?.start()?;
        self.publish_event(Event::new(self.inner.id.clone(), EventKind::Started))
    }

    pub fn stop(&self) -> Result<()> {
        self.lifecycle_processor()?.stop()?;
        self.publish_event(Event::new(self.inner.id.clone(), EventKind::Stopped))
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .lifecycle_processor
            .read()
            .as_ref()
            .is_some_and(|processor| processor.is_running())
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Resolve a message code, falling back to ancestor containers.
    pub fn get_message(&self, code: &str, args: &[&str], locale: Option<&str>) -> Result<String> {
        let source = self
            .inner
            .message_source
            .read()
            .clone()
            .ok_or(ContainerError::NotInitialized("message source"))?;
        source
            .get_message(code, args, locale)
            .ok_or_else(|| ContainerError::NoSuchMessage {
                code: code.to_string(),
                locale: locale.unwrap_or_default().to_string(),
            })
    }
}

impl EventPublisher for Container {
    fn publish_event(&self, event: Event) -> Result<()> {
        Container::publish_event(self, event)
    }

    fn publish_payload(&self, payload: Payload) -> Result<()> {
        Container::publish_event(self, Event::new(self.inner.id.clone(), EventKind::Payload(payload)))
    }
}

impl EventPublisher for WeakContainer {
    fn publish_event(&self, event: Event) -> Result<()> {
        self.upgrade()
            .ok_or(ContainerError::NotInitialized("container"))?
            .publish_event(event)
    }

    fn publish_payload(&self, payload: Payload) -> Result<()> {
        let container = self
            .upgrade()
            .ok_or(ContainerError::NotInitialized("container"))?;
        EventPublisher::publish_payload(&container, payload)
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.display_name)?;
        if let Some(startup) = self.startup_timestamp() {
            write!(f, ", started on {}", startup.to_rfc2822())?;
        }
        if let Some(parent) = &self.inner.parent {
            write!(f, ", parent: {}", parent.display_name())?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("display_name", &self.inner.display_name)
            .field("state", &self.state())
            .field("parent", &self.inner.parent.as_ref().map(Container::id))
            .finish()
    }
}

