//! Lifecycle Processor
//!
//! Starts and stops the [`Lifecycle`] components of a registry in phase order.

use super::{Lifecycle, LifecycleError, Result};
use crate::di::ComponentRegistry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Drives the lifecycle components of a container
///
/// The container calls [`on_refresh`](Self::on_refresh) once every singleton
/// exists, and [`on_close`](Self::on_close) during teardown. Register a
/// component named `lifecycleProcessor` that can be viewed as
/// `dyn LifecycleProcessor` to replace the default.
pub trait LifecycleProcessor: Send + Sync {
    /// Start auto-startup components after a refresh
    fn on_refresh(&self) -> Result<()>;

    /// Stop running components while the container closes
    fn on_close(&self) -> Result<()>;

    /// Start every component, including those without auto-startup
    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn is_running(&self) -> bool;
}

type Phases = BTreeMap<i32, Vec<(String, Arc<dyn Lifecycle>)>>;

/// Phase-ordered [`LifecycleProcessor`]
///
/// - Components start in ascending phase order, in registration order
///   within a phase.
/// - Components stop in descending phase order, in reverse registration
///   order within a phase.
/// - A component that fails to start or stop is logged and skipped; the
///   rest of its phase still runs.
/// - Only singletons are managed. Stopping never creates a component.
pub struct DefaultLifecycleProcessor {
    registry: Weak<ComponentRegistry>,
    running: AtomicBool,
}

impl DefaultLifecycleProcessor {
    pub fn new(registry: &Arc<ComponentRegistry>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            running: AtomicBool::new(false),
        }
    }

    /// Group the singleton lifecycle components by phase.
    ///
    /// Prototypes are never managed. With `existing_only` nothing is
    /// created, so teardown only sees singletons that already exist. A
    /// component that cannot be resolved is logged and left out.
    fn phases(&self, auto_startup_only: bool, existing_only: bool) -> Result<Phases> {
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| LifecycleError::Detached("registry has been released".to_string()))?;

        let mut phases = Phases::new();
        for name in registry.names_for_type::<dyn Lifecycle>() {
            if registry
                .descriptor(&name)
                .is_some_and(|descriptor| !descriptor.is_singleton())
            {
                continue;
            }
            if existing_only && !registry.contains_singleton(&name) {
                continue;
            }
            let component = match registry.get::<dyn Lifecycle>(&name) {
                Ok(component) => component,
                Err(e) => {
                    tracing::warn!("Skipping lifecycle component '{}': {}", name, e);
                    continue;
                }
            };
            if auto_startup_only && !component.is_auto_startup() {
                continue;
            }
            phases
                .entry(component.phase())
                .or_default()
                .push((name, component));
        }
        Ok(phases)
    }

    fn start_components(&self, auto_startup_only: bool) -> Result<()> {
        let phases = self.phases(auto_startup_only, false)?;
        let mut started = 0usize;

        for (phase, group) in phases {
            tracing::debug!("Starting lifecycle components in phase {}", phase);
            for (name, component) in group {
                if component.is_running() {
                    continue;
                }
                match component.start() {
                    Ok(()) => {
                        started += 1;
                        tracing::debug!("Started: {}", name);
                    }
                    Err(e) => tracing::warn!("Failed to start '{}': {}", name, e),
                }
            }
        }

        self.running.store(true, Ordering::SeqCst);
        tracing::debug!("Lifecycle start complete ({} components started)", started);
        Ok(())
    }

    fn stop_components(&self) -> Result<()> {
        let phases = self.phases(false, true)?;
        let mut stopped = 0usize;

        // Reverse phase order, reverse registration order within a phase
        for (phase, group) in phases.into_iter().rev() {
            tracing::debug!("Stopping lifecycle components in phase {}", phase);
            for (name, component) in group.into_iter().rev() {
                if !component.is_running() {
                    continue;
                }
                match component.stop() {
                    Ok(()) => {
                        stopped += 1;
                        tracing::debug!("Stopped: {}", name);
                    }
                    Err(e) => tracing::warn!("Failed to stop '{}': {}", name, e),
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::debug!("Lifecycle stop complete ({} components stopped)", stopped);
        Ok(())
    }
}

impl LifecycleProcessor for DefaultLifecycleProcessor {
    fn on_refresh(&self) -> Result<()> {
        self.start_components(true)
    }

    fn on_close(&self) -> Result<()> {
        self.stop_components()
    }

    fn start(&self) -> Result<()> {
        self.start_components(false)
    }

    fn stop(&self) -> Result<()> {
        self.stop_components()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
