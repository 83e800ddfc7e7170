//! Process-exit hooks
//!
//! [`ShutdownHooks`] is a set of run-once callbacks, executed when the
//! process receives SIGINT/SIGTERM (see [`ShutdownHandler`] and
//! [`install_signal_handler`]) or when [`ShutdownHooks::run_all`] is called.
//! Containers register a hook that closes them.

use super::{LifecycleError, Result};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tokio::signal;

/// Handle returned by [`ShutdownHooks::register`].
pub type HookId = u64;

type Hook = Box<dyn FnOnce() + Send>;

static GLOBAL: LazyLock<Arc<ShutdownHooks>> = LazyLock::new(|| Arc::new(ShutdownHooks::new()));

/// Registered process-exit hooks, run at most once
pub struct ShutdownHooks {
    hooks: Mutex<IndexMap<HookId, (String, Hook)>>,
    next_id: AtomicU64,
    shutting_down: AtomicBool,
}

impl Default for ShutdownHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHooks {
    pub fn new() -> Self {
        Self {
            hooks: Mutex::new(IndexMap::new()),
            next_id: AtomicU64::new(1),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// The process-wide hook set
    pub fn global() -> Arc<ShutdownHooks> {
        Arc::clone(&GLOBAL)
    }

    /// Register a hook
    ///
    /// # Errors
    /// Fails once shutdown has started.
    pub fn register<F>(&self, name: impl Into<String>, hook: F) -> Result<HookId>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        if self.is_shutting_down() {
            return Err(LifecycleError::hook_failed(name, "shutdown already in progress"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.hooks.lock().insert(id, (name, Box::new(hook)));
        Ok(id)
    }

    /// Remove a hook
    ///
    /// Removing an unknown hook, or any hook once shutdown has started, is a
    /// no-op returning `false`.
    pub fn remove(&self, id: HookId) -> bool {
        if self.is_shutting_down() {
            return false;
        }
        self.hooks.lock().shift_remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Run every hook in registration order; only the first call does anything
    ///
    /// A panicking hook is logged and does not prevent the others from running.
    pub fn run_all(&self) {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let hooks: Vec<(String, Hook)> = self.hooks.lock().drain(..).map(|(_, hook)| hook).collect();
        tracing::info!("Running {} shutdown hooks", hooks.len());
        for (name, hook) in hooks {
            tracing::debug!("Running shutdown hook: {}", name);
            if std::panic::catch_unwind(AssertUnwindSafe(hook)).is_err() {
                tracing::error!("Shutdown hook '{}' panicked", name);
            }
        }
    }
}

/// Runs a hook set when the process is asked to terminate
///
/// # Example
///
/// ```rust,ignore
/// use corral::lifecycle::{ShutdownHandler, ShutdownHooks};
///
/// let handler = ShutdownHandler::new(ShutdownHooks::global());
/// tokio::spawn(async move {
///     handler.wait_for_shutdown().await;
///     std::process::exit(0);
/// });
/// ```
pub struct ShutdownHandler {
    hooks: Arc<ShutdownHooks>,
}

impl ShutdownHandler {
    pub fn new(hooks: Arc<ShutdownHooks>) -> Self {
        Self { hooks }
    }

    /// Wait for SIGINT or SIGTERM, then run the hooks
    pub async fn wait_for_shutdown(&self) {
        shutdown_signal().await;
        self.shutdown().await;
    }

    /// Run the hooks on the blocking pool
    pub async fn shutdown(&self) {
        tracing::info!("Starting graceful shutdown...");
        let hooks = Arc::clone(&self.hooks);
        if let Err(e) = tokio::task::spawn_blocking(move || hooks.run_all()).await {
            tracing::error!("Shutdown hooks did not complete: {}", e);
        }
        tracing::info!("Graceful shutdown complete");
    }
}

/// Complete when a shutdown signal (Ctrl+C or SIGTERM) is received
///
/// A signal that cannot be listened for is logged and never completes.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}

/// Listen for shutdown signals on a dedicated thread and run `hooks` when
/// one arrives
///
/// For processes that do not run their own tokio runtime.
pub fn install_signal_handler(
    hooks: Arc<ShutdownHooks>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    std::thread::Builder::new()
        .name("corral-shutdown".to_string())
        .spawn(move || {
            runtime.block_on(ShutdownHandler::new(hooks).wait_for_shutdown());
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(hooks: &ShutdownHooks, log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> HookId {
        let log = Arc::clone(log);
        hooks
            .register(name, move || log.lock().push(name))
            .unwrap()
    }

    #[test]
    fn test_hooks_run_once_in_order() {
        let hooks = ShutdownHooks::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recording(&hooks, &log, "first");
        recording(&hooks, &log, "second");
        assert_eq!(hooks.len(), 2);

        hooks.run_all();
        hooks.run_all();

        assert_eq!(*log.lock(), vec!["first", "second"]);
        assert!(hooks.is_shutting_down());
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let hooks = ShutdownHooks::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = recording(&hooks, &log, "removed");
        recording(&hooks, &log, "kept");

        assert!(hooks.remove(id));
        assert!(!hooks.remove(id));
        hooks.run_all();
        assert_eq!(*log.lock(), vec!["kept"]);
    }

    #[test]
    fn test_no_registration_or_removal_after_shutdown() {
        let hooks = Arc::new(ShutdownHooks::new());
        let observed = Arc::new(Mutex::new(None));

        let id = {
            let inner = Arc::clone(&hooks);
            let observed = Arc::clone(&observed);
            let own_id = Arc::new(Mutex::new(0));
            let slot = Arc::clone(&own_id);
            let id = hooks
                .register("self-removing", move || {
                    *observed.lock() = Some(inner.remove(*slot.lock()));
                })
                .unwrap();
            *own_id.lock() = id;
            id
        };

        hooks.run_all();
        assert_eq!(*observed.lock(), Some(false));
        assert!(!hooks.remove(id));
        assert!(hooks.register("late", || {}).is_err());
    }

    #[test]
    fn test_panicking_hook_does_not_stop_others() {
        let hooks = ShutdownHooks::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        hooks.register("panics", || panic!("hook failure")).unwrap();
        recording(&hooks, &log, "after");

        hooks.run_all();
        assert_eq!(*log.lock(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_handler_runs_hooks() {
        let hooks = Arc::new(ShutdownHooks::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        recording(&hooks, &log, "close-container");

        ShutdownHandler::new(Arc::clone(&hooks)).shutdown().await;
        assert_eq!(*log.lock(), vec!["close-container"]);
        assert!(hooks.is_shutting_down());
    }
}
