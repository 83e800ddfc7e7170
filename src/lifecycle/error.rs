//! Lifecycle-specific error types

use thiserror::Error;

/// Errors raised by lifecycle components and the lifecycle processor
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A component refused to start
    #[error("Failed to start component '{component}': {message}")]
    StartFailed {
        /// Name of the component that failed
        component: String,
        /// Error message
        message: String,
    },

    /// A component failed while stopping
    #[error("Failed to stop component '{component}': {message}")]
    StopFailed {
        /// Name of the component that failed
        component: String,
        /// Error message
        message: String,
    },

    /// An init or destroy hook failed
    #[error("Hook execution failed for {service}: {message}")]
    HookFailed {
        /// Name of the service that failed
        service: String,
        /// Error message
        message: String,
    },

    /// The processor could not reach the registry it manages
    #[error("Lifecycle processor detached: {0}")]
    Detached(String),
}

impl LifecycleError {
    /// Create a start failure error
    pub fn start_failed(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StartFailed {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a stop failure error
    pub fn stop_failed(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StopFailed {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a hook failure error
    pub fn hook_failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HookFailed {
            service: service.into(),
            message: message.into(),
        }
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
