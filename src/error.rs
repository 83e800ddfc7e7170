use crate::lifecycle::LifecycleError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContainerError>;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("I/O error parsing component descriptor source for {display_name}")]
    DescriptorSource {
        display_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "{display_name} is not active - call 'refresh' before accessing components via the container"
    )]
    InactiveContainer { display_name: String },

    #[error("No component named '{name}' is defined")]
    NoSuchComponent { name: String },

    #[error("No unique component of type '{type_name}': candidates {candidates:?}")]
    NoUniqueComponent {
        type_name: String,
        candidates: Vec<String>,
    },

    #[error("Component '{name}' cannot be viewed as '{type_name}'")]
    TypeMismatch { name: String, type_name: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Circular reference to '{name}' requested but circular references are disabled")]
    CircularReferencesDisallowed { name: String },

    #[error(
        "Cannot register component '{name}': a component with that name is already defined and overriding is disabled"
    )]
    DefinitionOverride { name: String },

    #[error("Invalid alias '{alias}' for '{name}': {reason}")]
    InvalidAlias {
        alias: String,
        name: String,
        reason: String,
    },

    #[error("Error creating component '{name}'")]
    ComponentCreation {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Factory post-processor '{name}' failed")]
    FactoryPostProcessor {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Component post-processor failed on '{component}'")]
    ComponentPostProcessor {
        component: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Listener failed handling '{event}' event")]
    Listener {
        event: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Required properties not found: {}", keys.join(", "))]
    MissingRequiredProperties { keys: Vec<String> },

    #[error("No message found under code '{code}' for locale '{locale}'")]
    NoSuchMessage { code: String, locale: String },

    #[error("Singleton '{name}' requested while singletons of this registry are being destroyed")]
    SingletonsDestroying { name: String },

    #[error("{0} not initialized - call 'refresh' first")]
    NotInitialized(&'static str),

    #[error("Container hook '{hook}' failed")]
    Hook {
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for ContainerError {
    fn from(err: serde_json::Error) -> Self {
        ContainerError::Internal(format!("Serialization error: {}", err))
    }
}

impl ContainerError {
    pub(crate) fn creation(name: &str, source: anyhow::Error) -> Self {
        Self::ComponentCreation {
            name: name.to_string(),
            source,
        }
    }

    pub(crate) fn no_such_component(name: &str) -> Self {
        Self::NoSuchComponent {
            name: name.to_string(),
        }
    }
}
