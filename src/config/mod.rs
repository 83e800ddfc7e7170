//! Configuration: the key-value [`Environment`] a container validates during
//! refresh, and the [`ContainerSettings`] that can be bound from it.

use crate::error::{ContainerError, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

/// String-keyed property store shared by a container and its components.
///
/// Clones share the same underlying storage.
#[derive(Clone, Default)]
pub struct Environment {
    properties: Arc<DashMap<String, String>>,
    required: Arc<RwLock<BTreeSet<String>>>,
}

impl Environment {
    /// An empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment seeded from the process environment variables.
    pub fn from_env() -> Self {
        let environment = Self::default();
        for (key, value) in env::vars() {
            environment.set(&key, &value);
        }
        environment
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.properties.get(key).map(|v| v.clone())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a property with [`FromStr`]; `None` when absent or unparsable.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.properties.get(key).and_then(|v| v.parse().ok())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.properties.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.properties.remove(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Property names in sorted order.
    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.properties.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Copy every property of `parent` that this environment does not define,
    /// along with the parent's required keys.
    pub fn merge(&self, parent: &Environment) {
        if Arc::ptr_eq(&self.properties, &parent.properties) {
            return;
        }
        for entry in parent.properties.iter() {
            self.properties
                .entry(entry.key().clone())
                .or_insert_with(|| entry.value().clone());
        }
        let parent_required = parent.required.read().clone();
        self.required.write().extend(parent_required);
    }

    /// Declare keys that must be present when the container refreshes.
    pub fn set_required_properties<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.write().extend(keys.into_iter().map(Into::into));
    }

    /// Fails with every missing required key, not just the first.
    pub fn validate_required_properties(&self) -> Result<()> {
        let missing: Vec<String> = self
            .required
            .read()
            .iter()
            .filter(|key| !self.contains(key))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ContainerError::MissingRequiredProperties { keys: missing })
        }
    }

    /// Deserialize every property under `prefix` into `T`.
    ///
    /// `container.display-name` under the prefix `container.` becomes the
    /// field `display_name`. Scalars that look like JSON (`true`, `42`) are
    /// tried as such first; if that shape does not fit `T` the raw strings are
    /// used instead.
    pub fn bind<T: DeserializeOwned>(&self, prefix: &str) -> Result<T> {
        let mut typed = Map::new();
        let mut raw = Map::new();
        for entry in self.properties.iter() {
            let Some(rest) = entry.key().strip_prefix(prefix) else {
                continue;
            };
            let field = rest.replace(['-', '.'], "_");
            let value = entry.value();
            let parsed = serde_json::from_str::<Value>(value)
                .ok()
                .filter(|v| v.is_boolean() || v.is_number())
                .unwrap_or_else(|| Value::String(value.clone()));
            typed.insert(field.clone(), parsed);
            raw.insert(field, Value::String(value.clone()));
        }

        serde_json::from_value(Value::Object(typed))
            .or_else(|_| serde_json::from_value(Value::Object(raw)))
            .map_err(|e| {
                ContainerError::Internal(format!(
                    "Failed to bind properties under '{}': {}",
                    prefix, e
                ))
            })
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("properties", &self.properties.len())
            .field("required", &*self.required.read())
            .finish()
    }
}

/// Container settings that can be bound from an [`Environment`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub allow_definition_overriding: Option<bool>,
    pub allow_circular_references: Option<bool>,
    pub register_shutdown_hook: bool,
}

impl ContainerSettings {
    pub const PREFIX: &'static str = "container.";

    pub fn from_environment(environment: &Environment) -> Result<Self> {
        environment.bind(Self::PREFIX)
    }
}
