//! Process-wide view of live containers.
//!
//! A container joins this registry at the end of a successful refresh and
//! leaves it when it closes or a later refresh fails.

use crate::context::{Container, ContainerState, WeakContainer};
use crate::error::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::LazyLock;

static LIVE: LazyLock<DashMap<String, WeakContainer>> = LazyLock::new(DashMap::new);

pub(crate) fn register(container: &Container) {
    LIVE.insert(container.id().to_string(), container.downgrade());
}

pub(crate) fn unregister(id: &str) {
    LIVE.remove(id);
}

/// Ids of the registered containers that are still alive, sorted.
pub fn live_container_ids() -> Vec<String> {
    let mut ids: Vec<String> = LIVE
        .iter()
        .filter(|entry| entry.value().upgrade().is_some())
        .map(|entry| entry.key().clone())
        .collect();
    ids.sort();
    ids
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub scope: String,
    pub lazy: bool,
    pub depends_on: Vec<String>,
    pub aliases: Vec<String>,
    pub instantiated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerSnapshot {
    pub id: String,
    pub display_name: String,
    pub parent: Option<String>,
    pub state: ContainerState,
    pub startup: Option<DateTime<Utc>>,
    pub components: Vec<ComponentSnapshot>,
}

impl ContainerSnapshot {
    pub fn of(container: &Container) -> Self {
        let components = container
            .get_registry()
            .map(|registry| {
                registry
                    .descriptor_names()
                    .into_iter()
                    .filter_map(|name| registry.descriptor(&name))
                    .map(|descriptor| ComponentSnapshot {
                        name: descriptor.name().to_string(),
                        type_name: descriptor.type_name().to_string(),
                        scope: descriptor.scope().to_string(),
                        lazy: descriptor.is_lazy_init(),
                        depends_on: descriptor.depends_on().to_vec(),
                        aliases: registry.aliases_of(descriptor.name()),
                        instantiated: registry.contains_singleton(descriptor.name()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: container.id().to_string(),
            display_name: container.display_name().to_string(),
            parent: container.parent().map(|parent| parent.id().to_string()),
            state: container.state(),
            startup: container.startup_timestamp(),
            components,
        }
    }
}

/// Snapshot every live registered container, sorted by id.
pub fn snapshot() -> Vec<ContainerSnapshot> {
    let containers: Vec<Container> = LIVE
        .iter()
        .filter_map(|entry| entry.value().upgrade())
        .collect();
    let mut snapshots: Vec<ContainerSnapshot> =
        containers.iter().map(ContainerSnapshot::of).collect();
    snapshots.sort_by(|a, b| a.id.cmp(&b.id));
    snapshots
}

/// [`snapshot`] rendered as pretty-printed JSON.
pub fn snapshot_json() -> Result<String> {
    Ok(serde_json::to_string_pretty(&snapshot())?)
}
