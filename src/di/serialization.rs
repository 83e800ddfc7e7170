//! Process-wide index of registries by serialization id.
//!
//! A registry joins the index when its serialization id is set and leaves it
//! when the id is cleared. Entries are weak, but removal is always explicit:
//! the index never relies on a registry being dropped.

use crate::di::ComponentRegistry;
use dashmap::DashMap;
use std::sync::{Arc, LazyLock, Weak};

static REGISTRIES: LazyLock<DashMap<String, Weak<ComponentRegistry>>> =
    LazyLock::new(DashMap::new);

pub(crate) fn register(id: &str, registry: Weak<ComponentRegistry>) {
    REGISTRIES.insert(id.to_string(), registry);
}

/// Remove `id` only if it still points at `registry`; a newer registry that
/// took over the same id stays indexed.
pub(crate) fn unregister(id: &str, registry: &Weak<ComponentRegistry>) {
    REGISTRIES.remove_if(id, |_, current| Weak::ptr_eq(current, registry));
}

/// Find the live registry carrying `id`.
pub fn find(id: &str) -> Option<Arc<ComponentRegistry>> {
    REGISTRIES.get(id).and_then(|entry| entry.value().upgrade())
}

pub fn contains(id: &str) -> bool {
    REGISTRIES.contains_key(id)
}
