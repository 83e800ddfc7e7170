//! Process-wide metadata caches.
//!
//! Containers call [`reset_common_caches`] at the end of every refresh
//! attempt, successful or not. Other collaborators can hook their own caches
//! into that reset with [`register_cache`].

use dashmap::DashMap;
use std::any::TypeId;
use std::sync::{Arc, LazyLock};

/// A cache that can be dropped wholesale.
pub trait ClearableCache: Send + Sync {
    fn clear(&self);
}

static TYPE_NAMES: LazyLock<DashMap<TypeId, Arc<str>>> = LazyLock::new(DashMap::new);

static REGISTERED: LazyLock<DashMap<String, Arc<dyn ClearableCache>>> =
    LazyLock::new(DashMap::new);

/// `std::any::type_name` with module paths stripped, memoized per type.
///
/// `alloc::sync::Arc<dyn app::Listener>` becomes `Arc<dyn Listener>`.
pub fn short_type_name<T: ?Sized + 'static>() -> Arc<str> {
    let type_id = TypeId::of::<T>();
    if let Some(name) = TYPE_NAMES.get(&type_id) {
        return Arc::clone(name.value());
    }
    let name: Arc<str> = strip_paths(std::any::type_name::<T>()).into();
    TYPE_NAMES.insert(type_id, Arc::clone(&name));
    name
}

fn strip_paths(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for ch in full.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == ':' {
            segment.push(ch);
        } else {
            out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
            segment.clear();
            out.push(ch);
        }
    }
    out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
    out
}

/// Register a named cache to be cleared by [`reset_common_caches`].
/// Re-registering a name replaces the previous cache.
pub fn register_cache(name: impl Into<String>, cache: Arc<dyn ClearableCache>) {
    REGISTERED.insert(name.into(), cache);
}

pub fn unregister_cache(name: &str) -> bool {
    REGISTERED.remove(name).is_some()
}

/// Drop every process-wide metadata cache.
pub fn reset_common_caches() {
    TYPE_NAMES.clear();
    let caches: Vec<Arc<dyn ClearableCache>> =
        REGISTERED.iter().map(|e| Arc::clone(e.value())).collect();
    for cache in caches {
        cache.clear();
    }
    tracing::trace!("Common caches reset");
}
