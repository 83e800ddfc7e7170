//! Registry-level and component-level interception hooks.
//!
//! [`FactoryPostProcessor`]s run once per refresh, after descriptors are
//! loaded and before any component is created. [`ComponentPostProcessor`]s
//! wrap the creation and destruction of every descriptor-built component.
//! Both kinds are sorted by their [`OrderHint`]; equal hints keep their
//! registration order.

mod delegate;

pub use delegate::{invoke_factory_post_processors, register_component_post_processors};

use crate::caches::short_type_name;
use crate::di::{ComponentRef, ComponentRegistry};
use strum_macros::Display;

/// Ordering hint of a post-processor.
///
/// All `Priority` processors run before all `Ordered` ones, which run before
/// `Unordered` ones. Within a group, lower values run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Display)]
pub enum OrderHint {
    Priority(i32),
    Ordered(i32),
    #[default]
    Unordered,
}

/// Hook operating on the registry itself, before instantiation.
pub trait FactoryPostProcessor: Send + Sync + 'static {
    /// Register additional descriptors.
    ///
    /// Runs for every factory post-processor before any
    /// [`post_process_registry`](Self::post_process_registry) call, so
    /// post-processors registered here are discovered in the same refresh.
    fn register_definitions(&self, _registry: &ComponentRegistry) -> anyhow::Result<()> {
        Ok(())
    }

    /// Inspect or modify the loaded descriptors.
    fn post_process_registry(&self, registry: &ComponentRegistry) -> anyhow::Result<()>;

    fn order_hint(&self) -> OrderHint {
        OrderHint::Unordered
    }

    fn name(&self) -> String {
        short_type_name::<Self>().to_string()
    }
}

/// Hook around the creation and destruction of individual components.
///
/// Both initialization callbacks may return a different instance, which is
/// then what lookups see.
pub trait ComponentPostProcessor: Send + Sync {
    fn before_initialization(
        &self,
        component: ComponentRef,
        _name: &str,
    ) -> anyhow::Result<ComponentRef> {
        Ok(component)
    }

    fn after_initialization(
        &self,
        component: ComponentRef,
        _name: &str,
    ) -> anyhow::Result<ComponentRef> {
        Ok(component)
    }

    /// Called before a singleton's own destroy callback. Failures are logged.
    fn before_destruction(&self, _component: &ComponentRef, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }

    fn order_hint(&self) -> OrderHint {
        OrderHint::Unordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_hint_groups() {
        let mut hints = vec![
            OrderHint::Unordered,
            OrderHint::Ordered(-5),
            OrderHint::Priority(10),
            OrderHint::Ordered(1),
            OrderHint::Priority(0),
        ];
        hints.sort();
        assert_eq!(
            hints,
            vec![
                OrderHint::Priority(0),
                OrderHint::Priority(10),
                OrderHint::Ordered(-5),
                OrderHint::Ordered(1),
                OrderHint::Unordered,
            ]
        );
    }
}
