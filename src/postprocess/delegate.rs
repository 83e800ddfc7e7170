use super::{ComponentPostProcessor, FactoryPostProcessor};
use crate::di::ComponentRegistry;
use crate::error::{ContainerError, Result};
use std::collections::HashSet;
use std::sync::Arc;

fn failed(processor: &dyn FactoryPostProcessor, source: anyhow::Error) -> ContainerError {
    ContainerError::FactoryPostProcessor {
        name: processor.name(),
        source,
    }
}

fn sorted_by_hint(
    mut processors: Vec<Arc<dyn FactoryPostProcessor>>,
) -> Vec<Arc<dyn FactoryPostProcessor>> {
    processors.sort_by_key(|p| p.order_hint());
    processors
}

/// Run the caller's factory post-processors plus those defined as components.
///
/// Every processor gets its `register_definitions` call first. Processors
/// registered that way are discovered and get theirs too, until no new
/// ones appear. Only then does any `post_process_registry` run: caller
/// processors first, discovered ones after, each group sorted by hint.
pub fn invoke_factory_post_processors(
    registry: &ComponentRegistry,
    caller: &[Arc<dyn FactoryPostProcessor>],
) -> Result<()> {
    let caller = sorted_by_hint(caller.to_vec());
    for processor in &caller {
        processor
            .register_definitions(registry)
            .map_err(|e| failed(processor.as_ref(), e))?;
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut discovered: Vec<Arc<dyn FactoryPostProcessor>> = Vec::new();
    loop {
        let fresh: Vec<String> = registry
            .names_for_type::<dyn FactoryPostProcessor>()
            .into_iter()
            .filter(|name| !seen.contains(name))
            .collect();
        if fresh.is_empty() {
            break;
        }

        let mut round = Vec::with_capacity(fresh.len());
        for name in fresh {
            round.push(registry.get::<dyn FactoryPostProcessor>(&name)?);
            seen.insert(name);
        }
        for processor in sorted_by_hint(round) {
            processor
                .register_definitions(registry)
                .map_err(|e| failed(processor.as_ref(), e))?;
            discovered.push(processor);
        }
    }

    let discovered = sorted_by_hint(discovered);
    tracing::debug!(
        "Invoking {} caller and {} registry factory post-processors",
        caller.len(),
        discovered.len()
    );
    for processor in caller.iter().chain(discovered.iter()) {
        tracing::trace!("Post-processing registry with '{}'", processor.name());
        processor
            .post_process_registry(registry)
            .map_err(|e| failed(processor.as_ref(), e))?;
    }
    Ok(())
}

/// Instantiate the component post-processors defined in the registry and
/// attach them in hint order.
pub fn register_component_post_processors(registry: &ComponentRegistry) -> Result<()> {
    let mut processors = registry.components_of::<dyn ComponentPostProcessor>()?;
    processors.sort_by_key(|(_, p)| p.order_hint());
    for (name, processor) in processors {
        tracing::debug!("Registering component post-processor '{}'", name);
        registry.add_post_processor(processor);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{ComponentDescriptor, ComponentRef};
    use crate::postprocess::OrderHint;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recording {
        label: &'static str,
        hint: OrderHint,
        log: Log,
        registers: Option<&'static str>,
    }

    impl FactoryPostProcessor for Recording {
        fn register_definitions(&self, registry: &ComponentRegistry) -> anyhow::Result<()> {
            self.log.lock().push(format!("register:{}", self.label));
            if let Some(name) = self.registers {
                let log = Arc::clone(&self.log);
                registry.register_descriptor(
                    ComponentDescriptor::builder(name, move |_| {
                        Ok(Recording {
                            label: name,
                            hint: OrderHint::Unordered,
                            log: Arc::clone(&log),
                            registers: None,
                        })
                    })
                    .factory_post_processor()
                    .build(),
                )?;
            }
            Ok(())
        }

        fn post_process_registry(&self, _registry: &ComponentRegistry) -> anyhow::Result<()> {
            self.log.lock().push(format!("process:{}", self.label));
            Ok(())
        }

        fn order_hint(&self) -> OrderHint {
            self.hint
        }

        fn name(&self) -> String {
            self.label.to_string()
        }
    }

    fn recording(label: &'static str, hint: OrderHint, log: &Log) -> Arc<dyn FactoryPostProcessor> {
        Arc::new(Recording {
            label,
            hint,
            log: Arc::clone(log),
            registers: None,
        })
    }

    #[test]
    fn test_caller_processors_sorted_by_hint() {
        let registry = ComponentRegistry::new();
        let log: Log = Arc::default();
        let caller = vec![
            recording("plain", OrderHint::Unordered, &log),
            recording("ordered", OrderHint::Ordered(1), &log),
            recording("urgent", OrderHint::Priority(0), &log),
            recording("plain-2", OrderHint::Unordered, &log),
        ];

        invoke_factory_post_processors(&registry, &caller).unwrap();

        let processed: Vec<String> = log
            .lock()
            .iter()
            .filter(|entry| entry.starts_with("process:"))
            .cloned()
            .collect();
        assert_eq!(
            processed,
            vec!["process:urgent", "process:ordered", "process:plain", "process:plain-2"]
        );
    }

    #[test]
    fn test_registered_processors_discovered_before_processing() {
        let registry = ComponentRegistry::new();
        let log: Log = Arc::default();
        let caller: Vec<Arc<dyn FactoryPostProcessor>> = vec![Arc::new(Recording {
            label: "registrar",
            hint: OrderHint::Unordered,
            log: Arc::clone(&log),
            registers: Some("late"),
        })];

        invoke_factory_post_processors(&registry, &caller).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "register:registrar".to_string(),
                "register:late".to_string(),
                "process:registrar".to_string(),
                "process:late".to_string(),
            ]
        );
    }

    struct Failing;

    impl FactoryPostProcessor for Failing {
        fn post_process_registry(&self, _registry: &ComponentRegistry) -> anyhow::Result<()> {
            anyhow::bail!("descriptor rejected")
        }
    }

    #[test]
    fn test_failure_names_processor() {
        let registry = ComponentRegistry::new();
        let caller: Vec<Arc<dyn FactoryPostProcessor>> = vec![Arc::new(Failing)];
        let err = invoke_factory_post_processors(&registry, &caller).unwrap_err();
        match err {
            ContainerError::FactoryPostProcessor { name, source } => {
                assert_eq!(name, "Failing");
                assert_eq!(source.to_string(), "descriptor rejected");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct Tagging {
        tag: &'static str,
        hint: OrderHint,
    }

    impl ComponentPostProcessor for Tagging {
        fn after_initialization(
            &self,
            component: ComponentRef,
            _name: &str,
        ) -> anyhow::Result<ComponentRef> {
            match component.downcast_ref::<String>() {
                Some(value) => Ok(Arc::new(format!("{value}+{}", self.tag))),
                None => Ok(component),
            }
        }

        fn order_hint(&self) -> OrderHint {
            self.hint
        }
    }

    #[test]
    fn test_component_post_processors_attached_in_hint_order() {
        let registry = ComponentRegistry::new();
        for (name, tag, hint) in [
            ("second", "b", OrderHint::Ordered(0)),
            ("first", "a", OrderHint::Priority(0)),
            ("third", "c", OrderHint::Unordered),
        ] {
            registry
                .register_descriptor(
                    ComponentDescriptor::builder(name, move |_| Ok(Tagging { tag, hint }))
                        .component_post_processor()
                        .build(),
                )
                .unwrap();
        }
        registry
            .register_descriptor(
                ComponentDescriptor::builder("value", |_| Ok("v".to_string())).build(),
            )
            .unwrap();

        register_component_post_processors(&registry).unwrap();
        assert_eq!(registry.post_processor_count(), 3);
        assert_eq!(registry.get::<String>("value").unwrap().as_str(), "v+a+b+c");
    }
}
