use crate::caches::short_type_name;
use crate::di::{ComponentRegistry, Injectable};
use crate::lifecycle::{Lifecycle, OnDestroy, OnInit};
use crate::messaging::Listener;
use crate::postprocess::{ComponentPostProcessor, FactoryPostProcessor};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use strum_macros::{AsRefStr, Display};

/// A type-erased, shared component instance.
pub type ComponentRef = Arc<dyn Any + Send + Sync>;

pub(crate) type FactoryFn =
    Arc<dyn Fn(&ComponentRegistry) -> anyhow::Result<ComponentRef> + Send + Sync>;

pub(crate) type CallbackFn = Arc<dyn Fn(&ComponentRef) -> anyhow::Result<()> + Send + Sync>;

/// Casts a component to an `Arc<dyn Any>` that holds an `Arc<Target>`.
/// The target is usually a trait object.
pub(crate) type CasterFn = Arc<dyn Fn(ComponentRef) -> Option<ComponentRef> + Send + Sync>;

pub(crate) type Casters = HashMap<TypeId, CasterFn>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Scope {
    /// One shared instance per registry, destroyed with the registry
    #[default]
    Singleton,
    /// A new instance on every lookup, never tracked for destruction
    Prototype,
}

/// Metadata describing how to construct a component, prior to instantiation.
#[derive(Clone)]
pub struct ComponentDescriptor {
    pub(crate) name: String,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: Arc<str>,
    pub(crate) scope: Scope,
    pub(crate) lazy_init: bool,
    pub(crate) depends_on: Vec<String>,
    pub(crate) factory: FactoryFn,
    pub(crate) init: Option<CallbackFn>,
    pub(crate) destroy: Option<CallbackFn>,
    pub(crate) casters: Arc<Casters>,
}

impl ComponentDescriptor {
    /// Describe a component built by `factory`.
    ///
    /// The factory receives the registry being populated so it can look up
    /// its own dependencies.
    pub fn builder<T, F>(name: impl Into<String>, factory: F) -> DescriptorBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ComponentRegistry) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        DescriptorBuilder::new(
            name.into(),
            Arc::new(move |registry: &ComponentRegistry| {
                factory(registry).map(|instance| Arc::new(instance) as ComponentRef)
            }),
        )
    }

    /// Describe a component whose factory already hands out an `Arc`.
    pub fn shared<T, F>(name: impl Into<String>, factory: F) -> DescriptorBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ComponentRegistry) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        DescriptorBuilder::new(
            name.into(),
            Arc::new(move |registry: &ComponentRegistry| {
                factory(registry).map(|instance| instance as ComponentRef)
            }),
        )
    }

    /// Describe a component that is handed out as-is.
    pub fn instance<T: Send + Sync + 'static>(
        name: impl Into<String>,
        instance: Arc<T>,
    ) -> DescriptorBuilder<T> {
        Self::shared(name, move |_| Ok(Arc::clone(&instance)))
    }

    /// Describe an [`Injectable`] component.
    pub fn injectable<T: Injectable>(name: impl Into<String>) -> DescriptorBuilder<T> {
        Self::builder(name, T::inject)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_singleton(&self) -> bool {
        self.scope == Scope::Singleton
    }

    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    /// Whether lookups may view this component as `T`.
    pub fn can_view_as<T: ?Sized + 'static>(&self) -> bool {
        self.casters.contains_key(&TypeId::of::<T>())
    }

    pub(crate) fn is_type<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl std::fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("scope", &self.scope)
            .field("lazy_init", &self.lazy_init)
            .field("depends_on", &self.depends_on)
            .finish()
    }
}

/// Builder for a [`ComponentDescriptor`] of a component of type `T`.
///
/// # Example
/// ```rust,ignore
/// let descriptor = ComponentDescriptor::builder("audit", |registry| {
///     Ok(AuditLog::new(registry.get::<Database>("database")?))
/// })
/// .depends_on("database")
/// .listener()
/// .on_destroy(|log: &AuditLog| log.flush())
/// .build();
/// ```
pub struct DescriptorBuilder<T> {
    descriptor: ComponentDescriptor,
    casters: Casters,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> DescriptorBuilder<T> {
    fn new(name: String, factory: FactoryFn) -> Self {
        let mut casters: Casters = HashMap::new();
        casters.insert(
            TypeId::of::<T>(),
            Arc::new(|component: ComponentRef| {
                component
                    .downcast::<T>()
                    .ok()
                    .map(|concrete| Arc::new(concrete) as ComponentRef)
            }),
        );

        Self {
            descriptor: ComponentDescriptor {
                name,
                type_id: TypeId::of::<T>(),
                type_name: short_type_name::<T>(),
                scope: Scope::Singleton,
                lazy_init: false,
                depends_on: Vec::new(),
                factory,
                init: None,
                destroy: None,
                casters: Arc::new(HashMap::new()),
            },
            casters,
            _marker: PhantomData,
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.descriptor.scope = scope;
        self
    }

    pub fn prototype(self) -> Self {
        self.scope(Scope::Prototype)
    }

    /// Skip this component when the container instantiates its singletons.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.descriptor.lazy_init = lazy;
        self
    }

    /// Make sure `name` is created before this component and destroyed after it.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.descriptor.depends_on.push(name.into());
        self
    }

    /// Let lookups view this component as `Trait`.
    ///
    /// The caster is usually the unsizing coercion itself:
    /// `.implements::<dyn Greeter>(|c| c)`.
    pub fn implements<Trait, F>(mut self, caster: F) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.casters.insert(
            TypeId::of::<Trait>(),
            Arc::new(move |component: ComponentRef| {
                let concrete = component.downcast::<T>().ok()?;
                let view: Arc<Trait> = caster(concrete);
                Some(Arc::new(view) as ComponentRef)
            }),
        );
        self
    }

    /// Run `callback` once the component has been constructed.
    pub fn on_init<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.descriptor.init = Some(typed_callback::<T, F>(callback));
        self
    }

    /// Run `callback` when the registry destroys this singleton.
    pub fn on_destroy<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.descriptor.destroy = Some(typed_callback::<T, F>(callback));
        self
    }

    pub fn build(mut self) -> ComponentDescriptor {
        self.descriptor.casters = Arc::new(self.casters);
        self.descriptor
    }
}

impl<T: Listener + 'static> DescriptorBuilder<T> {
    pub fn listener(self) -> Self {
        self.implements::<dyn Listener, _>(|c| c as Arc<dyn Listener>)
    }
}

impl<T: Lifecycle + 'static> DescriptorBuilder<T> {
    pub fn lifecycle(self) -> Self {
        self.implements::<dyn Lifecycle, _>(|c| c as Arc<dyn Lifecycle>)
    }
}

impl<T: FactoryPostProcessor + 'static> DescriptorBuilder<T> {
    pub fn factory_post_processor(self) -> Self {
        self.implements::<dyn FactoryPostProcessor, _>(|c| c as Arc<dyn FactoryPostProcessor>)
    }
}

impl<T: ComponentPostProcessor + 'static> DescriptorBuilder<T> {
    pub fn component_post_processor(self) -> Self {
        self.implements::<dyn ComponentPostProcessor, _>(|c| c as Arc<dyn ComponentPostProcessor>)
    }
}

impl<T: OnInit + 'static> DescriptorBuilder<T> {
    /// Use the component's [`OnInit`] implementation as its init callback.
    pub fn init_hook(self) -> Self {
        self.on_init(|component: &T| component.on_init().map_err(anyhow::Error::from))
    }
}

impl<T: OnDestroy + 'static> DescriptorBuilder<T> {
    /// Use the component's [`OnDestroy`] implementation as its destroy callback.
    pub fn destroy_hook(self) -> Self {
        self.on_destroy(|component: &T| component.on_destroy().map_err(anyhow::Error::from))
    }
}

fn typed_callback<T, F>(callback: F) -> CallbackFn
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(move |component: &ComponentRef| match component.downcast_ref::<T>() {
        Some(concrete) => callback(concrete),
        None => Err(anyhow::anyhow!(
            "callback expects a {}",
            short_type_name::<T>()
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_builder_defaults() {
        let descriptor = ComponentDescriptor::builder("english", |_| Ok(English)).build();
        assert_eq!(descriptor.name(), "english");
        assert_eq!(descriptor.type_name(), "English");
        assert!(descriptor.is_singleton());
        assert!(!descriptor.is_lazy_init());
        assert!(descriptor.can_view_as::<English>());
        assert!(!descriptor.can_view_as::<dyn Greeter>());
    }

    #[test]
    fn test_builder_registers_trait_views() {
        let descriptor = ComponentDescriptor::builder("english", |_| Ok(English))
            .implements::<dyn Greeter, _>(|c| c as Arc<dyn Greeter>)
            .prototype()
            .lazy(true)
            .depends_on("dictionary")
            .build();

        assert!(descriptor.can_view_as::<dyn Greeter>());
        assert_eq!(descriptor.scope(), Scope::Prototype);
        assert!(descriptor.is_lazy_init());
        assert_eq!(descriptor.depends_on(), ["dictionary".to_string()]);

        let caster = descriptor
            .casters
            .get(&TypeId::of::<dyn Greeter>())
            .cloned()
            .unwrap();
        let component: ComponentRef = Arc::new(English);
        let view = caster(component).unwrap();
        let greeter = view.downcast::<Arc<dyn Greeter>>().unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::Singleton.to_string(), "singleton");
        assert_eq!(Scope::Prototype.as_ref(), "prototype");
    }
}
