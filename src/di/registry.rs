use crate::caches::short_type_name;
use crate::di::descriptor::{CallbackFn, Casters, ComponentDescriptor, ComponentRef, Scope};
use crate::di::{LazyRef, serialization};
use crate::error::{ContainerError, Result};
use crate::postprocess::ComponentPostProcessor;
use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

struct SingletonEntry {
    exposed: ComponentRef,
    raw: ComponentRef,
    casters: Arc<Casters>,
    destroy: Option<CallbackFn>,
    /// Created from a descriptor, so component post-processors saw it.
    processed: bool,
}

/// Thread-safe store of component descriptors and the singletons built from them.
///
/// A registry is always handled through an `Arc`; lookups resolve aliases,
/// create singletons on first use and fall back to the parent registry for
/// names they do not define. Singletons are destroyed in reverse creation
/// order, dependents first.
pub struct ComponentRegistry {
    me: Weak<ComponentRegistry>,
    parent: Option<Arc<ComponentRegistry>>,
    serialization_id: RwLock<Option<String>>,
    allow_definition_overriding: AtomicBool,
    allow_circular_references: AtomicBool,
    descriptors: RwLock<IndexMap<String, Arc<ComponentDescriptor>>>,
    aliases: RwLock<HashMap<String, String>>,
    singletons: RwLock<IndexMap<String, SingletonEntry>>,
    dependents: RwLock<HashMap<String, Vec<String>>>,
    creation_lock: ReentrantMutex<()>,
    creation_path: Mutex<Vec<String>>,
    destroying: AtomicBool,
    post_processors: RwLock<Vec<Arc<dyn ComponentPostProcessor>>>,
    ignored_types: RwLock<HashSet<TypeId>>,
    resolvable: RwLock<HashMap<TypeId, ComponentRef>>,
}

impl ComponentRegistry {
    pub fn new() -> Arc<Self> {
        Self::with_parent(None)
    }

    pub fn with_parent(parent: Option<Arc<ComponentRegistry>>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            parent,
            serialization_id: RwLock::new(None),
            allow_definition_overriding: AtomicBool::new(true),
            allow_circular_references: AtomicBool::new(true),
            descriptors: RwLock::new(IndexMap::new()),
            aliases: RwLock::new(HashMap::new()),
            singletons: RwLock::new(IndexMap::new()),
            dependents: RwLock::new(HashMap::new()),
            creation_lock: ReentrantMutex::new(()),
            creation_path: Mutex::new(Vec::new()),
            destroying: AtomicBool::new(false),
            post_processors: RwLock::new(Vec::new()),
            ignored_types: RwLock::new(HashSet::new()),
            resolvable: RwLock::new(HashMap::new()),
        })
    }

    pub fn parent(&self) -> Option<&Arc<ComponentRegistry>> {
        self.parent.as_ref()
    }

    pub fn serialization_id(&self) -> Option<String> {
        self.serialization_id.read().clone()
    }

    /// Set or clear the id tying this registry back to its container.
    pub fn set_serialization_id(&self, id: Option<String>) {
        let mut current = self.serialization_id.write();
        if let Some(old) = current.take() {
            serialization::unregister(&old, &self.me);
        }
        if let Some(new) = &id {
            serialization::register(new, self.me.clone());
        }
        *current = id;
    }

    pub fn set_allow_definition_overriding(&self, allow: bool) {
        self.allow_definition_overriding
            .store(allow, Ordering::SeqCst);
    }

    pub fn is_allow_definition_overriding(&self) -> bool {
        self.allow_definition_overriding.load(Ordering::SeqCst)
    }

    pub fn set_allow_circular_references(&self, allow: bool) {
        self.allow_circular_references.store(allow, Ordering::SeqCst);
    }

    pub fn is_allow_circular_references(&self) -> bool {
        self.allow_circular_references.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Descriptors and aliases
    // ------------------------------------------------------------------

    /// Register a descriptor under its name.
    ///
    /// Replacing an existing descriptor destroys the singleton built from it.
    ///
    /// # Errors
    /// Fails if the name is taken and overriding is disabled.
    pub fn register_descriptor(&self, descriptor: ComponentDescriptor) -> Result<()> {
        let name = descriptor.name.clone();
        let replaced = {
            let mut descriptors = self.descriptors.write();
            if let Some(existing) = descriptors.get(&name) {
                if !self.is_allow_definition_overriding() {
                    return Err(ContainerError::DefinitionOverride { name });
                }
                tracing::debug!(
                    "Overriding descriptor '{}': replacing {} with {}",
                    name,
                    existing.type_name,
                    descriptor.type_name
                );
            }
            descriptors
                .insert(name.clone(), Arc::new(descriptor))
                .is_some()
        };
        if replaced {
            self.destroy_singleton(&name);
        }
        Ok(())
    }

    /// Remove a descriptor, destroying its singleton if one was created.
    pub fn remove_descriptor(&self, name: &str) -> Result<()> {
        let canonical = self.canonical_name(name);
        let removed = self.descriptors.write().shift_remove(&canonical);
        if removed.is_none() {
            return Err(ContainerError::no_such_component(name));
        }
        self.destroy_singleton(&canonical);
        Ok(())
    }

    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        let invalid = |reason: &str| ContainerError::InvalidAlias {
            alias: alias.to_string(),
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if alias == name {
            self.aliases.write().remove(alias);
            return Ok(());
        }
        if self.descriptors.read().contains_key(alias) {
            return Err(invalid("a component with that name exists"));
        }
        if self.canonical_name(name) == alias {
            return Err(invalid("alias would create a cycle"));
        }
        let mut aliases = self.aliases.write();
        if let Some(existing) = aliases.get(alias)
            && existing != name
            && !self.is_allow_definition_overriding()
        {
            return Err(invalid("alias already bound to another name"));
        }
        aliases.insert(alias.to_string(), name.to_string());
        Ok(())
    }

    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let mut found: Vec<String> = self
            .aliases
            .read()
            .iter()
            .filter(|(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.clone())
            .collect();
        found.sort();
        found
    }

    /// Follow alias chains down to a component name.
    pub fn canonical_name(&self, name: &str) -> String {
        let aliases = self.aliases.read();
        let mut current = name;
        for _ in 0..=aliases.len() {
            match aliases.get(current) {
                Some(target) => current = target,
                None => break,
            }
        }
        current.to_string()
    }

    pub fn descriptor(&self, name: &str) -> Option<Arc<ComponentDescriptor>> {
        let canonical = self.canonical_name(name);
        self.descriptors.read().get(&canonical).cloned()
    }

    /// Descriptor names in registration order.
    pub fn descriptor_names(&self) -> Vec<String> {
        self.descriptors.read().keys().cloned().collect()
    }

    pub fn descriptor_count(&self) -> usize {
        self.descriptors.read().len()
    }

    pub fn contains_descriptor(&self, name: &str) -> bool {
        let canonical = self.canonical_name(name);
        self.descriptors.read().contains_key(&canonical)
    }

    /// Whether this registry, ignoring its parent, defines `name`.
    pub fn contains_local(&self, name: &str) -> bool {
        let canonical = self.canonical_name(name);
        self.singletons.read().contains_key(&canonical)
            || self.descriptors.read().contains_key(&canonical)
    }

    pub fn contains_component(&self, name: &str) -> bool {
        self.contains_local(name)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.contains_component(name))
    }

    // ------------------------------------------------------------------
    // Singletons
    // ------------------------------------------------------------------

    /// Register a ready-made singleton that lookups can view as `T`.
    pub fn register_singleton<T: Send + Sync + 'static>(
        &self,
        name: &str,
        instance: Arc<T>,
    ) -> Result<()> {
        let component: ComponentRef = instance;
        let mut casters: Casters = HashMap::new();
        casters.insert(
            TypeId::of::<T>(),
            Arc::new(|c: ComponentRef| {
                c.downcast::<T>()
                    .ok()
                    .map(|concrete| Arc::new(concrete) as ComponentRef)
            }),
        );
        self.add_singleton(name, component, casters)
    }

    /// Register a ready-made singleton that lookups can view as the trait
    /// object `T`.
    pub fn register_shared<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
        instance: Arc<T>,
    ) -> Result<()> {
        let component: ComponentRef = Arc::new(instance);
        let mut casters: Casters = HashMap::new();
        casters.insert(TypeId::of::<T>(), Arc::new(|c: ComponentRef| Some(c)));
        self.add_singleton(name, component, casters)
    }

    fn add_singleton(&self, name: &str, component: ComponentRef, casters: Casters) -> Result<()> {
        let mut singletons = self.singletons.write();
        if singletons.contains_key(name) {
            return Err(ContainerError::DefinitionOverride {
                name: name.to_string(),
            });
        }
        singletons.insert(
            name.to_string(),
            SingletonEntry {
                exposed: Arc::clone(&component),
                raw: component,
                casters: Arc::new(casters),
                destroy: None,
                processed: false,
            },
        );
        Ok(())
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        let canonical = self.canonical_name(name);
        self.singletons.read().contains_key(&canonical)
    }

    /// Names of the singletons created or registered so far, oldest first.
    pub fn singleton_names(&self) -> Vec<String> {
        self.singletons.read().keys().cloned().collect()
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.read().len()
    }

    // ------------------------------------------------------------------
    // Post-processors and dependency markers
    // ------------------------------------------------------------------

    /// Append a component post-processor; re-adding one moves it to the end.
    pub fn add_post_processor(&self, processor: Arc<dyn ComponentPostProcessor>) {
        let mut processors = self.post_processors.write();
        processors.retain(|existing| !Arc::ptr_eq(existing, &processor));
        processors.push(processor);
    }

    pub fn post_processor_count(&self) -> usize {
        self.post_processors.read().len()
    }

    /// Never resolve `T` by type from descriptors.
    pub fn ignore_dependency_type<T: ?Sized + 'static>(&self) {
        self.ignored_types.write().insert(TypeId::of::<T>());
    }

    pub fn is_ignored_dependency_type<T: ?Sized + 'static>(&self) -> bool {
        self.ignored_types.read().contains(&TypeId::of::<T>())
    }

    /// Resolve `T` by type to `value`, ahead of any descriptor.
    pub fn register_resolvable<T: ?Sized + Send + Sync + 'static>(&self, value: Arc<T>) {
        self.resolvable
            .write()
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Look up a component by name and view it as `T`, creating it if needed.
    ///
    /// `T` is either the component's own type or a trait object its
    /// descriptor declared with
    /// [`implements`](crate::di::DescriptorBuilder::implements).
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        let (component, casters) = self.resolve(name)?;
        view::<T>(name, component, &casters)
    }

    /// Look up the single component viewable as `T`.
    pub fn get_by_type<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let resolvable = self.resolvable.read().get(&TypeId::of::<T>()).cloned();
        if let Some(value) = resolvable {
            return value
                .downcast::<Arc<T>>()
                .map(|wrapper| Arc::clone(&*wrapper))
                .map_err(|_| ContainerError::TypeMismatch {
                    name: "<resolvable>".to_string(),
                    type_name: short_type_name::<T>().to_string(),
                });
        }

        let type_name = short_type_name::<T>().to_string();
        if self.is_ignored_dependency_type::<T>() {
            return Err(ContainerError::NoSuchComponent { name: type_name });
        }

        let mut candidates = self.names_for_type::<T>();
        match candidates.len() {
            1 => self.get::<T>(&candidates.remove(0)),
            0 => match &self.parent {
                Some(parent) => parent.get_by_type::<T>(),
                None => Err(ContainerError::NoSuchComponent { name: type_name }),
            },
            _ => Err(ContainerError::NoUniqueComponent {
                type_name,
                candidates,
            }),
        }
    }

    /// Names of the local components viewable as `T`, in registration order.
    ///
    /// Does not create anything.
    pub fn names_for_type<T: ?Sized + 'static>(&self) -> Vec<String> {
        let type_id = TypeId::of::<T>();
        let descriptors = self.descriptors.read();
        let mut names: Vec<String> = descriptors
            .values()
            .filter(|descriptor| descriptor.is_type::<T>() || descriptor.casters.contains_key(&type_id))
            .map(|descriptor| descriptor.name.clone())
            .collect();

        for (name, entry) in self.singletons.read().iter() {
            if !descriptors.contains_key(name) && entry.casters.contains_key(&type_id) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Every local component viewable as `T`, in registration order.
    pub fn components_of<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<(String, Arc<T>)>> {
        self.names_for_type::<T>()
            .into_iter()
            .map(|name| self.get::<T>(&name).map(|component| (name, component)))
            .collect()
    }

    /// A deferred reference to `name`, resolved on first use.
    ///
    /// # Errors
    /// Fails if `name` is currently being created and circular references
    /// are disabled.
    pub fn lazy<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<LazyRef<T>> {
        let canonical = self.canonical_name(name);
        let _guard = self.creation_lock.lock();
        if !self.is_allow_circular_references() && self.creation_path.lock().contains(&canonical)
        {
            return Err(ContainerError::CircularReferencesDisallowed { name: canonical });
        }
        Ok(LazyRef::new(self.me.clone(), canonical))
    }

    /// Create every non-lazy singleton, in registration order.
    pub fn pre_instantiate_singletons(&self) -> Result<()> {
        let names = self.descriptor_names();
        tracing::debug!("Pre-instantiating singletons in {}", self);
        for name in names {
            let Some(descriptor) = self.descriptor(&name) else {
                continue;
            };
            if descriptor.is_singleton() && !descriptor.lazy_init {
                self.resolve(&name)?;
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<(ComponentRef, Arc<Casters>)> {
        let canonical = self.canonical_name(name);
        if let Some(hit) = self.singleton_hit(&canonical) {
            return Ok(hit);
        }
        let Some(descriptor) = self.descriptor(&canonical) else {
            return match &self.parent {
                Some(parent) => parent.resolve(name),
                None => Err(ContainerError::no_such_component(name)),
            };
        };
        match descriptor.scope {
            Scope::Singleton => self.get_or_create_singleton(&descriptor),
            Scope::Prototype => {
                let (exposed, _) = self.create_guarded(&descriptor)?;
                Ok((exposed, Arc::clone(&descriptor.casters)))
            }
        }
    }

    fn singleton_hit(&self, name: &str) -> Option<(ComponentRef, Arc<Casters>)> {
        self.singletons
            .read()
            .get(name)
            .map(|entry| (Arc::clone(&entry.exposed), Arc::clone(&entry.casters)))
    }

    fn get_or_create_singleton(
        &self,
        descriptor: &ComponentDescriptor,
    ) -> Result<(ComponentRef, Arc<Casters>)> {
        let _guard = self.creation_lock.lock();
        if let Some(hit) = self.singleton_hit(&descriptor.name) {
            return Ok(hit);
        }
        if self.destroying.load(Ordering::SeqCst) {
            return Err(ContainerError::SingletonsDestroying {
                name: descriptor.name.clone(),
            });
        }

        let (exposed, raw) = self.create_guarded(descriptor)?;
        self.singletons.write().insert(
            descriptor.name.clone(),
            SingletonEntry {
                exposed: Arc::clone(&exposed),
                raw,
                casters: Arc::clone(&descriptor.casters),
                destroy: descriptor.destroy.clone(),
                processed: true,
            },
        );
        tracing::debug!(
            "Created singleton '{}' ({})",
            descriptor.name,
            descriptor.type_name
        );
        Ok((exposed, Arc::clone(&descriptor.casters)))
    }

    fn create_guarded(&self, descriptor: &ComponentDescriptor) -> Result<(ComponentRef, ComponentRef)> {
        let _guard = self.creation_lock.lock();
        {
            let mut path = self.creation_path.lock();
            if let Some(start) = path.iter().position(|n| *n == descriptor.name) {
                let mut cycle = path[start..].to_vec();
                cycle.push(descriptor.name.clone());
                return Err(ContainerError::CircularDependency {
                    cycle: cycle.join(" -> "),
                });
            }
            path.push(descriptor.name.clone());
        }
        let result = self.create_component(descriptor);
        self.creation_path.lock().pop();
        result
    }

    fn create_component(&self, descriptor: &ComponentDescriptor) -> Result<(ComponentRef, ComponentRef)> {
        let name = descriptor.name.as_str();
        for dependency in &descriptor.depends_on {
            let dependency = self.canonical_name(dependency);
            self.register_dependent(&dependency, name);
            self.resolve(&dependency)
                .map_err(|e| ContainerError::creation(name, e.into()))?;
        }

        let raw = (descriptor.factory)(self).map_err(|e| ContainerError::creation(name, e))?;

        let processors = self.post_processors.read().clone();
        let mut exposed = Arc::clone(&raw);
        for processor in &processors {
            exposed = processor
                .before_initialization(exposed, name)
                .map_err(|e| ContainerError::ComponentPostProcessor {
                    component: name.to_string(),
                    source: e,
                })?;
        }
        if let Some(init) = &descriptor.init {
            init(&raw).map_err(|e| ContainerError::creation(name, e))?;
        }
        for processor in &processors {
            exposed = processor
                .after_initialization(exposed, name)
                .map_err(|e| ContainerError::ComponentPostProcessor {
                    component: name.to_string(),
                    source: e,
                })?;
        }
        Ok((exposed, raw))
    }

    fn register_dependent(&self, dependency: &str, dependent: &str) {
        let mut dependents = self.dependents.write();
        let entry = dependents.entry(dependency.to_string()).or_default();
        if !entry.iter().any(|d| d == dependent) {
            entry.push(dependent.to_string());
        }
    }

    /// Names of the components that declared a dependency on `name`.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.dependents
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Destruction
    // ------------------------------------------------------------------

    /// Destroy every singleton, newest first.
    ///
    /// Failing destroy callbacks are logged and skipped; destruction of the
    /// remaining singletons always continues.
    pub fn destroy_singletons(&self) {
        let _guard = self.creation_lock.lock();
        tracing::debug!("Destroying singletons in {}", self);
        self.destroying.store(true, Ordering::SeqCst);

        let names = self.singleton_names();
        for name in names.iter().rev() {
            self.destroy_singleton(name);
        }

        self.dependents.write().clear();
        self.destroying.store(false, Ordering::SeqCst);
    }

    /// Destroy one singleton, after destroying the singletons depending on it.
    pub fn destroy_singleton(&self, name: &str) {
        let removed = self.singletons.write().shift_remove(name);
        let Some(entry) = removed else {
            return;
        };

        let dependents = self.dependents.write().remove(name).unwrap_or_default();
        for dependent in dependents.iter().rev() {
            self.destroy_singleton(dependent);
        }

        if entry.processed {
            let processors = self.post_processors.read().clone();
            for processor in processors {
                if let Err(e) = processor.before_destruction(&entry.exposed, name) {
                    tracing::warn!(
                        "Destruction post-processor failed on component '{}': {:#}",
                        name,
                        e
                    );
                }
            }
        }
        if let Some(destroy) = &entry.destroy {
            if let Err(e) = destroy(&entry.raw) {
                tracing::warn!("Destroy callback of component '{}' failed: {:#}", name, e);
            } else {
                tracing::trace!("Destroyed component '{}'", name);
            }
        }
    }
}

fn view<T: ?Sized + Send + Sync + 'static>(
    name: &str,
    component: ComponentRef,
    casters: &Casters,
) -> Result<Arc<T>> {
    let mismatch = || ContainerError::TypeMismatch {
        name: name.to_string(),
        type_name: short_type_name::<T>().to_string(),
    };
    let caster = casters.get(&TypeId::of::<T>()).ok_or_else(mismatch)?;
    let viewed = caster(component).ok_or_else(mismatch)?;
    let wrapper = viewed.downcast::<Arc<T>>().map_err(|_| mismatch())?;
    Ok(Arc::clone(&*wrapper))
}

impl std::fmt::Display for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ComponentRegistry[{}]: defining components [{}]",
            self.serialization_id().unwrap_or_default(),
            self.descriptor_names().join(",")
        )
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("serialization_id", &self.serialization_id())
            .field("descriptors", &self.descriptor_names())
            .field("singletons", &self.singleton_names())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
