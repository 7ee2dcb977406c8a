//! Component registrations and the builder that configures them.
//!
//! A [`RegistrationBuilder`] is what callers (and registration mutators)
//! shape before handing it to the container. The container turns it into
//! an immutable [`ComponentRegistration`], or an
//! [`OpenGenericRegistration`] when the target is a
//! [`GenericImplementation`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anymap2::SendSyncAnyMap;
use tracing::trace;

use crate::error::Result;
use crate::generic::{GenericImplementation, OpenGenericRegistration};
use crate::instance::{Instance, Parameters};
use crate::key::DependencyKey;
use crate::lifetime::{InstanceOwnership, Lifetime};
use crate::resolver::Resolver;
use crate::types::ServiceType;

/// Builds an instance from the resolver of the owning scope and the
/// parameters of the resolve call.
///
/// `Arc` so registrations can be cloned and shared between threads
/// without copying the closure.
pub type Activator =
    Arc<dyn Fn(&dyn Resolver, &Parameters) -> Result<Instance> + Send + Sync>;

/// Runs after activation and may replace the instance (decorators).
pub type ActivatingHandler =
    Arc<dyn Fn(&dyn Resolver, Instance) -> Result<Instance> + Send + Sync>;

/// Observes the final instance.
pub type ActivatedHandler = Arc<dyn Fn(&dyn Resolver, &Instance) + Send + Sync>;

static NEXT_COMPONENT: AtomicU64 = AtomicU64::new(1);

/// Identity of one component registration, used as the instance cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    fn next() -> Self {
        Self(NEXT_COMPONENT.fetch_add(1, Ordering::Relaxed))
    }
}

/// An immutable registration in the container catalogue.
#[derive(Clone)]
pub struct ComponentRegistration {
    id: ComponentId,
    key: DependencyKey,
    implementation: ServiceType,
    activator: Activator,
    lifetime: Lifetime,
    activating: Vec<ActivatingHandler>,
    activated: Vec<ActivatedHandler>,
    metadata: Arc<SendSyncAnyMap>,
    dependencies: Vec<DependencyKey>,
}

impl ComponentRegistration {
    /// A bare registration, as synthesized by registration sources.
    pub fn new(
        key: DependencyKey,
        implementation: ServiceType,
        activator: Activator,
        lifetime: Lifetime,
    ) -> Self {
        Self {
            id: ComponentId::next(),
            key,
            implementation,
            activator,
            lifetime,
            activating: Vec::new(),
            activated: Vec::new(),
            metadata: Arc::new(SendSyncAnyMap::new()),
            dependencies: Vec::new(),
        }
    }

    /// A new registration for `key` that shares this one's implementation
    /// type and metadata. Hooks are not carried over.
    pub fn derive(&self, key: DependencyKey, activator: Activator, lifetime: Lifetime) -> Self {
        Self {
            id: ComponentId::next(),
            key,
            implementation: self.implementation.clone(),
            activator,
            lifetime,
            activating: Vec::new(),
            activated: Vec::new(),
            metadata: self.metadata.clone(),
            dependencies: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    #[inline]
    pub fn key(&self) -> &DependencyKey {
        &self.key
    }

    pub fn implementation(&self) -> &ServiceType {
        &self.implementation
    }

    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    /// The raw activator, without activation hooks.
    pub fn activator(&self) -> &Activator {
        &self.activator
    }

    pub fn dependencies(&self) -> &[DependencyKey] {
        &self.dependencies
    }

    /// Typed metadata attached at registration.
    pub fn metadata<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.metadata.get::<T>()
    }

    /// Runs the activator, then the activating and activated hooks.
    pub fn activate(&self, resolver: &dyn Resolver, parameters: &Parameters) -> Result<Instance> {
        trace!(key = %self.key, implementation = %self.implementation, "Activating");
        let mut instance = (self.activator)(resolver, parameters)?;
        for handler in &self.activating {
            instance = handler(resolver, instance)?;
        }
        for handler in &self.activated {
            handler(resolver, &instance);
        }
        Ok(instance)
    }
}

impl fmt::Debug for ComponentRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistration")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("implementation", &self.implementation)
            .field("lifetime", &self.lifetime)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[derive(Clone)]
enum Target {
    Delegate(Activator),
    Generic(GenericImplementation),
}

/// A registration being configured.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use muajjal_container::key::DependencyKey;
/// use muajjal_container::lifetime::Lifetime;
/// use muajjal_container::registration::RegistrationBuilder;
///
/// let registration = RegistrationBuilder::factory(
///     DependencyKey::named::<String>("greeting"),
///     |_, _| Ok(Arc::new(String::from("salaam"))),
/// )
/// .with_lifetime(Lifetime::singleton());
///
/// assert!(registration.lifetime().is_cached());
/// assert!(!registration.is_generic());
/// ```
#[derive(Clone)]
pub struct RegistrationBuilder {
    key: DependencyKey,
    implementation: ServiceType,
    target: Target,
    lifetime: Lifetime,
    activating: Vec<ActivatingHandler>,
    activated: Vec<ActivatedHandler>,
    metadata: MetadataWriters,
    dependencies: Vec<DependencyKey>,
}

/// Typed metadata entries, kept as closures so the builder stays `Clone`.
type MetadataWriters = Vec<Arc<dyn Fn(&mut SendSyncAnyMap) + Send + Sync>>;

impl RegistrationBuilder {
    /// Registers `activator` as the implementation of `key`.
    pub fn delegate(key: DependencyKey, implementation: ServiceType, activator: Activator) -> Self {
        Self::with_target(key, implementation, Target::Delegate(activator))
    }

    /// Registers a typed factory for `key`. The implementation type is `T`.
    pub fn factory<T: ?Sized + Send + Sync + 'static>(
        key: DependencyKey,
        factory: impl Fn(&dyn Resolver, &Parameters) -> Result<Arc<T>> + Send + Sync + 'static,
    ) -> Self {
        let activator: Activator =
            Arc::new(move |resolver: &dyn Resolver, parameters: &Parameters| {
                factory(resolver, parameters).map(Instance::new)
            });
        Self::delegate(key, ServiceType::of::<T>(), activator)
    }

    /// Registers an open generic implementation under an open definition key.
    pub fn generic(key: DependencyKey, implementation: GenericImplementation) -> Self {
        let definition = implementation.definition().clone();
        Self::with_target(key, definition, Target::Generic(implementation))
    }

    fn with_target(key: DependencyKey, implementation: ServiceType, target: Target) -> Self {
        Self {
            key,
            implementation,
            target,
            lifetime: Lifetime::transient(),
            activating: Vec::new(),
            activated: Vec::new(),
            metadata: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn externally_owned(mut self) -> Self {
        self.lifetime.ownership = InstanceOwnership::ExternallyOwned;
        self
    }

    pub fn owned_by_lifetime_scope(mut self) -> Self {
        self.lifetime.ownership = InstanceOwnership::OwnedByLifetimeScope;
        self
    }

    /// Adds a hook that may replace the activated instance.
    pub fn on_activating(
        mut self,
        handler: impl Fn(&dyn Resolver, Instance) -> Result<Instance> + Send + Sync + 'static,
    ) -> Self {
        self.activating.push(Arc::new(handler));
        self
    }

    pub fn on_activated(
        mut self,
        handler: impl Fn(&dyn Resolver, &Instance) + Send + Sync + 'static,
    ) -> Self {
        self.activated.push(Arc::new(handler));
        self
    }

    /// Attaches a typed metadata value, one per type.
    pub fn with_metadata<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.metadata.push(Arc::new(move |map: &mut SendSyncAnyMap| {
            map.insert(value.clone());
        }));
        self
    }

    /// Declares a dependency for build-time graph validation.
    pub fn depends_on(mut self, key: DependencyKey) -> Self {
        self.dependencies.push(key);
        self
    }

    pub fn key(&self) -> &DependencyKey {
        &self.key
    }

    pub fn implementation(&self) -> &ServiceType {
        &self.implementation
    }

    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    pub fn is_generic(&self) -> bool {
        matches!(self.target, Target::Generic(_))
    }

    /// Finishes the registration.
    pub fn build(self) -> Registration {
        let mut metadata = SendSyncAnyMap::new();
        for apply in &self.metadata {
            apply(&mut metadata);
        }
        let metadata = Arc::new(metadata);

        match self.target {
            Target::Delegate(activator) => Registration::Component(ComponentRegistration {
                id: ComponentId::next(),
                key: self.key,
                implementation: self.implementation,
                activator,
                lifetime: self.lifetime,
                activating: self.activating,
                activated: self.activated,
                metadata,
                dependencies: self.dependencies,
            }),
            Target::Generic(generic) => Registration::OpenGeneric(OpenGenericRegistration::new(
                self.key,
                generic,
                self.lifetime,
                self.activating,
                self.activated,
                metadata,
                self.dependencies,
            )),
        }
    }
}

impl fmt::Debug for RegistrationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationBuilder")
            .field("key", &self.key)
            .field("implementation", &self.implementation)
            .field("lifetime", &self.lifetime)
            .field("generic", &self.is_generic())
            .finish()
    }
}

/// A finished registration.
#[derive(Debug)]
pub enum Registration {
    Component(ComponentRegistration),
    OpenGeneric(OpenGenericRegistration),
}

impl Registration {
    pub fn key(&self) -> &DependencyKey {
        match self {
            Registration::Component(registration) => registration.key(),
            Registration::OpenGeneric(registration) => registration.key(),
        }
    }
}

/// Pieces of a closed registration, used by the open-generic closer.
pub(crate) struct ClosedParts {
    pub key: DependencyKey,
    pub implementation: ServiceType,
    pub activator: Activator,
    pub lifetime: Lifetime,
    pub activating: Vec<ActivatingHandler>,
    pub activated: Vec<ActivatedHandler>,
    pub metadata: Arc<SendSyncAnyMap>,
}

impl From<ClosedParts> for ComponentRegistration {
    fn from(parts: ClosedParts) -> Self {
        Self {
            id: ComponentId::next(),
            key: parts.key,
            implementation: parts.implementation,
            activator: parts.activator,
            lifetime: parts.lifetime,
            activating: parts.activating,
            activated: parts.activated,
            metadata: parts.metadata,
            dependencies: Vec::new(),
        }
    }
}
