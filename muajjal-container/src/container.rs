//! # The Container
//!
//! Builds the catalogue, validates it and hands out lifetime scopes.
//!
//! # Architecture
//! ```text
//! ContainerBuilder  ──build()──>  Container (root LifetimeScope)
//!                                    │
//!                              create_scope()
//!                                    │
//!                                    ▼
//!                              LifetimeScope ── create_scope() ──> ...
//! ```
//!
//! # Examples
//! ```rust
//! use muajjal_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str);
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) { println!("{msg}"); }
//! }
//!
//! struct UserService {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! let container = Container::builder()
//!     .singleton_with::<dyn Logger>(|_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>))
//!     .transient_with::<UserService>(|resolver| {
//!         let logger: Arc<dyn Logger> = resolver.resolve()?;
//!         Ok(Arc::new(UserService { logger }))
//!     })
//!     .build()
//!     .expect("Failed to build container");
//!
//! let service: Arc<UserService> = container.resolve().expect("Failed to resolve");
//! service.logger.log("ready");
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{MuajjalError, Result};
use crate::graph::{DependencyInfo, GraphValidator};
use crate::instance::{Instance, Parameters};
use crate::key::DependencyKey;
use crate::lifetime::Lifetime;
use crate::provider::{ComponentRegistry, Provider};
use crate::registration::RegistrationBuilder;
use crate::registry::Registry;
use crate::resolver::Resolver;
use crate::scope::LifetimeScope;
use crate::source::RegistrationSource;

/// Builder settings, loadable from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Later registrations replace earlier ones with the same key.
    pub allow_override: bool,
    /// Check declared dependencies for completeness, cycles and lifetimes.
    pub validate_dependencies: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            allow_override: false,
            validate_dependencies: true,
        }
    }
}

// ============================================================
// ContainerBuilder
// ============================================================

/// Builds a [`Container`] with registered dependencies.
///
/// Registration errors are collected and the first one is returned by
/// [`build()`](ContainerBuilder::build), so registrations chain without
/// intermediate `?`.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .singleton_value(Config::load())
///     .singleton_with::<Database>(|resolver| { ... })
///     .transient_with::<UserService>(|resolver| { ... })
///     .build()?;
/// ```
pub struct ContainerBuilder {
    registry: Registry,
    options: ContainerOptions,
    errors: Vec<MuajjalError>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            registry: Registry::new(),
            options: ContainerOptions::default(),
            errors: Vec::new(),
        }
    }

    /// Allow overriding previously registered dependencies.
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.options.allow_override = allow;
        self
    }

    /// Enable or disable build-time graph validation.
    pub fn validate_dependencies(mut self, validate: bool) -> Self {
        self.options.validate_dependencies = validate;
        self
    }

    pub fn options(mut self, options: ContainerOptions) -> Self {
        self.options = options;
        self
    }

    // ── Singleton: pre-built value ──

    /// Register a pre-built value as a singleton.
    pub fn singleton_value<T: Send + Sync + 'static>(self, value: T) -> Self {
        let value = Arc::new(value);
        self.register(
            RegistrationBuilder::factory(DependencyKey::of::<T>(), move |_, _| Ok(value.clone()))
                .with_lifetime(Lifetime::singleton()),
        )
    }

    // ── Factories ──

    /// Register a singleton factory, called once on first resolve.
    pub fn singleton_with<T: ?Sized + Send + Sync + 'static>(
        self,
        factory: impl Fn(&dyn Resolver) -> Result<Arc<T>> + Send + Sync + 'static,
    ) -> Self {
        self.typed(Lifetime::singleton(), factory)
    }

    /// Register a factory called once per lifetime scope.
    pub fn scoped_with<T: ?Sized + Send + Sync + 'static>(
        self,
        factory: impl Fn(&dyn Resolver) -> Result<Arc<T>> + Send + Sync + 'static,
    ) -> Self {
        self.typed(Lifetime::scoped(), factory)
    }

    /// Register a factory called on every resolve.
    pub fn transient_with<T: ?Sized + Send + Sync + 'static>(
        self,
        factory: impl Fn(&dyn Resolver) -> Result<Arc<T>> + Send + Sync + 'static,
    ) -> Self {
        self.typed(Lifetime::transient(), factory)
    }

    fn typed<T: ?Sized + Send + Sync + 'static>(
        self,
        lifetime: Lifetime,
        factory: impl Fn(&dyn Resolver) -> Result<Arc<T>> + Send + Sync + 'static,
    ) -> Self {
        self.register(
            RegistrationBuilder::factory(DependencyKey::of::<T>(), move |resolver, _| factory(resolver))
                .with_lifetime(lifetime),
        )
    }

    // ── Full control ──

    /// Register a configured [`RegistrationBuilder`].
    pub fn register(mut self, registration: RegistrationBuilder) -> Self {
        if let Err(err) = self.add_registration(registration) {
            self.errors.push(err);
        }
        self
    }

    /// Install a [`RegistrationSource`]. Sources with an identity that is
    /// already installed are ignored.
    pub fn register_source(mut self, source: Arc<dyn RegistrationSource>) -> Self {
        self.add_source(source);
        self
    }

    /// Run a fallible registration step, recording its error for `build()`.
    pub fn configure(mut self, step: impl FnOnce(&mut Self) -> Result<()>) -> Self {
        if let Err(err) = step(&mut self) {
            warn!(error = %err, "Registration step failed");
            self.errors.push(err);
        }
        self
    }

    // ── Provider modules ──

    /// Add a [`Provider`] module.
    pub fn add_provider(self, provider: &dyn Provider) -> Self {
        debug!(provider = provider.name(), "Adding provider");
        self.configure(|builder| provider.register(builder))
    }

    // ── Build ──

    /// Build the container, validating the dependency graph.
    ///
    /// Fails with the first registration error, if any, then checks that
    /// declared dependencies are registered, acyclic and lifetime
    /// compatible.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(mut self) -> Result<Container> {
        info!(registered = self.registry.len(), "Building container");

        if !self.errors.is_empty() {
            let err = self.errors.remove(0);
            warn!(error = %err, failures = self.errors.len() + 1, "Registration failed");
            return Err(err);
        }

        if self.options.validate_dependencies {
            self.validate()?;
        }

        info!("Container built successfully ✓");
        Ok(Container {
            root: LifetimeScope::new_root(self.registry),
        })
    }

    fn validate(&self) -> Result<()> {
        let components = self.registry.components().map(|reg| DependencyInfo {
            key: reg.key().clone(),
            dependencies: reg.dependencies().to_vec(),
            lifetime: reg.lifetime().clone(),
        });
        let open_generics = self.registry.open_generics().map(|reg| DependencyInfo {
            key: reg.key().clone(),
            dependencies: reg.dependencies().to_vec(),
            lifetime: reg.lifetime().clone(),
        });
        let dep_infos: HashMap<DependencyKey, DependencyInfo> = components
            .chain(open_generics)
            .map(|info| (info.key.clone(), info))
            .collect();

        let definitions: HashSet<DependencyKey> = dep_infos
            .keys()
            .filter(|key| key.service().is_generic_definition())
            .cloned()
            .collect();

        let mut validator =
            GraphValidator::new(dep_infos, definitions, !self.registry.sources().is_empty());
        validator.validate()
    }
}

impl ComponentRegistry for ContainerBuilder {
    fn contains(&self, key: &DependencyKey) -> bool {
        self.registry.contains(key)
    }

    fn allows_override(&self) -> bool {
        self.options.allow_override
    }

    fn add_registration(&mut self, registration: RegistrationBuilder) -> Result<()> {
        self.registry
            .register(registration.build(), self.options.allow_override)
    }

    fn add_source(&mut self, source: Arc<dyn RegistrationSource>) -> bool {
        self.registry.register_source(source)
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Immutable, thread-safe dependency injection container.
///
/// Created by [`ContainerBuilder::build()`]. Resolving from the container
/// resolves in its root lifetime scope.
pub struct Container {
    root: LifetimeScope,
}

impl Container {
    /// Create a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Create a child lifetime scope.
    pub fn create_scope(&self) -> LifetimeScope {
        self.root.create_scope()
    }

    /// Create a child lifetime scope with a tag.
    pub fn create_tagged_scope(&self, tag: impl Into<Arc<str>>) -> LifetimeScope {
        self.root.create_tagged_scope(tag)
    }

    pub fn root_scope(&self) -> &LifetimeScope {
        &self.root
    }

    /// Number of catalogue registrations.
    pub fn len(&self) -> usize {
        self.root.registration_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Resolver for Container {
    fn resolve_key(&self, key: &DependencyKey, parameters: &Parameters) -> Result<Instance> {
        self.root.resolve_key(key, parameters)
    }

    fn lifetime_scope(&self) -> LifetimeScope {
        self.root.clone()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder, ContainerOptions};
    pub use crate::error::{MuajjalError, Result};
    pub use crate::instance::{Instance, Parameter, Parameters};
    pub use crate::key::DependencyKey;
    pub use crate::lifetime::Lifetime;
    pub use crate::provider::{ComponentRegistry, Provider};
    pub use crate::registration::RegistrationBuilder;
    pub use crate::resolver::{Resolver, ResolverApi};
    pub use crate::scope::LifetimeScope;
    pub use crate::types::ServiceType;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Parameter;
    use crate::resolver::ResolverApi;
    use serde::de::value::{Error as ValueError, MapDeserializer};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn resolve_singleton_value() {
        let container = Container::builder()
            .singleton_value(42i32)
            .build()
            .unwrap();

        let value: Arc<i32> = container.resolve().unwrap();
        let again: Arc<i32> = container.resolve().unwrap();
        assert_eq!(*value, 42);
        assert!(Arc::ptr_eq(&value, &again));
    }

    #[test]
    fn resolve_transient_creates_new_each_time() {
        let counter = Arc::new(AtomicU32::new(0));

        let container = Container::builder()
            .transient_with::<u32>({
                let counter = counter.clone();
                move |_| Ok(Arc::new(counter.fetch_add(1, Ordering::SeqCst)))
            })
            .build()
            .unwrap();

        let a: Arc<u32> = container.resolve().unwrap();
        let b: Arc<u32> = container.resolve().unwrap();
        let c: Arc<u32> = container.resolve().unwrap();

        assert_eq!((*a, *b, *c), (0, 1, 2));
    }

    #[test]
    fn singleton_factory_called_once() {
        let counter = Arc::new(AtomicU32::new(0));

        let container = Container::builder()
            .singleton_with::<i32>({
                let counter = counter.clone();
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(42))
                }
            })
            .build()
            .unwrap();

        let _a: Arc<i32> = container.resolve().unwrap();
        let _b: Arc<i32> = container.create_scope().resolve().unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolve_with_dependency() {
        let container = Container::builder()
            .singleton_value(String::from("postgres://localhost"))
            .transient_with::<Vec<u8>>(|r| {
                let url: Arc<String> = r.resolve()?;
                Ok(Arc::new(url.as_bytes().to_vec()))
            })
            .build()
            .unwrap();

        let bytes: Arc<Vec<u8>> = container.resolve().unwrap();
        assert_eq!(bytes.as_slice(), b"postgres://localhost");
    }

    #[test]
    fn named_registrations_are_separate() {
        let container = Container::builder()
            .register(RegistrationBuilder::factory(
                DependencyKey::named::<String>("primary"),
                |_, _| Ok(Arc::new(String::from("db-1"))),
            ))
            .build()
            .unwrap();

        let primary: Arc<String> = container.resolve_named("primary").unwrap();
        assert_eq!(primary.as_str(), "db-1");
        assert!(container.resolve::<String>().is_err());
        assert!(container.resolve_named::<String>("replica").is_err());
    }

    #[test]
    fn parameters_reach_the_activator() {
        struct Greeting(String);

        let container = Container::builder()
            .register(RegistrationBuilder::factory(
                DependencyKey::of::<Greeting>(),
                |_, parameters| {
                    let name = parameters
                        .named::<String>("name")
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "stranger".into());
                    Ok(Arc::new(Greeting(format!("salaam, {name}"))))
                },
            ))
            .build()
            .unwrap();

        let parameters = Parameters::new().with(Parameter::named("name", String::from("Ansar")));
        let greeting: Arc<Greeting> = container.resolve_with(&parameters).unwrap();
        assert_eq!(greeting.0, "salaam, Ansar");

        let default: Arc<Greeting> = container.resolve().unwrap();
        assert_eq!(default.0, "salaam, stranger");
    }

    #[test]
    fn typed_parameter_overrides_dependency() {
        trait Clock: Send + Sync {
            fn now(&self) -> u64;
        }
        struct Fixed(u64);
        impl Clock for Fixed {
            fn now(&self) -> u64 {
                self.0
            }
        }
        struct Stamp(u64);

        let container = Container::builder()
            .singleton_with::<dyn Clock>(|_| Ok(Arc::new(Fixed(1)) as Arc<dyn Clock>))
            .register(RegistrationBuilder::factory(
                DependencyKey::of::<Stamp>(),
                |r, parameters| {
                    let clock = r.resolve_or_param::<dyn Clock>(parameters)?;
                    Ok(Arc::new(Stamp(clock.now())))
                },
            ))
            .build()
            .unwrap();

        let overridden = Parameters::new().with(Parameter::typed::<dyn Clock>(Arc::new(Fixed(99))));
        assert_eq!(container.resolve_with::<Stamp>(&overridden).unwrap().0, 99);
        assert_eq!(container.resolve::<Stamp>().unwrap().0, 1);
    }

    #[test]
    fn resolve_not_registered() {
        let container = Container::builder().build().unwrap();

        match container.resolve::<i32>().unwrap_err() {
            MuajjalError::NotRegistered(e) => {
                assert!(e.requested.type_name().contains("i32"));
            }
            other => panic!("Expected NotRegistered, got: {other:?}"),
        }
    }

    #[test]
    fn duplicate_registration_fails_build() {
        let result = Container::builder()
            .singleton_value(1i32)
            .singleton_value(2i32)
            .build();

        assert!(matches!(result.unwrap_err(), MuajjalError::AlreadyRegistered(_)));
    }

    #[test]
    fn override_replaces_registration() {
        let container = Container::builder()
            .allow_override(true)
            .singleton_value(1i32)
            .singleton_value(2i32)
            .build()
            .unwrap();

        assert_eq!(*container.resolve::<i32>().unwrap(), 2);
    }

    #[test]
    fn declared_missing_dependency_fails_build() {
        struct Service;
        struct Missing;

        let result = Container::builder()
            .register(
                RegistrationBuilder::factory(DependencyKey::of::<Service>(), |_, _| Ok(Arc::new(Service)))
                    .depends_on(DependencyKey::of::<Missing>()),
            )
            .build();
        assert!(matches!(result.unwrap_err(), MuajjalError::NotRegistered(_)));

        let unchecked = Container::builder()
            .validate_dependencies(false)
            .register(
                RegistrationBuilder::factory(DependencyKey::of::<Service>(), |_, _| Ok(Arc::new(Service)))
                    .depends_on(DependencyKey::of::<Missing>()),
            )
            .build();
        assert!(unchecked.is_ok());
    }

    #[test]
    fn type_mismatch_is_reported() {
        let container = Container::builder()
            .register(RegistrationBuilder::delegate(
                DependencyKey::of::<u64>(),
                crate::types::ServiceType::of::<u64>(),
                Arc::new(|_: &dyn Resolver, _: &Parameters| Ok(Instance::new(Arc::new(1u8)))),
            ))
            .build()
            .unwrap();

        let err = container.resolve::<u64>().unwrap_err();
        assert!(matches!(err, MuajjalError::ConstructionFailed { .. }));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options = ContainerOptions::deserialize(MapDeserializer::<_, ValueError>::new(
            vec![("allow_override", true)].into_iter(),
        ))
        .unwrap();

        assert!(options.allow_override);
        assert!(options.validate_dependencies);
        assert!(!ContainerOptions::default().allow_override);
    }

    #[test]
    fn debug_display() {
        let container = Container::builder()
            .singleton_value(1i32)
            .singleton_value(String::from("x"))
            .build()
            .unwrap();

        let debug = format!("{container:?}");
        assert!(debug.contains("Container"));
        assert!(debug.contains("2")); // 2 registered
    }
}
