//! Lazy registration methods on [`ContainerBuilder`].
//!
//! # Examples
//! ```rust,ignore
//! let container = Container::builder()
//!     .register_lazy::<dyn Reports>(
//!         |resolver, _| Ok(Arc::new(PdfReports::new(resolver.resolve()?)) as Arc<dyn Reports>),
//!         LazyOptions::new().lifetime(ServiceLifetime::SingleInstance),
//!     )
//!     .build()?;
//!
//! // Nothing is constructed yet.
//! let reports: Arc<dyn Reports> = container.resolve()?;
//! // PdfReports is constructed here.
//! reports.render()?;
//! ```

use std::fmt;
use std::sync::Arc;

use muajjal_container::container::ContainerBuilder;
use muajjal_container::error::Result;
use muajjal_container::generic::GenericImplementation;
use muajjal_container::instance::Parameters;
use muajjal_container::resolver::Resolver;
use muajjal_container::types::ServiceType;

use crate::deferred::LazyContract;
use crate::lifetime::ServiceLifetime;
use crate::planner::{LazyImplementation, LazyRegistrationRequest, RegistrationMutator, RegistrationPlanner};
use crate::proxy::{ProxyFactory, ProxyRegistry, StandInFactory};

/// Optional settings of a lazy registration.
#[derive(Clone, Default)]
pub struct LazyOptions {
    name: Option<Arc<str>>,
    lifetime: ServiceLifetime,
    mutator: Option<Arc<dyn RegistrationMutator>>,
}

impl LazyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the facade under `name` instead of as the default.
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn lifetime(mut self, lifetime: ServiceLifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Configures the real registration. The facade is never mutated.
    pub fn mutator(mut self, mutator: impl RegistrationMutator + 'static) -> Self {
        self.mutator = Some(Arc::new(mutator));
        self
    }

    fn into_request(
        self,
        contract: ServiceType,
        implementation: LazyImplementation,
        proxies: Arc<dyn ProxyFactory>,
    ) -> LazyRegistrationRequest {
        LazyRegistrationRequest {
            contract,
            implementation,
            name: self.name,
            lifetime: self.lifetime,
            mutator: self.mutator,
            proxies,
        }
    }
}

impl fmt::Debug for LazyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyOptions")
            .field("name", &self.name)
            .field("lifetime", &self.lifetime)
            .field("mutator", &self.mutator.is_some())
            .finish()
    }
}

/// Registers services whose construction waits for first use.
///
/// Failures are recorded on the builder and reported by `build()`.
pub trait LazyRegistrationExt: Sized {
    /// Lazy registration of the contract `C`, built by `factory`.
    fn register_lazy<C: ?Sized + LazyContract>(
        self,
        factory: impl Fn(&dyn Resolver, &Parameters) -> Result<Arc<C>> + Send + Sync + 'static,
        options: LazyOptions,
    ) -> Self;

    /// Lazy registration with runtime types. Open generic implementations
    /// take the open generic path.
    fn register_lazy_type(
        self,
        contract: ServiceType,
        implementation: LazyImplementation,
        proxies: Arc<dyn ProxyFactory>,
        options: LazyOptions,
    ) -> Self;

    /// Lazy registration of an open generic contract. `proxies` needs a
    /// stand-in for every closed contract that will be resolved.
    fn register_generic_lazy(
        self,
        contract: ServiceType,
        implementation: GenericImplementation,
        proxies: ProxyRegistry,
        options: LazyOptions,
    ) -> Self;
}

impl LazyRegistrationExt for ContainerBuilder {
    fn register_lazy<C: ?Sized + LazyContract>(
        self,
        factory: impl Fn(&dyn Resolver, &Parameters) -> Result<Arc<C>> + Send + Sync + 'static,
        options: LazyOptions,
    ) -> Self {
        let contract = ServiceType::of::<C>();
        let implementation = LazyImplementation::factory(contract.clone(), factory);
        self.register_lazy_type(contract, implementation, Arc::new(StandInFactory::<C>::new()), options)
    }

    fn register_lazy_type(
        self,
        contract: ServiceType,
        implementation: LazyImplementation,
        proxies: Arc<dyn ProxyFactory>,
        options: LazyOptions,
    ) -> Self {
        let request = options.into_request(contract, implementation, proxies);
        self.configure(|builder| RegistrationPlanner::apply(builder, request).map(|_| ()))
    }

    fn register_generic_lazy(
        self,
        contract: ServiceType,
        implementation: GenericImplementation,
        proxies: ProxyRegistry,
        options: LazyOptions,
    ) -> Self {
        self.register_lazy_type(
            contract,
            LazyImplementation::Generic(implementation),
            Arc::new(proxies),
            options,
        )
    }
}

