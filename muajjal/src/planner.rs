//! Splitting a lazy registration into its real and facade registrations.
//!
//! ```text
//! LazyRegistrationRequest
//!        │ plan()
//!        ▼
//!   real:   (contract, #key)     ── implementation, mapped lifetime, mutator
//!   facade: (contract, name?)    ── stand-in over a thunk for the real key
//!   adapter (open generics only) ── serves closed requests from the facade
//! ```
//!
//! Planning validates the whole request before anything is added, so a
//! rejected request leaves the builder untouched.

use std::fmt;
use std::sync::Arc;

use muajjal_container::error::{
    AlreadyRegisteredError, InvalidGenericShapeError, MuajjalError, Result, UnsupportedContractError,
};
use muajjal_container::generic::GenericImplementation;
use muajjal_container::instance::{Instance, Parameters};
use muajjal_container::key::{DependencyKey, RegistrationKey};
use muajjal_container::lifetime::Lifetime;
use muajjal_container::provider::ComponentRegistry;
use muajjal_container::registration::{Activator, RegistrationBuilder};
use muajjal_container::resolver::Resolver;
use muajjal_container::types::ServiceType;
use tracing::{debug, instrument};

use crate::deferred::DeferredThunk;
use crate::lifetime::{LifetimePolicyMapper, ServiceLifetime};
use crate::naming::NameGenerator;
use crate::open_generic::OpenGenericAdapter;
use crate::proxy::ProxyFactory;

/// Configures the real registration of a lazy registration.
///
/// Never sees the facade, so hooks and metadata decorate the real
/// instance and not its stand-in.
pub trait RegistrationMutator: Send + Sync {
    fn mutate(&self, registration: RegistrationBuilder) -> RegistrationBuilder;
}

impl<F> RegistrationMutator for F
where
    F: Fn(RegistrationBuilder) -> RegistrationBuilder + Send + Sync,
{
    fn mutate(&self, registration: RegistrationBuilder) -> RegistrationBuilder {
        self(registration)
    }
}

/// What a lazy registration constructs.
#[derive(Clone)]
pub enum LazyImplementation {
    /// A closed implementation built by `activator`.
    Delegate {
        implementation: ServiceType,
        activator: Activator,
    },
    /// An open generic implementation and its closings.
    Generic(GenericImplementation),
}

impl LazyImplementation {
    /// A closed implementation from a typed factory.
    pub fn factory<T: ?Sized + Send + Sync + 'static>(
        implementation: ServiceType,
        factory: impl Fn(&dyn Resolver, &Parameters) -> Result<Arc<T>> + Send + Sync + 'static,
    ) -> Self {
        LazyImplementation::Delegate {
            implementation,
            activator: Arc::new(move |resolver: &dyn Resolver, parameters: &Parameters| {
                factory(resolver, parameters).map(Instance::new)
            }),
        }
    }

    pub fn implementation(&self) -> &ServiceType {
        match self {
            LazyImplementation::Delegate { implementation, .. } => implementation,
            LazyImplementation::Generic(generic) => generic.definition(),
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, LazyImplementation::Generic(_))
    }
}

impl fmt::Debug for LazyImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazyImplementation::Delegate { implementation, .. } => {
                f.debug_tuple("Delegate").field(implementation).finish()
            }
            LazyImplementation::Generic(generic) => f.debug_tuple("Generic").field(generic).finish(),
        }
    }
}

/// One lazy registration, as submitted.
#[derive(Clone)]
pub struct LazyRegistrationRequest {
    pub contract: ServiceType,
    pub implementation: LazyImplementation,
    pub name: Option<Arc<str>>,
    pub lifetime: ServiceLifetime,
    pub mutator: Option<Arc<dyn RegistrationMutator>>,
    pub proxies: Arc<dyn ProxyFactory>,
}

impl LazyRegistrationRequest {
    /// Key the facade is registered under.
    pub fn facade_key(&self) -> DependencyKey {
        match &self.name {
            Some(name) => DependencyKey::named_service(self.contract.clone(), name.clone()),
            None => DependencyKey::for_service(self.contract.clone()),
        }
    }
}

impl fmt::Debug for LazyRegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRegistrationRequest")
            .field("contract", &self.contract)
            .field("implementation", &self.implementation)
            .field("name", &self.name)
            .field("lifetime", &self.lifetime)
            .field("mutated", &self.mutator.is_some())
            .finish()
    }
}

/// The registrations one request turns into.
#[derive(Debug)]
pub struct PlannedRegistration {
    pub real: RegistrationBuilder,
    pub facade: RegistrationBuilder,
    /// Installed for open generic implementations only.
    pub adapter: Option<Arc<OpenGenericAdapter>>,
}

pub struct RegistrationPlanner;

impl RegistrationPlanner {
    /// Validates `request` and builds its registrations.
    ///
    /// # Errors
    /// - [`MuajjalError::UnsupportedContract`]: the contract is not an interface
    /// - [`MuajjalError::InvalidGenericShape`]: contract and implementation
    ///   disagree on genericity or arity
    #[instrument(skip_all, name = "lazy_plan", fields(contract = %request.contract))]
    pub fn plan(request: LazyRegistrationRequest) -> Result<PlannedRegistration> {
        Self::validate(&request)?;

        let key = NameGenerator::next_key();
        let lifetime = LifetimePolicyMapper::to_container_lifetime(request.lifetime);
        let facade_key = request.facade_key();

        let real = Self::real_registration(&request, key, &lifetime);
        let facade = RegistrationBuilder::delegate(
            facade_key.clone(),
            request.implementation.implementation().clone(),
            Self::facade_activator(&request, key),
        )
        .with_lifetime(lifetime.clone());

        let adapter = request
            .implementation
            .is_generic()
            .then(|| Arc::new(OpenGenericAdapter::new(facade_key.clone())));

        debug!(
            facade = %facade_key,
            real = %real.key(),
            lifetime = %lifetime,
            generic = adapter.is_some(),
            "Planned lazy registration"
        );

        Ok(PlannedRegistration { real, facade, adapter })
    }

    /// Plans `request` and adds its registrations to `registry`.
    ///
    /// Returns the facade key.
    ///
    /// # Errors
    /// Everything [`plan`](Self::plan) reports, plus
    /// [`MuajjalError::AlreadyRegistered`] when the facade key is taken and
    /// the registry does not allow overrides. Nothing is added on error.
    pub fn apply(registry: &mut dyn ComponentRegistry, request: LazyRegistrationRequest) -> Result<DependencyKey> {
        let facade_key = request.facade_key();
        if registry.contains(&facade_key) && !registry.allows_override() {
            return Err(MuajjalError::AlreadyRegistered(AlreadyRegisteredError { key: facade_key }));
        }

        let planned = Self::plan(request)?;
        registry.add_registration(planned.real)?;
        registry.add_registration(planned.facade)?;
        if let Some(adapter) = planned.adapter {
            if !registry.add_source(adapter) {
                debug!(facade = %facade_key, "Open generic adapter already installed");
            }
        }
        Ok(facade_key)
    }

    fn validate(request: &LazyRegistrationRequest) -> Result<()> {
        let contract = &request.contract;
        if !contract.is_interface() {
            return Err(MuajjalError::UnsupportedContract(UnsupportedContractError {
                contract: contract.clone(),
            }));
        }

        match &request.implementation {
            LazyImplementation::Generic(generic) => generic.check_shape(contract),
            LazyImplementation::Delegate { implementation, .. } => {
                if implementation.is_generic_definition() {
                    return Err(shape_error(
                        implementation,
                        "open generic implementations need closings, register a GenericImplementation",
                    ));
                }
                if contract.is_generic_definition() {
                    return Err(shape_error(
                        contract,
                        "an open generic contract needs an open generic implementation",
                    ));
                }
                Ok(())
            }
        }
    }

    fn real_registration(
        request: &LazyRegistrationRequest,
        key: RegistrationKey,
        lifetime: &Lifetime,
    ) -> RegistrationBuilder {
        let real_key = DependencyKey::keyed(request.contract.clone(), key);
        let real = match &request.implementation {
            LazyImplementation::Delegate { implementation, activator } => {
                RegistrationBuilder::delegate(real_key, implementation.clone(), activator.clone())
            }
            LazyImplementation::Generic(generic) => RegistrationBuilder::generic(real_key, generic.clone()),
        }
        .with_lifetime(lifetime.clone());

        match &request.mutator {
            Some(mutator) => mutator.mutate(real),
            None => real,
        }
    }

    fn facade_activator(request: &LazyRegistrationRequest, key: RegistrationKey) -> Activator {
        let contract = request.contract.clone();
        let proxies = request.proxies.clone();
        let generic = request.implementation.is_generic();
        let facade_key = request.facade_key();

        Arc::new(move |resolver: &dyn Resolver, parameters: &Parameters| {
            let service = if generic {
                closed_service(&facade_key, &contract, parameters)?
            } else {
                contract.clone()
            };

            let real_key = DependencyKey::keyed(service.clone(), key);
            let parameters = parameters.without_implicit();
            let scope = resolver.lifetime_scope();
            proxies.create_instance(&service, DeferredThunk::new(&scope, real_key, parameters))
        })
    }
}

/// The closed contract an open facade is being activated for.
fn closed_service(facade_key: &DependencyKey, contract: &ServiceType, parameters: &Parameters) -> Result<ServiceType> {
    let Some(service) = parameters.requested_service() else {
        return Err(MuajjalError::InvalidRequest {
            key: facade_key.clone(),
            reason: "open generic facade activated without a closed service type".into(),
        });
    };
    if service.generic_definition().as_ref() != Some(contract) {
        return Err(MuajjalError::InvalidRequest {
            key: facade_key.clone(),
            reason: format!("{service} does not close {contract}"),
        });
    }
    Ok(service.clone())
}

fn shape_error(service: &ServiceType, detail: &str) -> MuajjalError {
    MuajjalError::InvalidGenericShape(InvalidGenericShapeError {
        service: service.clone(),
        detail: detail.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyRegistry;
    use muajjal_container::container::Container;
    use muajjal_container::instance::Parameter;
    use muajjal_container::registration::Registration;
    use muajjal_container::source::RegistrationSource;
    use std::collections::HashSet;

    trait Repo<T>: Send + Sync {}
    struct MemoryRepo;
    impl<T> Repo<T> for MemoryRepo {}
    trait Clock: Send + Sync {}
    struct SystemClock;
    impl Clock for SystemClock {}

    fn closed_request() -> LazyRegistrationRequest {
        LazyRegistrationRequest {
            contract: ServiceType::of::<dyn Clock>(),
            implementation: LazyImplementation::factory::<dyn Clock>(ServiceType::of::<SystemClock>(), |_, _| {
                Ok(Arc::new(SystemClock) as Arc<dyn Clock>)
            }),
            name: None,
            lifetime: ServiceLifetime::SingleInstance,
            mutator: None,
            proxies: Arc::new(ProxyRegistry::new()),
        }
    }

    fn generic_request() -> LazyRegistrationRequest {
        let contract = ServiceType::definition_of::<dyn Repo<()>>().unwrap();
        let generic = GenericImplementation::new(ServiceType::open_class("MemoryRepo", 1))
            .closing::<dyn Repo<u8>>(|_, _| Ok(Arc::new(MemoryRepo) as Arc<dyn Repo<u8>>));
        LazyRegistrationRequest {
            contract,
            implementation: LazyImplementation::Generic(generic),
            ..closed_request()
        }
    }

    #[derive(Default)]
    struct RecordingRegistry {
        keys: HashSet<DependencyKey>,
        generic: usize,
        sources: usize,
    }

    impl ComponentRegistry for RecordingRegistry {
        fn contains(&self, key: &DependencyKey) -> bool {
            self.keys.contains(key)
        }

        fn allows_override(&self) -> bool {
            false
        }

        fn add_registration(&mut self, registration: RegistrationBuilder) -> Result<()> {
            if let Registration::OpenGeneric(_) = registration.clone().build() {
                self.generic += 1;
            }
            self.keys.insert(registration.key().clone());
            Ok(())
        }

        fn add_source(&mut self, _source: Arc<dyn RegistrationSource>) -> bool {
            self.sources += 1;
            true
        }
    }

    #[test]
    fn plan_splits_into_real_and_facade() {
        let planned = RegistrationPlanner::plan(closed_request()).unwrap();

        assert_eq!(planned.facade.key(), &DependencyKey::of::<dyn Clock>());
        assert!(planned.real.key().is_internal());
        assert_eq!(planned.real.key().service(), planned.facade.key().service());
        assert_eq!(planned.real.lifetime(), planned.facade.lifetime());
        assert_eq!(planned.real.implementation(), &ServiceType::of::<SystemClock>());
        assert!(planned.adapter.is_none());
    }

    #[test]
    fn every_plan_mints_a_new_key() {
        let a = RegistrationPlanner::plan(closed_request()).unwrap();
        let b = RegistrationPlanner::plan(closed_request()).unwrap();
        assert_ne!(a.real.key(), b.real.key());
    }

    #[test]
    fn named_facade() {
        let request = LazyRegistrationRequest {
            name: Some("utc".into()),
            ..closed_request()
        };
        let planned = RegistrationPlanner::plan(request).unwrap();
        assert_eq!(planned.facade.key().name(), Some("utc"));
        assert_eq!(planned.real.key().name(), None);
    }

    #[test]
    fn concrete_contract_is_rejected() {
        let request = LazyRegistrationRequest {
            contract: ServiceType::of::<SystemClock>(),
            ..closed_request()
        };
        let err = RegistrationPlanner::plan(request).unwrap_err();
        assert!(matches!(err, MuajjalError::UnsupportedContract(_)));
    }

    #[test]
    fn open_contract_with_closed_implementation_is_rejected() {
        let request = LazyRegistrationRequest {
            contract: ServiceType::definition_of::<dyn Repo<()>>().unwrap(),
            ..closed_request()
        };
        let err = RegistrationPlanner::plan(request).unwrap_err();
        assert!(matches!(err, MuajjalError::InvalidGenericShape(_)));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let request = LazyRegistrationRequest {
            implementation: LazyImplementation::Generic(GenericImplementation::new(ServiceType::open_class(
                "PairRepo", 2,
            ))),
            ..generic_request()
        };
        let err = RegistrationPlanner::plan(request).unwrap_err();
        assert!(matches!(err, MuajjalError::InvalidGenericShape(_)));
    }

    #[test]
    fn generic_plan_uses_native_open_generic_and_adapter() {
        let mut registry = RecordingRegistry::default();
        let facade = RegistrationPlanner::apply(&mut registry, generic_request()).unwrap();

        assert!(facade.service().is_generic_definition());
        assert_eq!(registry.keys.len(), 2);
        assert_eq!(registry.generic, 1);
        assert_eq!(registry.sources, 1);
    }

    #[test]
    fn taken_facade_key_adds_nothing() {
        let mut registry = RecordingRegistry::default();
        registry.keys.insert(DependencyKey::of::<dyn Clock>());

        let err = RegistrationPlanner::apply(&mut registry, closed_request()).unwrap_err();
        assert!(matches!(err, MuajjalError::AlreadyRegistered(_)));
        assert_eq!(registry.keys.len(), 1);
    }

    #[test]
    fn rejected_request_adds_nothing() {
        let mut registry = RecordingRegistry::default();
        let request = LazyRegistrationRequest {
            contract: ServiceType::of::<SystemClock>(),
            ..closed_request()
        };
        assert!(RegistrationPlanner::apply(&mut registry, request).is_err());
        assert!(registry.keys.is_empty());
    }

    #[test]
    fn mutator_only_touches_real() {
        let request = LazyRegistrationRequest {
            mutator: Some(Arc::new(|registration: RegistrationBuilder| {
                registration.with_metadata(String::from("decorated"))
            })),
            ..closed_request()
        };
        let planned = RegistrationPlanner::plan(request).unwrap();

        let Registration::Component(real) = planned.real.build() else {
            panic!("closed implementation should build a component");
        };
        let Registration::Component(facade) = planned.facade.build() else {
            panic!("facade should build a component");
        };
        assert_eq!(real.metadata::<String>().map(String::as_str), Some("decorated"));
        assert!(facade.metadata::<String>().is_none());
    }

    #[test]
    fn open_facade_needs_closed_service() {
        let planned = RegistrationPlanner::plan(generic_request()).unwrap();
        let Registration::Component(facade) = planned.facade.build() else {
            panic!("facade should build a component");
        };
        let container = Container::builder().build().unwrap();
        let scope = container.create_scope();

        let err = facade.activate(&scope, &Parameters::new()).unwrap_err();
        assert!(matches!(err, MuajjalError::InvalidRequest { .. }));

        let wrong = Parameters::new().with(Parameter::service_type(ServiceType::of::<dyn Clock>()));
        let err = facade.activate(&scope, &wrong).unwrap_err();
        assert!(matches!(err, MuajjalError::InvalidRequest { .. }));
    }
}
