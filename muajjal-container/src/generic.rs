//! Native open generic registrations.
//!
//! Rust cannot instantiate a generic type from a runtime type argument,
//! so an open generic implementation is an explicit table of closings:
//! one activator per tuple of type arguments, keyed by the arguments of
//! the closed contract it serves. Requests for a closed service are
//! matched against the table by erasing the service to its definition.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anymap2::SendSyncAnyMap;
use tracing::debug;

use crate::error::{InvalidGenericShapeError, MuajjalError, Result};
use crate::instance::{Instance, Parameters};
use crate::key::DependencyKey;
use crate::lifetime::Lifetime;
use crate::registration::{
    ActivatedHandler, ActivatingHandler, Activator, ClosedParts, ComponentRegistration,
};
use crate::resolver::Resolver;
use crate::types::ServiceType;

/// One closing of an open generic implementation.
#[derive(Clone)]
pub struct Closing {
    contract: ServiceType,
    activator: Activator,
}

impl Closing {
    /// The closed contract this closing was registered for.
    pub fn contract(&self) -> &ServiceType {
        &self.contract
    }

    pub fn activator(&self) -> &Activator {
        &self.activator
    }
}

/// An open generic implementation: its definition plus its closings.
///
/// ```
/// use std::sync::Arc;
/// use muajjal_container::generic::GenericImplementation;
/// use muajjal_container::types::ServiceType;
///
/// trait Repo<T>: Send + Sync {}
/// struct MemoryRepo<T>(Vec<T>);
/// impl<T: Send + Sync> Repo<T> for MemoryRepo<T> {}
///
/// let definition = ServiceType::definition_of::<MemoryRepo<()>>().unwrap();
/// let generic = GenericImplementation::new(definition)
///     .closing::<dyn Repo<u8>>(|_, _| Ok(Arc::new(MemoryRepo::<u8>(Vec::new())) as Arc<dyn Repo<u8>>));
///
/// assert_eq!(generic.arity(), 1);
/// assert!(generic.closing_for(&[ServiceType::of::<u8>()]).is_some());
/// assert!(generic.closing_for(&[ServiceType::of::<u16>()]).is_none());
/// ```
#[derive(Clone)]
pub struct GenericImplementation {
    definition: ServiceType,
    closings: HashMap<Vec<ServiceType>, Closing>,
}

impl GenericImplementation {
    pub fn new(definition: ServiceType) -> Self {
        Self {
            definition,
            closings: HashMap::new(),
        }
    }

    /// Adds the closing for the closed contract `C`.
    ///
    /// Keyed by the type arguments of `C`; a later closing for the same
    /// arguments replaces an earlier one.
    pub fn closing<C: ?Sized + Send + Sync + 'static>(
        self,
        factory: impl Fn(&dyn Resolver, &Parameters) -> Result<Arc<C>> + Send + Sync + 'static,
    ) -> Self {
        let activator: Activator =
            Arc::new(move |resolver: &dyn Resolver, parameters: &Parameters| {
                factory(resolver, parameters).map(Instance::new)
            });
        self.closing_activator(ServiceType::of::<C>(), activator)
    }

    /// Adds a closing for a runtime contract type.
    pub fn closing_activator(mut self, contract: ServiceType, activator: Activator) -> Self {
        let arguments = contract.generic_arguments().to_vec();
        self.closings.insert(arguments, Closing { contract, activator });
        self
    }

    #[inline]
    pub fn definition(&self) -> &ServiceType {
        &self.definition
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.definition.arity()
    }

    pub fn closing_for(&self, arguments: &[ServiceType]) -> Option<&Closing> {
        self.closings.get(arguments)
    }

    pub fn activator_for(&self, arguments: &[ServiceType]) -> Option<Activator> {
        self.closing_for(arguments).map(|c| c.activator.clone())
    }

    pub fn closings(&self) -> impl Iterator<Item = &Closing> {
        self.closings.values()
    }

    /// Checks every closing against `contract`, an open definition.
    ///
    /// # Errors
    /// [`MuajjalError::InvalidGenericShape`] when the definition and the
    /// contract differ in arity, or a closing closes another definition.
    pub fn check_shape(&self, contract: &ServiceType) -> Result<()> {
        if !self.definition.is_generic_definition() {
            return Err(shape_error(&self.definition, "implementation is not an open generic definition"));
        }
        if !contract.is_generic_definition() {
            return Err(shape_error(contract, "an open generic implementation needs an open generic contract"));
        }
        if contract.arity() != self.arity() {
            return Err(shape_error(
                contract,
                format!(
                    "contract has {} type parameters, implementation {} has {}",
                    contract.arity(),
                    self.definition,
                    self.arity()
                ),
            ));
        }
        for closing in self.closings() {
            if closing.contract.generic_definition().as_ref() != Some(contract) {
                return Err(shape_error(
                    &closing.contract,
                    format!("closing does not close {contract}"),
                ));
            }
        }
        Ok(())
    }
}

fn shape_error(service: &ServiceType, detail: impl Into<String>) -> MuajjalError {
    MuajjalError::InvalidGenericShape(InvalidGenericShapeError {
        service: service.clone(),
        detail: detail.into(),
    })
}

impl fmt::Debug for GenericImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericImplementation")
            .field("definition", &self.definition)
            .field("closings", &self.closings.len())
            .finish()
    }
}

/// An open generic registration in the catalogue, keyed by a definition.
pub struct OpenGenericRegistration {
    key: DependencyKey,
    generic: GenericImplementation,
    lifetime: Lifetime,
    activating: Vec<ActivatingHandler>,
    activated: Vec<ActivatedHandler>,
    metadata: Arc<SendSyncAnyMap>,
    dependencies: Vec<DependencyKey>,
}

impl OpenGenericRegistration {
    pub(crate) fn new(
        key: DependencyKey,
        generic: GenericImplementation,
        lifetime: Lifetime,
        activating: Vec<ActivatingHandler>,
        activated: Vec<ActivatedHandler>,
        metadata: Arc<SendSyncAnyMap>,
        dependencies: Vec<DependencyKey>,
    ) -> Self {
        Self {
            key,
            generic,
            lifetime,
            activating,
            activated,
            metadata,
            dependencies,
        }
    }

    pub fn key(&self) -> &DependencyKey {
        &self.key
    }

    pub fn generic(&self) -> &GenericImplementation {
        &self.generic
    }

    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    pub fn dependencies(&self) -> &[DependencyKey] {
        &self.dependencies
    }

    /// Builds the closed registration serving `requested`.
    ///
    /// The closed registration keeps this registration's lifetime, hooks
    /// and metadata.
    ///
    /// # Errors
    /// [`MuajjalError::MissingClosing`] when no closing matches the type
    /// arguments of `requested`.
    pub fn close(&self, requested: &DependencyKey) -> Result<ComponentRegistration> {
        let arguments = requested.service().generic_arguments();
        let closing = self.generic.closing_for(arguments).ok_or_else(|| {
            MuajjalError::MissingClosing {
                definition: self.key.service().clone(),
                arguments: arguments.to_vec(),
            }
        })?;
        let implementation = self.generic.definition().close(arguments.to_vec())?;

        debug!(
            definition = %self.key,
            requested = %requested,
            implementation = %implementation,
            "Closed open generic registration"
        );

        Ok(ComponentRegistration::from(ClosedParts {
            key: requested.clone(),
            implementation,
            activator: closing.activator.clone(),
            lifetime: self.lifetime.clone(),
            activating: self.activating.clone(),
            activated: self.activated.clone(),
            metadata: self.metadata.clone(),
        }))
    }
}

impl fmt::Debug for OpenGenericRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenGenericRegistration")
            .field("key", &self.key)
            .field("generic", &self.generic)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Pair<A, B>: Send + Sync {
        fn describe(&self) -> String;
    }

    struct PairImpl<A, B>(std::marker::PhantomData<fn() -> (A, B)>);

    impl<A: 'static, B: 'static> Pair<A, B> for PairImpl<A, B> {
        fn describe(&self) -> String {
            format!("{}/{}", std::any::type_name::<A>(), std::any::type_name::<B>())
        }
    }

    fn pair<A: 'static, B: 'static>() -> Arc<dyn Pair<A, B>> {
        Arc::new(PairImpl::<A, B>(std::marker::PhantomData))
    }

    fn contract() -> ServiceType {
        ServiceType::definition_of::<dyn Pair<(), ()>>().unwrap()
    }

    fn implementation() -> GenericImplementation {
        GenericImplementation::new(ServiceType::definition_of::<PairImpl<(), ()>>().unwrap())
            .closing::<dyn Pair<u8, u16>>(|_, _| Ok(pair::<u8, u16>()))
            .closing::<dyn Pair<String, u8>>(|_, _| Ok(pair::<String, u8>()))
    }

    #[test]
    fn closings_are_keyed_by_contract_arguments() {
        let generic = implementation();
        let closing = generic
            .closing_for(&[ServiceType::of::<u8>(), ServiceType::of::<u16>()])
            .unwrap();
        assert_eq!(closing.contract(), &ServiceType::of::<dyn Pair<u8, u16>>());
        assert!(generic.activator_for(&[ServiceType::of::<u16>(), ServiceType::of::<u8>()]).is_none());
    }

    #[test]
    fn shape_matches_contract() {
        assert!(implementation().check_shape(&contract()).is_ok());
    }

    #[test]
    fn shape_rejects_arity_mismatch() {
        trait Single<T>: Send + Sync {}
        let single = ServiceType::definition_of::<dyn Single<()>>().unwrap();
        let err = implementation().check_shape(&single).unwrap_err();
        assert!(matches!(err, MuajjalError::InvalidGenericShape(_)));
    }

    #[test]
    fn shape_rejects_closed_contract() {
        let closed = ServiceType::of::<dyn Pair<u8, u16>>();
        assert!(implementation().check_shape(&closed).is_err());
    }

    #[test]
    fn shape_rejects_foreign_closing() {
        trait Other<A, B>: Send + Sync {}
        struct OtherImpl;
        impl<A, B> Other<A, B> for OtherImpl {}

        let generic = implementation()
            .closing::<dyn Other<u8, u8>>(|_, _| Ok(Arc::new(OtherImpl) as Arc<dyn Other<u8, u8>>));
        assert!(generic.check_shape(&contract()).is_err());
    }

    #[test]
    fn close_builds_closed_registration() {
        let key = DependencyKey::for_service(contract());
        let registration = OpenGenericRegistration::new(
            key,
            implementation(),
            Lifetime::scoped(),
            Vec::new(),
            Vec::new(),
            Arc::new(SendSyncAnyMap::new()),
            Vec::new(),
        );

        let requested = DependencyKey::of::<dyn Pair<String, u8>>();
        let closed = registration.close(&requested).unwrap();
        assert_eq!(closed.key(), &requested);
        assert_eq!(closed.lifetime(), &Lifetime::scoped());
        assert_eq!(closed.implementation(), &ServiceType::of::<PairImpl<String, u8>>());

        let missing = registration.close(&DependencyKey::of::<dyn Pair<u32, u32>>()).unwrap_err();
        assert!(matches!(missing, MuajjalError::MissingClosing { .. }));
    }
}
