//! Stand-in factories.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use muajjal_container::error::{MuajjalError, Result};
use muajjal_container::instance::Instance;
use muajjal_container::types::ServiceType;

use crate::deferred::{Deferred, DeferredThunk, LazyContract};

/// Builds the stand-in returned when a lazy facade is resolved.
pub trait ProxyFactory: Send + Sync {
    /// A stand-in for `contract` that realises through `thunk`.
    ///
    /// Must not invoke the thunk.
    fn create_instance(&self, contract: &ServiceType, thunk: DeferredThunk) -> Result<Instance>;
}

/// The [`ProxyFactory`] of a single [`LazyContract`].
pub struct StandInFactory<C: ?Sized>(PhantomData<fn() -> Box<C>>);

impl<C: ?Sized + LazyContract> StandInFactory<C> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<C: ?Sized + LazyContract> Default for StandInFactory<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized + LazyContract> ProxyFactory for StandInFactory<C> {
    fn create_instance(&self, contract: &ServiceType, thunk: DeferredThunk) -> Result<Instance> {
        if *contract != ServiceType::of::<C>() {
            return Err(MuajjalError::ConstructionFailed {
                key: thunk.key().clone(),
                source: format!("stand-in for {} cannot serve {contract}", ServiceType::of::<C>()).into(),
            });
        }
        Ok(Instance::new(C::stand_in(Deferred::new(thunk))))
    }
}

/// Stand-in factories keyed by closed contract.
///
/// Open generic lazy registrations produce a different closed contract
/// per request, so they need one entry per closing.
///
/// ```rust,ignore
/// let proxies = ProxyRegistry::new()
///     .with::<dyn Repo<User>>()
///     .with::<dyn Repo<Order>>();
/// ```
#[derive(Clone, Default)]
pub struct ProxyRegistry {
    factories: HashMap<ServiceType, Arc<dyn ProxyFactory>>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the stand-in of `C`.
    pub fn with<C: ?Sized + LazyContract>(self) -> Self {
        self.with_factory(ServiceType::of::<C>(), Arc::new(StandInFactory::<C>::new()))
    }

    /// Adds a factory for a runtime contract.
    pub fn with_factory(mut self, contract: ServiceType, factory: Arc<dyn ProxyFactory>) -> Self {
        self.factories.insert(contract, factory);
        self
    }

    pub fn contains(&self, contract: &ServiceType) -> bool {
        self.factories.contains_key(contract)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl ProxyFactory for ProxyRegistry {
    fn create_instance(&self, contract: &ServiceType, thunk: DeferredThunk) -> Result<Instance> {
        match self.factories.get(contract) {
            Some(factory) => factory.create_instance(contract, thunk),
            None => Err(MuajjalError::ConstructionFailed {
                key: thunk.key().clone(),
                source: format!("no stand-in registered for {contract}").into(),
            }),
        }
    }
}

impl fmt::Debug for ProxyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRegistry")
            .field("contracts", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muajjal_container::container::Container;
    use muajjal_container::instance::Parameters;
    use muajjal_container::key::DependencyKey;

    trait Greeter: Send + Sync {
        fn greet(&self) -> Result<String>;
    }

    struct GreeterStandIn(Deferred<dyn Greeter>);

    impl Greeter for GreeterStandIn {
        fn greet(&self) -> Result<String> {
            self.0.get()?.greet()
        }
    }

    impl LazyContract for dyn Greeter {
        fn stand_in(deferred: Deferred<Self>) -> Arc<Self> {
            Arc::new(GreeterStandIn(deferred))
        }
    }

    struct Hello;

    impl Greeter for Hello {
        fn greet(&self) -> Result<String> {
            Ok("hello".into())
        }
    }

    fn thunk(container: &Container) -> DeferredThunk {
        DeferredThunk::new(
            container.root_scope(),
            DependencyKey::of::<dyn Greeter>(),
            Parameters::new(),
        )
    }

    fn container() -> Container {
        Container::builder()
            .transient_with::<dyn Greeter>(|_| Ok(Arc::new(Hello) as Arc<dyn Greeter>))
            .build()
            .unwrap()
    }

    #[test]
    fn stand_in_delegates_to_real() {
        let container = container();
        let instance = StandInFactory::<dyn Greeter>::new()
            .create_instance(&ServiceType::of::<dyn Greeter>(), thunk(&container))
            .unwrap();

        let greeter = instance.downcast::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet().unwrap(), "hello");
    }

    #[test]
    fn stand_in_rejects_other_contracts() {
        let container = container();
        let err = StandInFactory::<dyn Greeter>::new()
            .create_instance(&ServiceType::of::<String>(), thunk(&container))
            .unwrap_err();
        assert!(matches!(err, MuajjalError::ConstructionFailed { .. }));
    }

    #[test]
    fn registry_dispatches_by_contract() {
        let container = container();
        let proxies = ProxyRegistry::new().with::<dyn Greeter>();
        assert!(proxies.contains(&ServiceType::of::<dyn Greeter>()));

        let instance = proxies
            .create_instance(&ServiceType::of::<dyn Greeter>(), thunk(&container))
            .unwrap();
        assert!(instance.downcast::<dyn Greeter>().is_some());

        let missing = ProxyRegistry::new().create_instance(&ServiceType::of::<dyn Greeter>(), thunk(&container));
        assert!(missing.is_err());
    }
}
