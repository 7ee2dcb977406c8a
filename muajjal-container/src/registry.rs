//! Dependency registry: the catalogue a container is built from.
//!
//! The registry maps [`DependencyKey`]s to component registrations and
//! open generic definitions, and holds the installed registration
//! sources. It is populated by the builder and frozen by `build()`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{AlreadyRegisteredError, MuajjalError, Result};
use crate::generic::OpenGenericRegistration;
use crate::key::DependencyKey;
use crate::registration::{ComponentRegistration, Registration};
use crate::source::{RegistrationAccessor, RegistrationSource};

#[derive(Default)]
pub(crate) struct Registry {
    components: HashMap<DependencyKey, Arc<ComponentRegistration>>,
    open_generics: HashMap<DependencyKey, Arc<OpenGenericRegistration>>,
    sources: Vec<Arc<dyn RegistrationSource>>,
    source_ids: HashSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a finished registration.
    ///
    /// # Errors
    /// Returns [`MuajjalError::AlreadyRegistered`] if the key is
    /// already registered and `allow_override` is false.
    pub fn register(&mut self, registration: Registration, allow_override: bool) -> Result<()> {
        let key = registration.key().clone();

        if !allow_override && self.contains(&key) {
            return Err(MuajjalError::AlreadyRegistered(AlreadyRegisteredError { key }));
        }

        match registration {
            Registration::Component(component) => {
                debug!(key = %key, lifetime = %component.lifetime(), "Registered dependency");
                self.open_generics.remove(&key);
                self.components.insert(key, Arc::new(component));
            }
            Registration::OpenGeneric(open) => {
                debug!(key = %key, lifetime = %open.lifetime(), "Registered open generic");
                self.components.remove(&key);
                self.open_generics.insert(key, Arc::new(open));
            }
        }
        Ok(())
    }

    /// Installs a source. Returns `false` if one with the same identity
    /// is already installed.
    pub fn register_source(&mut self, source: Arc<dyn RegistrationSource>) -> bool {
        let identity = source.identity();
        if !self.source_ids.insert(identity.clone()) {
            trace!(identity = %identity, "Registration source already installed");
            return false;
        }
        debug!(identity = %identity, "Installed registration source");
        self.sources.push(source);
        true
    }

    pub fn contains(&self, key: &DependencyKey) -> bool {
        self.components.contains_key(key) || self.open_generics.contains_key(key)
    }

    pub fn component(&self, key: &DependencyKey) -> Option<&Arc<ComponentRegistration>> {
        self.components.get(key)
    }

    pub fn open_generic(&self, key: &DependencyKey) -> Option<&Arc<OpenGenericRegistration>> {
        self.open_generics.get(key)
    }

    pub fn components(&self) -> impl Iterator<Item = &Arc<ComponentRegistration>> {
        self.components.values()
    }

    pub fn open_generics(&self) -> impl Iterator<Item = &Arc<OpenGenericRegistration>> {
        self.open_generics.values()
    }

    pub fn sources(&self) -> &[Arc<dyn RegistrationSource>] {
        &self.sources
    }

    /// Returns the number of registered dependencies.
    pub fn len(&self) -> usize {
        self.components.len() + self.open_generics.len()
    }

    /// Every registered key, internal ones included.
    pub fn registered_keys(&self) -> Vec<DependencyKey> {
        self.components
            .keys()
            .chain(self.open_generics.keys())
            .cloned()
            .collect()
    }
}

impl RegistrationAccessor for Registry {
    fn registration(&self, key: &DependencyKey) -> Option<Arc<ComponentRegistration>> {
        self.components.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generic::GenericImplementation;
    use crate::registration::RegistrationBuilder;
    use crate::types::ServiceType;

    struct Database;
    trait Repo<T>: Send + Sync {}

    fn make_reg(key: DependencyKey) -> Registration {
        RegistrationBuilder::factory(key, |_, _| Ok(Arc::new(42i32))).build()
    }

    struct NamedSource(&'static str);

    impl RegistrationSource for NamedSource {
        fn registrations_for(
            &self,
            _requested: &DependencyKey,
            _accessor: &dyn RegistrationAccessor,
        ) -> Result<Vec<ComponentRegistration>> {
            Ok(Vec::new())
        }

        fn identity(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn register_and_get() {
        let mut reg = Registry::new();
        let key = DependencyKey::of::<Database>();
        reg.register(make_reg(key.clone()), false).unwrap();
        assert!(reg.component(&key).is_some());
        assert!(reg.registration(&key).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn duplicate_fails() {
        let mut reg = Registry::new();
        let key = DependencyKey::of::<Database>();
        reg.register(make_reg(key.clone()), false).unwrap();
        let err = reg.register(make_reg(key), false).unwrap_err();
        assert!(matches!(err, MuajjalError::AlreadyRegistered(_)));
    }

    #[test]
    fn duplicate_with_override_ok() {
        let mut reg = Registry::new();
        let key = DependencyKey::of::<Database>();
        reg.register(make_reg(key.clone()), false).unwrap();
        assert!(reg.register(make_reg(key), true).is_ok());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn open_generics_are_stored_apart() {
        let mut reg = Registry::new();
        let definition = ServiceType::definition_of::<dyn Repo<()>>().unwrap();
        let key = DependencyKey::for_service(definition.clone());
        reg.register(
            RegistrationBuilder::generic(key.clone(), GenericImplementation::new(definition)).build(),
            false,
        )
        .unwrap();

        assert!(reg.contains(&key));
        assert!(reg.open_generic(&key).is_some());
        assert!(reg.registration(&key).is_none());
    }

    #[test]
    fn sources_are_deduplicated_by_identity() {
        let mut reg = Registry::new();
        assert!(reg.register_source(Arc::new(NamedSource("a"))));
        assert!(!reg.register_source(Arc::new(NamedSource("a"))));
        assert!(reg.register_source(Arc::new(NamedSource("b"))));
        assert_eq!(reg.sources().len(), 2);
    }
}
