//! Provider trait: a module of related registrations.
//!
//! Providers group related registrations together so a container is
//! assembled from small, testable pieces.
//!
//! # Examples
//! ```rust,ignore
//! struct DatabaseProvider;
//!
//! impl Provider for DatabaseProvider {
//!     fn register(&self, registry: &mut dyn ComponentRegistry) -> Result<()> {
//!         registry.add_registration(
//!             RegistrationBuilder::factory(DependencyKey::of::<Database>(), |_, _| {
//!                 Ok(Arc::new(Database::connect("postgres://localhost")))
//!             })
//!             .with_lifetime(Lifetime::singleton()),
//!         )
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::key::DependencyKey;
use crate::registration::RegistrationBuilder;
use crate::source::RegistrationSource;

/// A module that registers related dependencies into a container.
pub trait Provider: Send + Sync {
    /// Register dependencies. Called once during container construction.
    ///
    /// # Errors
    /// Whatever the registry reports; the builder surfaces it from `build()`.
    fn register(&self, registry: &mut dyn ComponentRegistry) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// The registration surface of a container builder.
///
/// Providers and registration extensions work against this trait instead
/// of the concrete builder, which keeps them testable in isolation.
pub trait ComponentRegistry {
    /// Whether `key` already has a registration.
    fn contains(&self, key: &DependencyKey) -> bool;

    /// Whether a later registration may replace an earlier one.
    fn allows_override(&self) -> bool;

    /// Add a registration to the catalogue.
    ///
    /// # Errors
    /// [`MuajjalError::AlreadyRegistered`](crate::error::MuajjalError::AlreadyRegistered)
    /// on a key collision when overrides are not allowed.
    fn add_registration(&mut self, registration: RegistrationBuilder) -> Result<()>;

    /// Install a registration source. Returns `false` when a source with
    /// the same identity is already installed.
    fn add_source(&mut self, source: Arc<dyn RegistrationSource>) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MuajjalError;
    use crate::lifetime::Lifetime;
    use std::collections::HashSet;

    #[derive(Default)]
    struct MockRegistry {
        keys: HashSet<DependencyKey>,
        sources: usize,
    }

    impl ComponentRegistry for MockRegistry {
        fn contains(&self, key: &DependencyKey) -> bool {
            self.keys.contains(key)
        }

        fn allows_override(&self) -> bool {
            false
        }

        fn add_registration(&mut self, registration: RegistrationBuilder) -> Result<()> {
            let key = registration.key().clone();
            if !self.keys.insert(key.clone()) {
                return Err(MuajjalError::AlreadyRegistered(
                    crate::error::AlreadyRegisteredError { key },
                ));
            }
            Ok(())
        }

        fn add_source(&mut self, _source: Arc<dyn RegistrationSource>) -> bool {
            self.sources += 1;
            true
        }
    }

    struct TestProvider;

    impl Provider for TestProvider {
        fn register(&self, registry: &mut dyn ComponentRegistry) -> Result<()> {
            registry.add_registration(
                RegistrationBuilder::factory(DependencyKey::of::<String>(), |_, _| {
                    Ok(Arc::new(String::from("hello")))
                })
                .with_lifetime(Lifetime::singleton()),
            )?;
            registry.add_registration(RegistrationBuilder::factory(
                DependencyKey::of::<i32>(),
                |_, _| Ok(Arc::new(42i32)),
            ))
        }
    }

    #[test]
    fn provider_registers_dependencies() {
        let mut registry = MockRegistry::default();

        TestProvider.register(&mut registry).unwrap();

        assert_eq!(registry.keys.len(), 2);
        assert!(registry.contains(&DependencyKey::of::<String>()));
    }

    #[test]
    fn provider_errors_propagate() {
        let mut registry = MockRegistry::default();
        TestProvider.register(&mut registry).unwrap();

        let err = TestProvider.register(&mut registry).unwrap_err();
        assert!(matches!(err, MuajjalError::AlreadyRegistered(_)));
    }

    #[test]
    fn provider_has_name() {
        assert!(TestProvider.name().contains("TestProvider"));
    }
}
