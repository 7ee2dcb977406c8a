//! Dependency graph validation.
//!
//! Validates declared dependencies at build time:
//! - Detects circular dependencies
//! - Checks that all dependencies are registered
//! - Validates lifetime compatibility
//!
//! Only dependencies declared with `depends_on` are visible here. Factory
//! closures that resolve more than they declare are checked at resolve
//! time by the scope instead.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, warn};

use crate::error::{CircularDependencyError, MuajjalError, NotRegisteredError, ScopeMismatchError};
use crate::key::DependencyKey;
use crate::lifetime::Lifetime;

/// Information about a registered dependency needed for validation.
#[derive(Debug, Clone)]
pub(crate) struct DependencyInfo {
    /// What this registration produces
    pub key: DependencyKey,
    /// What it declares it needs
    pub dependencies: Vec<DependencyKey>,
    pub lifetime: Lifetime,
}

/// Validates the dependency graph for correctness.
///
/// # Algorithm
/// Depth-first search with a "visiting" set for cycle detection.
/// Closed generic dependencies served by a registered open definition are
/// treated as leaves, since the closing is only chosen at resolve time.
pub(crate) struct GraphValidator {
    dependencies: HashMap<DependencyKey, DependencyInfo>,
    /// Registered open generic definition keys
    definitions: HashSet<DependencyKey>,
    /// Sources may satisfy keys the catalogue does not know
    has_sources: bool,
    visiting: HashSet<DependencyKey>,
    validated: HashSet<DependencyKey>,
    path: Vec<DependencyKey>,
}

impl GraphValidator {
    pub fn new(
        dependencies: HashMap<DependencyKey, DependencyInfo>,
        definitions: HashSet<DependencyKey>,
        has_sources: bool,
    ) -> Self {
        Self {
            dependencies,
            definitions,
            has_sources,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Validates the entire dependency graph.
    ///
    /// # Errors
    /// - [`MuajjalError::CircularDependency`]: cycle detected
    /// - [`MuajjalError::NotRegistered`]: missing dependency
    /// - [`MuajjalError::ScopeMismatch`]: lifetime incompatibility
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<(), MuajjalError> {
        let keys: Vec<DependencyKey> = self.dependencies.keys().cloned().collect();

        debug!(dependency_count = keys.len(), "Starting dependency graph validation");

        for key in keys {
            if !self.validated.contains(&key) {
                self.validate_key(&key)?;
            }
        }

        debug!("Dependency graph validation passed ✓");
        Ok(())
    }

    fn validate_key(&mut self, key: &DependencyKey) -> Result<(), MuajjalError> {
        if self.validated.contains(key) {
            return Ok(());
        }

        if self.visiting.contains(key) {
            let cycle_start = self.path.iter().position(|k| k == key).unwrap_or(0);

            let mut chain: Vec<DependencyKey> = self.path[cycle_start..].to_vec();
            chain.push(key.clone());

            warn!(cycle = ?chain, "Circular dependency detected!");

            return Err(MuajjalError::CircularDependency(CircularDependencyError { chain }));
        }

        let Some(info) = self.dependencies.get(key).cloned() else {
            if self.served_by_definition(key) {
                self.validated.insert(key.clone());
                return Ok(());
            }
            if self.has_sources {
                warn!(key = %key, "Dependency not in catalogue, leaving it to registration sources");
                self.validated.insert(key.clone());
                return Ok(());
            }
            return Err(MuajjalError::NotRegistered(NotRegisteredError {
                requested: key.clone(),
                required_by: self.path.last().cloned(),
                suggestions: self.find_similar_keys(key),
            }));
        };

        self.visiting.insert(key.clone());
        self.path.push(key.clone());

        for dep_key in &info.dependencies {
            if let Some(dep_info) = self.dependencies.get(dep_key) {
                self.check_lifetime_compatibility(&info, dep_info)?;
            }
            self.validate_key(dep_key)?;
        }

        self.path.pop();
        self.visiting.remove(key);
        self.validated.insert(key.clone());

        Ok(())
    }

    fn served_by_definition(&self, key: &DependencyKey) -> bool {
        key.service().is_closed_generic()
            && key
                .service()
                .generic_definition()
                .is_some_and(|definition| self.definitions.contains(&key.with_service(definition)))
    }

    /// A dependency cannot have a shorter lifetime than its consumer.
    fn check_lifetime_compatibility(
        &self,
        consumer: &DependencyInfo,
        dependency: &DependencyInfo,
    ) -> Result<(), MuajjalError> {
        if consumer.lifetime.outlives(&dependency.lifetime) {
            warn!(
                consumer = %consumer.key,
                consumer_lifetime = %consumer.lifetime,
                dependency = %dependency.key,
                dependency_lifetime = %dependency.lifetime,
                "Scope mismatch detected"
            );

            return Err(MuajjalError::ScopeMismatch(ScopeMismatchError {
                consumer: consumer.key.clone(),
                consumer_lifetime: consumer.lifetime.clone(),
                dependency: dependency.key.clone(),
                dependency_lifetime: dependency.lifetime.clone(),
            }));
        }

        Ok(())
    }

    /// Registered public keys with similar names, for "did you mean?".
    fn find_similar_keys(&self, target: &DependencyKey) -> Vec<DependencyKey> {
        let candidates: Vec<&DependencyKey> =
            self.dependencies.keys().filter(|k| !k.is_internal()).collect();
        let names: Vec<String> = candidates.iter().map(|k| k.to_string()).collect();

        muajjal_support::rendering::suggest_similar(&target.to_string(), &names, 3)
            .into_iter()
            .filter_map(|index| candidates.get(index).map(|k| (*k).clone()))
            .collect()
    }
}
