//! Registration sources: registrations synthesized on demand.
//!
//! When a request is not satisfied by the catalogue, the scope asks every
//! installed [`RegistrationSource`] for candidates. The container caches
//! what a source returns per requested key, so a source is consulted at
//! most once per key for the life of the container.

use std::sync::Arc;

use crate::error::Result;
use crate::key::DependencyKey;
use crate::registration::ComponentRegistration;

/// Read-only view of the catalogue handed to sources.
pub trait RegistrationAccessor {
    /// The component registered under exactly `key`, if any.
    fn registration(&self, key: &DependencyKey) -> Option<Arc<ComponentRegistration>>;
}

/// Synthesizes registrations for otherwise unsatisfied requests.
pub trait RegistrationSource: Send + Sync {
    /// Candidates for `requested`. Empty when the source does not apply.
    ///
    /// Returned registrations must be keyed by `requested`.
    fn registrations_for(
        &self,
        requested: &DependencyKey,
        accessor: &dyn RegistrationAccessor,
    ) -> Result<Vec<ComponentRegistration>>;

    /// Installing two sources with the same identity keeps only the first.
    fn identity(&self) -> String {
        self.name().to_string()
    }

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
