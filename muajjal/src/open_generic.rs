//! Serving closed generic requests from an open generic facade.
//!
//! An open generic lazy registration puts its facade under the open
//! contract definition, where the container will not resolve it. The
//! [`OpenGenericAdapter`] bound to that facade answers requests for a
//! closed contract by synthesizing a registration that activates the
//! facade with the closed service type appended to the parameters.

use std::sync::Arc;

use muajjal_container::error::Result;
use muajjal_container::instance::{Parameter, Parameters};
use muajjal_container::key::DependencyKey;
use muajjal_container::registration::{Activator, ComponentRegistration};
use muajjal_container::resolver::Resolver;
use muajjal_container::source::{RegistrationAccessor, RegistrationSource};
use tracing::{debug, trace};

use crate::lifetime::LifetimePolicyMapper;

/// Registration source for one open generic facade.
///
/// Each lazy registration gets its own adapter, so two registrations of
/// the same open contract (say, two names) never serve each other's
/// requests.
#[derive(Debug, Clone)]
pub struct OpenGenericAdapter {
    facade: DependencyKey,
}

impl OpenGenericAdapter {
    /// An adapter serving closings of the facade registered under `facade`,
    /// an open definition key.
    pub fn new(facade: DependencyKey) -> Self {
        Self { facade }
    }

    pub fn facade(&self) -> &DependencyKey {
        &self.facade
    }
}

impl RegistrationSource for OpenGenericAdapter {
    fn registrations_for(
        &self,
        requested: &DependencyKey,
        accessor: &dyn RegistrationAccessor,
    ) -> Result<Vec<ComponentRegistration>> {
        let service = requested.service();
        if !service.is_closed_generic() {
            return Ok(Vec::new());
        }
        let Some(definition) = service.generic_definition() else {
            return Ok(Vec::new());
        };
        if requested.with_service(definition) != self.facade {
            return Ok(Vec::new());
        }
        let Some(factory) = accessor.registration(&self.facade) else {
            trace!(facade = %self.facade, "Open generic facade is not in the catalogue");
            return Ok(Vec::new());
        };

        let lifetime = LifetimePolicyMapper::adapt(factory.lifetime())?;
        let closed = service.clone();
        let source = factory.clone();
        let activator: Activator = Arc::new(move |resolver: &dyn Resolver, parameters: &Parameters| {
            let parameters = parameters.clone().with(Parameter::service_type(closed.clone()));
            source.activate(resolver, &parameters)
        });

        debug!(
            facade = %self.facade,
            requested = %requested,
            lifetime = %lifetime,
            "Adapted open generic facade"
        );
        Ok(vec![factory.derive(requested.clone(), activator, lifetime)])
    }

    fn identity(&self) -> String {
        format!("lazy-open-generic:{:?}", self.facade)
    }

    fn name(&self) -> &str {
        "OpenGenericAdapter"
    }
}
