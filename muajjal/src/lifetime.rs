//! Lifetime intents and their container lifetimes.
//!
//! A lazy registration states its lifetime as a [`ServiceLifetime`]
//! intent. The real and the facade registration both get the container
//! lifetime it maps to, so the stand-in is cached exactly like the
//! instance it stands in for.

use muajjal_container::error::{MuajjalError, Result, UnsupportedLifetimeError};
use muajjal_container::lifetime::{ComponentLifetime, InstanceSharing, Lifetime};
use serde::Deserialize;

/// Lifetime intent of a lazy registration.
///
/// Deserialises from its variant name, so intents can come from
/// configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[repr(u8)]
pub enum ServiceLifetime {
    /// Treated as [`ServiceLifetime::InstancePerDependency`].
    Unknown = 0,
    /// One instance for the root container.
    SingleInstance = 1,
    /// One instance per lifetime scope.
    InstancePerLifetimeScope = 2,
    /// A new instance for every resolution.
    #[default]
    InstancePerDependency = 3,
}

impl ServiceLifetime {
    pub fn from_repr(value: u8) -> Option<Self> {
        match value {
            0 => Some(ServiceLifetime::Unknown),
            1 => Some(ServiceLifetime::SingleInstance),
            2 => Some(ServiceLifetime::InstancePerLifetimeScope),
            3 => Some(ServiceLifetime::InstancePerDependency),
            _ => None,
        }
    }
}

/// Translates between lifetime intents and container lifetimes.
pub struct LifetimePolicyMapper;

impl LifetimePolicyMapper {
    pub fn to_container_lifetime(intent: ServiceLifetime) -> Lifetime {
        match intent {
            ServiceLifetime::Unknown | ServiceLifetime::InstancePerDependency => {
                Lifetime::transient()
            }
            ServiceLifetime::SingleInstance => Lifetime::singleton(),
            ServiceLifetime::InstancePerLifetimeScope => Lifetime::scoped(),
        }
    }

    /// The intent equivalent to a container lifetime.
    ///
    /// # Errors
    /// [`MuajjalError::UnsupportedLifetime`] for scope-tag matching
    /// lifetimes, which no intent describes.
    pub fn from_container_lifetime(lifetime: &Lifetime) -> Result<ServiceLifetime> {
        match (&lifetime.component, lifetime.sharing) {
            (ComponentLifetime::RootScope, _) => Ok(ServiceLifetime::SingleInstance),
            (ComponentLifetime::CurrentScope, InstanceSharing::Shared) => {
                Ok(ServiceLifetime::InstancePerLifetimeScope)
            }
            (ComponentLifetime::CurrentScope, InstanceSharing::None) => {
                Ok(ServiceLifetime::InstancePerDependency)
            }
            (ComponentLifetime::MatchingScope(_), _) => {
                Err(MuajjalError::UnsupportedLifetime(UnsupportedLifetimeError {
                    lifetime: lifetime.clone(),
                }))
            }
        }
    }

    /// Re-derives `lifetime` through its intent, keeping its sharing and
    /// ownership.
    ///
    /// # Errors
    /// As [`from_container_lifetime`](Self::from_container_lifetime).
    pub fn adapt(lifetime: &Lifetime) -> Result<Lifetime> {
        let intent = Self::from_container_lifetime(lifetime)?;
        Ok(Lifetime {
            component: Self::to_container_lifetime(intent).component,
            sharing: lifetime.sharing,
            ownership: lifetime.ownership,
        })
    }
}
