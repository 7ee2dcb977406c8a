//! Core container implementation for Muajjal.
//!
//! A builder-configured catalogue of registrations, resolved through a
//! tree of lifetime scopes. Open generic registrations and registration
//! sources are the two extension points the lazy layer builds on.

pub mod container;
pub mod error;
pub mod generic;
mod graph;
pub mod instance;
pub mod key;
pub mod lifetime;
pub mod provider;
pub mod registration;
mod registry;
pub mod resolver;
pub mod scope;
pub mod source;
pub mod types;

pub use container::{Container, ContainerBuilder, ContainerOptions, prelude};
pub use error::{MuajjalError, Result};
pub use generic::{GenericImplementation, OpenGenericRegistration};
pub use instance::{Instance, Parameter, Parameters};
pub use key::{DependencyKey, RegistrationKey, ServiceTag};
pub use lifetime::{ComponentLifetime, InstanceOwnership, InstanceSharing, Lifetime};
pub use provider::{ComponentRegistry, Provider};
pub use registration::{Activator, ComponentRegistration, Registration, RegistrationBuilder};
pub use resolver::{Resolver, ResolverApi};
pub use scope::{LifetimeScope, WeakLifetimeScope};
pub use source::{RegistrationAccessor, RegistrationSource};
pub use types::{GenericShape, ServiceType, TypeKind};
