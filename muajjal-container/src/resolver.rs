//! The resolution surface handed to activators and callers.

use std::any::type_name;
use std::sync::Arc;

use crate::error::{MuajjalError, Result};
use crate::instance::{Instance, Parameters};
use crate::key::DependencyKey;
use crate::scope::LifetimeScope;

/// Resolves dependencies by key.
///
/// Activators receive a `&dyn Resolver` bound to the scope that owns the
/// instance being built. Kept object safe; the typed helpers live on
/// [`ResolverApi`].
pub trait Resolver: Send + Sync {
    /// Resolves `key`, passing `parameters` to its activator.
    fn resolve_key(&self, key: &DependencyKey, parameters: &Parameters) -> Result<Instance>;

    /// The lifetime scope this resolver resolves in.
    fn lifetime_scope(&self) -> LifetimeScope;
}

/// Typed resolution helpers for every [`Resolver`].
///
/// ```
/// use std::sync::Arc;
/// use muajjal_container::prelude::*;
///
/// let container = Container::builder()
///     .singleton_value(String::from("postgres://localhost"))
///     .build()
///     .unwrap();
///
/// let url: Arc<String> = container.resolve().unwrap();
/// assert_eq!(url.as_str(), "postgres://localhost");
/// ```
pub trait ResolverApi {
    fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>>;

    fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>>;

    fn resolve_with<T: ?Sized + Send + Sync + 'static>(
        &self,
        parameters: &Parameters,
    ) -> Result<Arc<T>>;

    fn resolve_named_with<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
        parameters: &Parameters,
    ) -> Result<Arc<T>>;

    /// A typed override from `parameters` if present, else a resolve.
    ///
    /// Activators use this for constructor arguments that callers may
    /// replace at the resolve call.
    fn resolve_or_param<T: ?Sized + Send + Sync + 'static>(
        &self,
        parameters: &Parameters,
    ) -> Result<Arc<T>>;
}

impl<R: Resolver + ?Sized> ResolverApi for R {
    fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve_with(&Parameters::new())
    }

    fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.resolve_named_with(name, &Parameters::new())
    }

    fn resolve_with<T: ?Sized + Send + Sync + 'static>(
        &self,
        parameters: &Parameters,
    ) -> Result<Arc<T>> {
        let key = DependencyKey::of::<T>();
        let instance = self.resolve_key(&key, parameters)?;
        downcast_instance(&key, &instance)
    }

    fn resolve_named_with<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
        parameters: &Parameters,
    ) -> Result<Arc<T>> {
        let key = DependencyKey::named::<T>(name);
        let instance = self.resolve_key(&key, parameters)?;
        downcast_instance(&key, &instance)
    }

    fn resolve_or_param<T: ?Sized + Send + Sync + 'static>(
        &self,
        parameters: &Parameters,
    ) -> Result<Arc<T>> {
        match parameters.typed::<T>() {
            Some(value) => Ok(value),
            None => self.resolve(),
        }
    }
}

/// Downcasts a resolved instance, reporting a mismatch against `key`.
pub fn downcast_instance<T: ?Sized + Send + Sync + 'static>(
    key: &DependencyKey,
    instance: &Instance,
) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .ok_or_else(|| MuajjalError::type_mismatch(key, type_name::<T>(), instance.type_name()))
}
