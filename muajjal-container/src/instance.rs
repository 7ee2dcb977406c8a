//! Resolved values and resolve-time parameters.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::types::ServiceType;

/// A type-erased, shared, resolved value.
///
/// Wraps an `Arc<T>` so that both sized types and trait objects can be
/// stored and handed out again without copying.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Returns the stored `Arc<T>`, or `None` if the value is another type.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// Type name of the stored value, for diagnostics.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether two handles point at the same stored value.
    pub fn ptr_eq(a: &Instance, b: &Instance) -> bool {
        Arc::ptr_eq(&a.value, &b.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.type_name).finish()
    }
}

/// A value supplied at a specific resolve call.
#[derive(Clone)]
pub enum Parameter {
    /// Matched by name inside the activator.
    Named { name: Arc<str>, value: Instance },
    /// Overrides a dependency of the given service type.
    Typed { service: ServiceType, value: Instance },
    /// The closed service a generic factory is being asked for. Appended
    /// by registration sources, never by callers.
    ServiceType(ServiceType),
}

impl Parameter {
    /// A named parameter holding `value`.
    pub fn named<T: Send + Sync + 'static>(name: impl Into<Arc<str>>, value: T) -> Self {
        Parameter::Named {
            name: name.into(),
            value: Instance::new(Arc::new(value)),
        }
    }

    /// A typed override for the service `T`.
    pub fn typed<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Parameter::Typed {
            service: ServiceType::of::<T>(),
            value: Instance::new(value),
        }
    }

    /// The implicit closed-service parameter.
    pub fn service_type(service: ServiceType) -> Self {
        Parameter::ServiceType(service)
    }

    fn is_implicit(&self) -> bool {
        matches!(self, Parameter::ServiceType(_))
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Named { name, value } => write!(f, "Named({name:?}, {value:?})"),
            Parameter::Typed { service, value } => write!(f, "Typed({service}, {value:?})"),
            Parameter::ServiceType(service) => write!(f, "ServiceType({service})"),
        }
    }
}

/// Ordered parameters of one resolve call.
///
/// ```
/// use muajjal_container::instance::{Parameter, Parameters};
///
/// let parameters = Parameters::new().with(Parameter::named("retries", 3u32));
/// assert_eq!(*parameters.named::<u32>("retries").unwrap(), 3);
/// assert!(parameters.named::<u32>("timeout").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Parameters(Vec<Parameter>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with `parameter` appended.
    pub fn with(mut self, parameter: Parameter) -> Self {
        self.0.push(parameter);
        self
    }

    pub fn push(&mut self, parameter: Parameter) {
        self.0.push(parameter);
    }

    /// Last named parameter called `name` holding a `T`.
    pub fn named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.0.iter().rev().find_map(|p| match p {
            Parameter::Named { name: n, value } if &**n == name => value.downcast::<T>(),
            _ => None,
        })
    }

    /// Last typed override for the service `T`.
    pub fn typed<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let service = ServiceType::of::<T>();
        self.typed_instance(&service).and_then(|value| value.downcast::<T>())
    }

    /// Last typed override for a runtime service type.
    pub fn typed_instance(&self, service: &ServiceType) -> Option<&Instance> {
        self.0.iter().rev().find_map(|p| match p {
            Parameter::Typed { service: s, value } if s == service => Some(value),
            _ => None,
        })
    }

    /// The implicit closed service, if a generic factory is being activated.
    pub fn requested_service(&self) -> Option<&ServiceType> {
        self.0.iter().rev().find_map(|p| match p {
            Parameter::ServiceType(service) => Some(service),
            _ => None,
        })
    }

    /// The caller-supplied parameters only.
    pub fn without_implicit(&self) -> Parameters {
        Parameters(self.0.iter().filter(|p| !p.is_implicit()).cloned().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Parameter> for Parameters {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Parameters(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct Fixed(u64);
    impl Clock for Fixed {
        fn now(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn instance_round_trips_trait_objects() {
        let clock: Arc<dyn Clock> = Arc::new(Fixed(7));
        let instance = Instance::new(clock.clone());
        let back = instance.downcast::<dyn Clock>().unwrap();
        assert!(Arc::ptr_eq(&clock, &back));
        assert!(instance.downcast::<Fixed>().is_none());
    }

    #[test]
    fn instance_clones_share_value() {
        let a = Instance::new(Arc::new(5u8));
        let b = a.clone();
        assert!(Instance::ptr_eq(&a, &b));
        assert!(!Instance::ptr_eq(&a, &Instance::new(Arc::new(5u8))));
    }

    #[test]
    fn later_parameters_win() {
        let parameters = Parameters::new()
            .with(Parameter::named("mode", String::from("first")))
            .with(Parameter::named("mode", String::from("second")));
        assert_eq!(parameters.named::<String>("mode").unwrap().as_str(), "second");
    }

    #[test]
    fn typed_parameters_match_service() {
        let parameters = Parameters::new().with(Parameter::typed::<dyn Clock>(Arc::new(Fixed(42))));
        assert_eq!(parameters.typed::<dyn Clock>().unwrap().now(), 42);
        assert!(parameters.typed::<Fixed>().is_none());
    }

    #[test]
    fn implicit_parameters_are_stripped() {
        let service = ServiceType::of::<dyn Clock>();
        let parameters = Parameters::new()
            .with(Parameter::named("n", 1u8))
            .with(Parameter::service_type(service.clone()));
        assert_eq!(parameters.requested_service(), Some(&service));

        let caller = parameters.without_implicit();
        assert_eq!(caller.len(), 1);
        assert!(caller.requested_service().is_none());
    }
}
