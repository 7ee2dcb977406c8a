//! Dependency identification keys.
//!
//! [`DependencyKey`] uniquely identifies a registration within the
//! container. It combines a [`ServiceType`] with a [`ServiceTag`]: the
//! default registration, a public name, or an internal
//! [`RegistrationKey`] handle that callers cannot spell.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use crate::types::ServiceType;

/// Opaque handle addressing an internal registration.
///
/// Handles are minted by the crate that owns the registration and are
/// never offered back to callers (not even as "did you mean?"
/// suggestions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationKey(NonZeroU64);

impl RegistrationKey {
    #[inline]
    pub fn from_raw(raw: NonZeroU64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Distinguishes registrations of the same service type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceTag {
    Default,
    Named(Arc<str>),
    Keyed(RegistrationKey),
}

/// Uniquely identifies a dependency in the container.
///
/// # Examples
/// ```
/// use muajjal_container::key::DependencyKey;
///
/// trait Mailer: Send + Sync {}
///
/// let key = DependencyKey::of::<dyn Mailer>();
/// assert_eq!(key.name(), None);
///
/// let primary = DependencyKey::named::<dyn Mailer>("primary");
/// let replica = DependencyKey::named::<dyn Mailer>("replica");
/// assert_ne!(primary, replica);
/// assert_ne!(primary, key);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DependencyKey {
    service: ServiceType,
    tag: ServiceTag,
}

impl DependencyKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::for_service(ServiceType::of::<T>())
    }

    /// Creates a named key for type `T`.
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: impl Into<Arc<str>>) -> Self {
        Self::named_service(ServiceType::of::<T>(), name)
    }

    /// Default key for a runtime service type.
    pub fn for_service(service: ServiceType) -> Self {
        Self { service, tag: ServiceTag::Default }
    }

    /// Named key for a runtime service type.
    pub fn named_service(service: ServiceType, name: impl Into<Arc<str>>) -> Self {
        Self { service, tag: ServiceTag::Named(name.into()) }
    }

    /// Internal key, addressable only through the handle.
    pub fn keyed(service: ServiceType, key: RegistrationKey) -> Self {
        Self { service, tag: ServiceTag::Keyed(key) }
    }

    /// Same tag, different service type.
    ///
    /// Used to move between a closed generic request and the open
    /// definition it was registered under.
    pub fn with_service(&self, service: ServiceType) -> Self {
        Self { service, tag: self.tag.clone() }
    }

    #[inline]
    pub fn service(&self) -> &ServiceType {
        &self.service
    }

    #[inline]
    pub fn tag(&self) -> &ServiceTag {
        &self.tag
    }

    /// Returns the public name for named bindings.
    pub fn name(&self) -> Option<&str> {
        match &self.tag {
            ServiceTag::Named(name) => Some(&**name),
            _ => None,
        }
    }

    /// Whether this key addresses an internal registration.
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(self.tag, ServiceTag::Keyed(_))
    }

    /// Human-readable service type, used in error messages.
    pub fn type_name(&self) -> String {
        self.service.to_string()
    }
}

impl fmt::Debug for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            ServiceTag::Default => write!(f, "DependencyKey({})", self.service),
            ServiceTag::Named(name) => write!(f, "DependencyKey({}, name={name:?})", self.service),
            ServiceTag::Keyed(key) => write!(f, "DependencyKey({}, internal {key})", self.service),
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            ServiceTag::Default => write!(f, "{}", self.service),
            ServiceTag::Named(name) => write!(f, "{} (name={name:?})", self.service),
            ServiceTag::Keyed(key) => write!(f, "{} (internal {key})", self.service),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MyStruct;
    trait Pipe<T>: Send + Sync {}

    fn internal(raw: u64) -> RegistrationKey {
        RegistrationKey::from_raw(NonZeroU64::new(raw).unwrap())
    }

    #[test]
    fn key_of_type() {
        let key = DependencyKey::of::<MyStruct>();
        assert!(key.type_name().contains("MyStruct"));
        assert_eq!(key.name(), None);
        assert!(!key.is_internal());
    }

    #[test]
    fn named_vs_unnamed_different() {
        assert_ne!(DependencyKey::named::<String>("a"), DependencyKey::of::<String>());
    }

    #[test]
    fn internal_keys_differ_by_handle() {
        let service = ServiceType::of::<MyStruct>();
        let a = DependencyKey::keyed(service.clone(), internal(1));
        let b = DependencyKey::keyed(service, internal(2));
        assert_ne!(a, b);
        assert!(a.is_internal());
        assert_eq!(a.name(), None);
    }

    #[test]
    fn with_service_keeps_tag() {
        let closed = DependencyKey::named::<dyn Pipe<u8>>("in");
        let definition = closed.service().generic_definition().unwrap();
        let open = closed.with_service(definition.clone());
        assert_eq!(open.name(), Some("in"));
        assert_eq!(open.service(), &definition);
    }

    #[test]
    fn key_in_hashmap() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(DependencyKey::of::<String>(), "string");
        map.insert(DependencyKey::of::<i32>(), "i32");
        assert_eq!(map.get(&DependencyKey::of::<String>()), Some(&"string"));
        assert_eq!(map.get(&DependencyKey::of::<bool>()), None);
    }

    #[test]
    fn display_marks_internal_keys() {
        let key = DependencyKey::keyed(ServiceType::of::<MyStruct>(), internal(7));
        assert!(key.to_string().contains("internal #7"));
    }
}
