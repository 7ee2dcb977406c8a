//! Runtime service type identities.
//!
//! [`ServiceType`] is what the container keys registrations by. Rust
//! types are mapped through [`ServiceType::of`]; open generic
//! definitions, which have no Rust type of their own, are either built
//! by name or erased from a closed Rust type.
//!
//! ```
//! use muajjal_container::types::{ServiceType, TypeKind};
//!
//! trait Repo<T>: Send + Sync {}
//!
//! let closed = ServiceType::of::<dyn Repo<u8>>();
//! assert_eq!(closed.kind(), TypeKind::Interface);
//! assert!(closed.is_closed_generic());
//!
//! let definition = ServiceType::definition_of::<dyn Repo<()>>().unwrap();
//! assert_eq!(closed.generic_definition(), Some(definition.clone()));
//! assert_eq!(definition.close(vec![ServiceType::of::<u8>()]).unwrap(), closed);
//! ```

use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use muajjal_support::rendering::{render_definition, render_generic, shorten_type_name};
use muajjal_support::type_name::split_generic;
use once_cell::sync::Lazy;

use crate::error::{InvalidGenericShapeError, MuajjalError, Result};

static TYPE_CACHE: Lazy<DashMap<TypeId, ServiceType>> = Lazy::new(DashMap::new);

/// Whether a service type is a contract or a concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A trait object (`dyn Trait`). Only interfaces may be lazy contracts.
    Interface,
    /// Any other type.
    Class,
}

/// Generic structure of a [`ServiceType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericShape {
    NonGeneric,
    /// An open definition with `arity` unbound parameters.
    Definition { arity: usize },
    /// A definition with every parameter bound.
    Closed {
        definition: ServiceType,
        arguments: Vec<ServiceType>,
    },
}

#[derive(PartialEq, Eq, Hash)]
struct TypeInfo {
    name: Arc<str>,
    kind: TypeKind,
    shape: GenericShape,
    trailer: Option<Arc<str>>,
}

/// Identity of a service or implementation type.
///
/// Cheap to clone. Two service types are equal when their names, kinds
/// and generic shapes are equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServiceType(Arc<TypeInfo>);

impl ServiceType {
    /// Service type of the Rust type `T`.
    ///
    /// `dyn Trait` maps to an interface, generic types map to closed
    /// generics of their erased definition.
    pub fn of<T: ?Sized + 'static>() -> Self {
        TYPE_CACHE
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Self::parse(type_name::<T>()))
            .clone()
    }

    /// The open definition of the generic Rust type `T`.
    ///
    /// The type arguments of `T` are discarded, so placeholders such as
    /// `()` are fine: `definition_of::<dyn Repo<()>>()`.
    ///
    /// # Errors
    /// [`MuajjalError::InvalidGenericShape`] when `T` is not generic.
    pub fn definition_of<T: ?Sized + 'static>() -> Result<Self> {
        let ty = Self::of::<T>();
        ty.generic_definition().ok_or_else(|| {
            MuajjalError::InvalidGenericShape(InvalidGenericShapeError {
                service: ty.clone(),
                detail: "type has no generic arguments to erase".into(),
            })
        })
    }

    /// A non-generic interface identified by name.
    pub fn interface(name: impl Into<Arc<str>>) -> Self {
        Self::new(name.into(), TypeKind::Interface, GenericShape::NonGeneric, None)
    }

    /// A non-generic concrete type identified by name.
    pub fn class(name: impl Into<Arc<str>>) -> Self {
        Self::new(name.into(), TypeKind::Class, GenericShape::NonGeneric, None)
    }

    /// An open generic interface definition.
    pub fn open_interface(name: impl Into<Arc<str>>, arity: usize) -> Self {
        Self::new(name.into(), TypeKind::Interface, Self::definition_shape(arity), None)
    }

    /// An open generic class definition.
    pub fn open_class(name: impl Into<Arc<str>>, arity: usize) -> Self {
        Self::new(name.into(), TypeKind::Class, Self::definition_shape(arity), None)
    }

    fn definition_shape(arity: usize) -> GenericShape {
        if arity == 0 {
            GenericShape::NonGeneric
        } else {
            GenericShape::Definition { arity }
        }
    }

    fn new(name: Arc<str>, kind: TypeKind, shape: GenericShape, trailer: Option<Arc<str>>) -> Self {
        Self(Arc::new(TypeInfo { name, kind, shape, trailer }))
    }

    fn parse(full: &str) -> Self {
        let kind = if full.starts_with("dyn ") {
            TypeKind::Interface
        } else {
            TypeKind::Class
        };

        let Some(parts) = split_generic(full) else {
            return Self::new(full.into(), kind, GenericShape::NonGeneric, None);
        };

        let name: Arc<str> = parts.base.into();
        let trailer: Option<Arc<str>> = (!parts.trailer.is_empty()).then(|| parts.trailer.into());
        let arguments: Vec<ServiceType> = parts.arguments.iter().map(|a| Self::parse(a)).collect();
        let definition = Self::new(
            name.clone(),
            kind,
            GenericShape::Definition { arity: arguments.len() },
            trailer.clone(),
        );
        Self::new(name, kind, GenericShape::Closed { definition, arguments }, trailer)
    }

    /// Base name, without type arguments.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Display name with paths stripped, for log fields.
    pub fn short_name(&self) -> String {
        shorten_type_name(&self.to_string())
    }

    pub fn kind(&self) -> TypeKind {
        self.0.kind
    }

    #[inline]
    pub fn is_interface(&self) -> bool {
        self.0.kind == TypeKind::Interface
    }

    pub fn shape(&self) -> &GenericShape {
        &self.0.shape
    }

    #[inline]
    pub fn is_generic_definition(&self) -> bool {
        matches!(self.0.shape, GenericShape::Definition { .. })
    }

    #[inline]
    pub fn is_closed_generic(&self) -> bool {
        matches!(self.0.shape, GenericShape::Closed { .. })
    }

    /// Number of type parameters (bound or not); `0` for non-generic types.
    pub fn arity(&self) -> usize {
        match &self.0.shape {
            GenericShape::NonGeneric => 0,
            GenericShape::Definition { arity } => *arity,
            GenericShape::Closed { arguments, .. } => arguments.len(),
        }
    }

    /// The open definition of a generic type (itself for a definition).
    pub fn generic_definition(&self) -> Option<ServiceType> {
        match &self.0.shape {
            GenericShape::NonGeneric => None,
            GenericShape::Definition { .. } => Some(self.clone()),
            GenericShape::Closed { definition, .. } => Some(definition.clone()),
        }
    }

    /// Bound type arguments; empty unless closed.
    pub fn generic_arguments(&self) -> &[ServiceType] {
        match &self.0.shape {
            GenericShape::Closed { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// Binds every parameter of this definition.
    ///
    /// # Errors
    /// [`MuajjalError::InvalidGenericShape`] if `self` is not a definition
    /// or the argument count differs from its arity.
    pub fn close(&self, arguments: Vec<ServiceType>) -> Result<ServiceType> {
        let GenericShape::Definition { arity } = self.0.shape else {
            return Err(MuajjalError::InvalidGenericShape(InvalidGenericShapeError {
                service: self.clone(),
                detail: "only open generic definitions can be closed".into(),
            }));
        };
        if arguments.len() != arity {
            return Err(MuajjalError::InvalidGenericShape(InvalidGenericShapeError {
                service: self.clone(),
                detail: format!("expected {arity} type arguments, got {}", arguments.len()),
            }));
        }
        Ok(Self::new(
            self.0.name.clone(),
            self.0.kind,
            GenericShape::Closed { definition: self.clone(), arguments },
            self.0.trailer.clone(),
        ))
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = match &self.0.shape {
            GenericShape::NonGeneric => self.0.name.to_string(),
            GenericShape::Definition { arity } => render_definition(&self.0.name, *arity),
            GenericShape::Closed { arguments, .. } => {
                let arguments: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                render_generic(&self.0.name, &arguments[..])
            }
        };
        match &self.0.trailer {
            Some(trailer) => write!(f, "{rendered} {trailer}"),
            None => f.write_str(&rendered),
        }
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceType({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Store: Send + Sync {}
    trait Repo<A, B>: Send + Sync {}
    struct Plain;
    struct Holder<T>(T);

    #[test]
    fn trait_objects_are_interfaces() {
        assert_eq!(ServiceType::of::<dyn Store>().kind(), TypeKind::Interface);
        assert_eq!(ServiceType::of::<Plain>().kind(), TypeKind::Class);
    }

    #[test]
    fn same_type_same_identity() {
        assert_eq!(ServiceType::of::<dyn Store>(), ServiceType::of::<dyn Store>());
        assert_ne!(ServiceType::of::<dyn Store>(), ServiceType::of::<Plain>());
    }

    #[test]
    fn closed_generic_erases_to_definition() {
        let closed = ServiceType::of::<dyn Repo<u8, String>>();
        assert!(closed.is_closed_generic());
        assert_eq!(closed.arity(), 2);
        assert_eq!(closed.generic_arguments()[0], ServiceType::of::<u8>());

        let definition = closed.generic_definition().unwrap();
        assert!(definition.is_generic_definition());
        assert!(definition.is_interface());
        assert_eq!(definition, ServiceType::definition_of::<dyn Repo<(), ()>>().unwrap());
    }

    #[test]
    fn closing_a_definition_matches_the_rust_type() {
        let definition = ServiceType::definition_of::<Holder<()>>().unwrap();
        let closed = definition.close(vec![ServiceType::of::<u32>()]).unwrap();
        assert_eq!(closed, ServiceType::of::<Holder<u32>>());
    }

    #[test]
    fn close_rejects_wrong_arity() {
        let definition = ServiceType::definition_of::<dyn Repo<(), ()>>().unwrap();
        let err = definition.close(vec![ServiceType::of::<u8>()]).unwrap_err();
        assert!(matches!(err, MuajjalError::InvalidGenericShape(_)));
    }

    #[test]
    fn close_rejects_non_definitions() {
        let err = ServiceType::of::<Plain>().close(vec![]).unwrap_err();
        assert!(matches!(err, MuajjalError::InvalidGenericShape(_)));
    }

    #[test]
    fn definition_of_non_generic_fails() {
        assert!(ServiceType::definition_of::<Plain>().is_err());
    }

    #[test]
    fn named_definitions_render_placeholders() {
        let definition = ServiceType::open_interface("IGenericService", 3);
        assert_eq!(definition.to_string(), "IGenericService<_, _, _>");
        assert_eq!(definition.arity(), 3);

        let closed = definition
            .close(vec![ServiceType::class("A"), ServiceType::class("B"), ServiceType::class("C")])
            .unwrap();
        assert_eq!(closed.to_string(), "IGenericService<A, B, C>");
    }

    #[test]
    fn zero_arity_definition_is_not_generic() {
        assert!(!ServiceType::open_class("Thing", 0).is_generic_definition());
    }

    #[test]
    fn short_name_strips_paths() {
        assert!(ServiceType::of::<dyn Store>().short_name().ends_with("dyn Store"));
    }
}
