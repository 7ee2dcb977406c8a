//! Component lifetimes.
//!
//! A [`Lifetime`] answers three questions about a registration:
//! - which scope owns its instances ([`ComponentLifetime`])
//! - whether the owner caches one instance ([`InstanceSharing`])
//! - whether the owner keeps instances alive ([`InstanceOwnership`])
//!
//! The usual combinations have constructors:
//!
//! ```
//! use muajjal_container::lifetime::{ComponentLifetime, InstanceSharing, Lifetime};
//!
//! assert_eq!(Lifetime::singleton().component, ComponentLifetime::RootScope);
//! assert_eq!(Lifetime::scoped().sharing, InstanceSharing::Shared);
//! assert!(!Lifetime::transient().is_cached());
//! assert!(Lifetime::singleton().outlives(&Lifetime::scoped()));
//! ```

use std::fmt;
use std::sync::Arc;

/// Which scope in the tree owns an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentLifetime {
    /// The scope the request was made in.
    CurrentScope,
    /// The root scope of the container.
    RootScope,
    /// The nearest enclosing scope created with this tag.
    MatchingScope(Arc<str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceSharing {
    /// A new instance per resolution.
    None,
    /// One instance per owning scope.
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceOwnership {
    /// The owning scope holds the instance until it is dropped.
    OwnedByLifetimeScope,
    /// The caller holds the only reference.
    ExternallyOwned,
}

/// Lifetime of a registration's instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lifetime {
    pub component: ComponentLifetime,
    pub sharing: InstanceSharing,
    pub ownership: InstanceOwnership,
}

impl Lifetime {
    /// New instance on every resolve, not retained by the container.
    pub fn transient() -> Self {
        Self {
            component: ComponentLifetime::CurrentScope,
            sharing: InstanceSharing::None,
            ownership: InstanceOwnership::ExternallyOwned,
        }
    }

    /// One instance per lifetime scope.
    pub fn scoped() -> Self {
        Self {
            component: ComponentLifetime::CurrentScope,
            sharing: InstanceSharing::Shared,
            ownership: InstanceOwnership::OwnedByLifetimeScope,
        }
    }

    /// One instance for the whole container, shared by every scope.
    pub fn singleton() -> Self {
        Self {
            component: ComponentLifetime::RootScope,
            sharing: InstanceSharing::Shared,
            ownership: InstanceOwnership::OwnedByLifetimeScope,
        }
    }

    /// One instance per scope tagged `tag`.
    pub fn matching_scope(tag: impl Into<Arc<str>>) -> Self {
        Self {
            component: ComponentLifetime::MatchingScope(tag.into()),
            sharing: InstanceSharing::Shared,
            ownership: InstanceOwnership::OwnedByLifetimeScope,
        }
    }

    #[inline]
    pub fn is_cached(&self) -> bool {
        self.sharing == InstanceSharing::Shared
    }

    #[inline]
    pub fn is_owned_by_scope(&self) -> bool {
        self.ownership == InstanceOwnership::OwnedByLifetimeScope
    }

    /// Higher lives longer.
    fn rank(&self) -> u8 {
        match (&self.component, self.sharing) {
            (_, InstanceSharing::None) => 0,
            (ComponentLifetime::RootScope, InstanceSharing::Shared) => 2,
            (_, InstanceSharing::Shared) => 1,
        }
    }

    /// Whether instances with this lifetime can outlive ones with `other`.
    pub fn outlives(&self, other: &Lifetime) -> bool {
        self.rank() > other.rank()
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::transient()
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component {
            ComponentLifetime::CurrentScope => write!(f, "current scope")?,
            ComponentLifetime::RootScope => write!(f, "root scope")?,
            ComponentLifetime::MatchingScope(tag) => write!(f, "scope tagged {tag:?}")?,
        }
        match self.sharing {
            InstanceSharing::Shared => write!(f, ", shared"),
            InstanceSharing::None => write!(f, ", per dependency"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_ordering() {
        assert!(Lifetime::singleton().outlives(&Lifetime::scoped()));
        assert!(Lifetime::scoped().outlives(&Lifetime::transient()));
        assert!(!Lifetime::transient().outlives(&Lifetime::singleton()));
        assert!(!Lifetime::scoped().outlives(&Lifetime::matching_scope("request")));
    }

    #[test]
    fn lifetime_is_cached() {
        assert!(Lifetime::singleton().is_cached());
        assert!(Lifetime::scoped().is_cached());
        assert!(!Lifetime::transient().is_cached());
    }

    #[test]
    fn transient_is_externally_owned() {
        assert!(!Lifetime::transient().is_owned_by_scope());
        assert_eq!(Lifetime::default(), Lifetime::transient());
    }

    #[test]
    fn lifetime_display() {
        assert_eq!(Lifetime::singleton().to_string(), "root scope, shared");
        assert_eq!(Lifetime::transient().to_string(), "current scope, per dependency");
        assert_eq!(
            Lifetime::matching_scope("request").to_string(),
            "scope tagged \"request\", shared"
        );
    }
}
