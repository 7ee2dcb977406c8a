//! Error types for Muajjal container operations.
//!
//! Every failure carries the keys involved and, where there is an
//! obvious fix, a hint. Internal registration handles are printed as
//! `#n` and never offered as suggestions.

use std::fmt;

use muajjal_support::rendering::render_chain;

use crate::key::DependencyKey;
use crate::lifetime::Lifetime;
use crate::types::ServiceType;

/// Main error type for all Muajjal operations.
#[derive(Debug, thiserror::Error)]
pub enum MuajjalError {
    /// Requested dependency was never registered.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),

    /// Circular dependency detected during validation or resolve.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A longer-lived component declared a shorter-lived dependency.
    #[error("{}", .0)]
    ScopeMismatch(ScopeMismatchError),

    /// Activator returned an error, or produced a value of the wrong type.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: DependencyKey,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Dependency was already registered (when override is disabled).
    #[error("{}", .0)]
    AlreadyRegistered(AlreadyRegisteredError),

    /// No enclosing lifetime scope carries the tag a component is bound to.
    #[error("No lifetime scope tagged {tag:?} encloses the request for {key}")]
    NoMatchingScope { key: DependencyKey, tag: String },

    /// An open generic registration has no closing for the requested arguments.
    #[error("{definition} has no closing for <{}>", render_arguments(.arguments))]
    MissingClosing {
        definition: ServiceType,
        arguments: Vec<ServiceType>,
    },

    /// The request itself is malformed, e.g. an open definition was resolved.
    #[error("Invalid request for {key}: {reason}")]
    InvalidRequest { key: DependencyKey, reason: String },

    /// A deferred value was realised after its lifetime scope was dropped.
    #[error("Lifetime scope resolving {key} has been dropped")]
    ScopeDisposed { key: DependencyKey },

    /// Lazy contracts must be interfaces.
    #[error("{}", .0)]
    UnsupportedContract(UnsupportedContractError),

    /// Contract and implementation disagree on generic shape.
    #[error("{}", .0)]
    InvalidGenericShape(InvalidGenericShapeError),

    /// A lifetime kind that cannot be mapped to a lifetime intent.
    #[error("{}", .0)]
    UnsupportedLifetime(UnsupportedLifetimeError),
}

fn render_arguments(arguments: &[ServiceType]) -> String {
    arguments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl MuajjalError {
    /// Wraps a type mismatch between a resolved value and the requested type.
    pub fn type_mismatch(key: &DependencyKey, expected: &str, found: &str) -> Self {
        MuajjalError::ConstructionFailed {
            key: key.clone(),
            source: format!("type mismatch: expected {expected}, found {found}").into(),
        }
    }

    /// `true` for failures caused by configuration rather than resolution.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MuajjalError::AlreadyRegistered(_)
                | MuajjalError::ScopeMismatch(_)
                | MuajjalError::UnsupportedContract(_)
                | MuajjalError::InvalidGenericShape(_)
                | MuajjalError::UnsupportedLifetime(_)
        )
    }
}

/// Error when a dependency was not registered.
///
/// Includes helpful hints about what went wrong.
#[derive(Debug)]
pub struct NotRegisteredError {
    /// The dependency that was requested
    pub requested: DependencyKey,
    /// What required this dependency (if known)
    pub required_by: Option<DependencyKey>,
    /// Similar public keys that ARE registered
    pub suggestions: Vec<DependencyKey>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dependency not registered: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        match self.requested.name() {
            Some(name) => write!(
                f,
                "\n  Hint: Register {} under the name {name:?}",
                self.requested.type_name()
            ),
            None => write!(
                f,
                "\n  Hint: Did you forget to register {}?",
                self.requested.type_name()
            ),
        }
    }
}

/// Error when a circular dependency is detected.
///
/// Shows the full dependency chain so you can see WHERE the cycle is.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Example: `[A, B, C, A]`
    pub chain: Vec<DependencyKey>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.chain.iter().map(ToString::to_string).collect();
        write!(f, "Circular dependency detected:\n  {}", render_chain(&names))?;
        write!(
            f,
            "\n  Hint: Register one side with register_lazy, or restructure the dependencies"
        )
    }
}

/// Error when lifetime rules are violated.
#[derive(Debug)]
pub struct ScopeMismatchError {
    /// The dependency being injected
    pub dependency: DependencyKey,
    pub dependency_lifetime: Lifetime,
    /// Where it's being injected
    pub consumer: DependencyKey,
    pub consumer_lifetime: Lifetime,
}

impl fmt::Display for ScopeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scope mismatch: cannot inject {} ({}) into {} ({})",
            self.dependency, self.dependency_lifetime, self.consumer, self.consumer_lifetime,
        )?;
        write!(
            f,
            "\n  Hint: Give {} a lifetime at least as long as {}",
            self.dependency, self.consumer_lifetime,
        )
    }
}

/// Error when trying to register a dependency that already exists.
#[derive(Debug)]
pub struct AlreadyRegisteredError {
    pub key: DependencyKey,
}

impl fmt::Display for AlreadyRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dependency already registered: {}", self.key)?;
        write!(
            f,
            "\n  Hint: Use a distinct name, or enable allow_override on the builder"
        )
    }
}

/// Error when a lazy contract is a concrete type.
#[derive(Debug)]
pub struct UnsupportedContractError {
    pub contract: ServiceType,
}

impl fmt::Display for UnsupportedContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lazy contract must be an interface, got {}", self.contract)?;
        write!(f, "\n  Hint: Register against the trait object, e.g. `dyn Service`")
    }
}

/// Error when generic definitions and closings do not line up.
#[derive(Debug)]
pub struct InvalidGenericShapeError {
    pub service: ServiceType,
    pub detail: String,
}

impl fmt::Display for InvalidGenericShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid generic shape for {}: {}", self.service, self.detail)
    }
}

/// Error when a lifetime cannot be expressed as a lifetime intent.
#[derive(Debug)]
pub struct UnsupportedLifetimeError {
    pub lifetime: Lifetime,
}

impl fmt::Display for UnsupportedLifetimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported lifetime: {}", self.lifetime)?;
        write!(
            f,
            "\n  Hint: Only current-scope and root-scope lifetimes can be adapted"
        )
    }
}

/// Convenient Result type for Muajjal operations.
pub type Result<T> = std::result::Result<T, MuajjalError>;
