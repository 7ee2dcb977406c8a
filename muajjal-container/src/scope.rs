//! Lifetime scopes: the runtime side of the container.
//!
//! Scopes form a tree rooted at the container. Each scope caches the
//! shared instances it owns and keeps scope-owned instances alive until
//! it is dropped. Registrations come from one catalogue shared by the
//! whole tree.
//!
//! # Resolution
//! ```text
//! request ──> catalogue ──> synthesized cache ──> open generic closing
//!                                                  ──> registration sources
//!                                                  ──> NotRegistered
//! ```
//! A shared instance is built inside a per-scope `OnceCell`, so concurrent
//! first requests construct it once. No lock is held while an activator
//! runs, and re-entering an activation on the same thread is reported as
//! a circular dependency instead of deadlocking.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use muajjal_support::rendering::suggest_similar;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{CircularDependencyError, MuajjalError, NotRegisteredError, Result};
use crate::instance::{Instance, Parameters};
use crate::key::DependencyKey;
use crate::lifetime::ComponentLifetime;
use crate::registration::{ComponentId, ComponentRegistration};
use crate::registry::Registry;
use crate::resolver::Resolver;

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVATIONS: RefCell<Vec<DependencyKey>> = const { RefCell::new(Vec::new()) };
}

/// Marks a key as being activated on this thread.
struct ActivationGuard;

impl ActivationGuard {
    fn enter(key: &DependencyKey) -> Result<Self> {
        ACTIVATIONS.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack.iter().position(|k| k == key) {
                let mut chain = stack[start..].to_vec();
                chain.push(key.clone());
                warn!(cycle = ?chain, "Circular dependency detected!");
                return Err(MuajjalError::CircularDependency(CircularDependencyError { chain }));
            }
            stack.push(key.clone());
            Ok(ActivationGuard)
        })
    }
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        ACTIVATIONS.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

struct RootState {
    registry: Registry,
    synthesized: DashMap<DependencyKey, Arc<ComponentRegistration>>,
}

struct ScopeInner {
    id: u64,
    tag: Option<Arc<str>>,
    parent: Option<LifetimeScope>,
    root: Arc<RootState>,
    shared: DashMap<ComponentId, Arc<OnceCell<Instance>>>,
    owned: Mutex<Vec<Instance>>,
}

/// A node in the scope tree. Cheap to clone; clones are the same scope.
#[derive(Clone)]
pub struct LifetimeScope {
    inner: Arc<ScopeInner>,
}

/// A non-owning handle to a [`LifetimeScope`].
#[derive(Clone)]
pub struct WeakLifetimeScope {
    inner: Weak<ScopeInner>,
}

impl WeakLifetimeScope {
    /// The scope, if it is still alive.
    pub fn upgrade(&self) -> Option<LifetimeScope> {
        self.inner.upgrade().map(|inner| LifetimeScope { inner })
    }
}

impl fmt::Debug for WeakLifetimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakLifetimeScope")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl LifetimeScope {
    pub(crate) fn new_root(registry: Registry) -> Self {
        let root = Arc::new(RootState {
            registry,
            synthesized: DashMap::new(),
        });
        Self::new_scope(root, None, None)
    }

    fn new_scope(root: Arc<RootState>, parent: Option<LifetimeScope>, tag: Option<Arc<str>>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE.fetch_add(1, Ordering::Relaxed),
                tag,
                parent,
                root,
                shared: DashMap::new(),
                owned: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creates a child scope.
    pub fn create_scope(&self) -> LifetimeScope {
        let child = Self::new_scope(self.inner.root.clone(), Some(self.clone()), None);
        debug!(parent = self.inner.id, scope = child.inner.id, "Created lifetime scope");
        child
    }

    /// Creates a child scope that components bound to `tag` share.
    pub fn create_tagged_scope(&self, tag: impl Into<Arc<str>>) -> LifetimeScope {
        let tag = tag.into();
        let child = Self::new_scope(self.inner.root.clone(), Some(self.clone()), Some(tag.clone()));
        debug!(parent = self.inner.id, scope = child.inner.id, tag = %tag, "Created tagged lifetime scope");
        child
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn tag(&self) -> Option<&str> {
        self.inner.tag.as_deref()
    }

    pub fn parent(&self) -> Option<&LifetimeScope> {
        self.inner.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// This scope followed by its ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = LifetimeScope> {
        std::iter::successors(Some(self.clone()), |scope| scope.inner.parent.clone())
    }

    /// The root scope of the tree.
    pub fn root(&self) -> LifetimeScope {
        self.ancestors().last().unwrap_or_else(|| self.clone())
    }

    pub fn downgrade(&self) -> WeakLifetimeScope {
        WeakLifetimeScope {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same scope.
    pub fn same_scope(a: &LifetimeScope, b: &LifetimeScope) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Number of non-shared instances this scope keeps alive.
    pub fn tracked_instances(&self) -> usize {
        self.inner.owned.lock().len()
    }

    /// Whether `key` can be resolved, synthesizing a registration if needed.
    pub fn is_registered(&self, key: &DependencyKey) -> bool {
        matches!(self.registration_for(key), Ok(Some(_)))
    }

    pub(crate) fn registration_count(&self) -> usize {
        self.inner.root.registry.len()
    }

    /// Finds the registration serving `key`.
    pub(crate) fn registration_for(
        &self,
        key: &DependencyKey,
    ) -> Result<Option<Arc<ComponentRegistration>>> {
        if key.service().is_generic_definition() {
            return Err(MuajjalError::InvalidRequest {
                key: key.clone(),
                reason: "open generic definitions cannot be resolved, request a closed type".into(),
            });
        }

        let root = &self.inner.root;
        if let Some(registration) = root.registry.component(key) {
            return Ok(Some(registration.clone()));
        }
        if let Some(registration) = root.synthesized.get(key) {
            return Ok(Some(registration.value().clone()));
        }

        let Some(candidate) = self.synthesize(key)? else {
            return Ok(None);
        };
        let registration = root
            .synthesized
            .entry(key.clone())
            .or_insert(Arc::new(candidate))
            .value()
            .clone();
        Ok(Some(registration))
    }

    fn synthesize(&self, key: &DependencyKey) -> Result<Option<ComponentRegistration>> {
        let registry = &self.inner.root.registry;

        if key.service().is_closed_generic() {
            if let Some(definition) = key.service().generic_definition() {
                if let Some(open) = registry.open_generic(&key.with_service(definition)) {
                    return open.close(key).map(Some);
                }
            }
        }

        let mut chosen = None;
        for source in registry.sources() {
            for candidate in source.registrations_for(key, registry)? {
                debug!(
                    source = source.name(),
                    key = %candidate.key(),
                    lifetime = %candidate.lifetime(),
                    "Synthesized registration"
                );
                chosen = Some(candidate);
            }
        }
        Ok(chosen)
    }

    fn resolve_in(
        &self,
        key: &DependencyKey,
        parameters: &Parameters,
        required_by: Option<&DependencyKey>,
    ) -> Result<Instance> {
        trace!(key = %key, scope = self.inner.id, "Resolving");

        let registration = self
            .registration_for(key)?
            .ok_or_else(|| self.not_registered(key, required_by))?;

        let _guard = ActivationGuard::enter(key)?;
        let owner = self.owner_for(&registration)?;

        if registration.lifetime().is_cached() {
            let cell = owner
                .inner
                .shared
                .entry(registration.id())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value()
                .clone();
            let instance = cell.get_or_try_init(|| owner.activate(&registration, parameters))?;
            return Ok(instance.clone());
        }

        let instance = owner.activate(&registration, parameters)?;
        if registration.lifetime().is_owned_by_scope() {
            owner.inner.owned.lock().push(instance.clone());
        }
        Ok(instance)
    }

    fn owner_for(&self, registration: &ComponentRegistration) -> Result<LifetimeScope> {
        match &registration.lifetime().component {
            ComponentLifetime::CurrentScope => Ok(self.clone()),
            ComponentLifetime::RootScope => Ok(self.root()),
            ComponentLifetime::MatchingScope(tag) => self
                .ancestors()
                .find(|scope| scope.tag() == Some(&**tag))
                .ok_or_else(|| MuajjalError::NoMatchingScope {
                    key: registration.key().clone(),
                    tag: tag.to_string(),
                }),
        }
    }

    fn activate(&self, registration: &ComponentRegistration, parameters: &Parameters) -> Result<Instance> {
        let context = ActivationContext {
            scope: self,
            consumer: registration.key(),
        };
        registration.activate(&context, parameters)
    }

    fn not_registered(&self, key: &DependencyKey, required_by: Option<&DependencyKey>) -> MuajjalError {
        let candidates: Vec<DependencyKey> = self
            .inner
            .root
            .registry
            .registered_keys()
            .into_iter()
            .filter(|k| !k.is_internal())
            .collect();
        let names: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        let suggestions = suggest_similar(&key.to_string(), &names, 3)
            .into_iter()
            .filter_map(|index| candidates.get(index).cloned())
            .collect();

        MuajjalError::NotRegistered(NotRegisteredError {
            requested: key.clone(),
            required_by: required_by.cloned(),
            suggestions,
        })
    }
}

impl Resolver for LifetimeScope {
    fn resolve_key(&self, key: &DependencyKey, parameters: &Parameters) -> Result<Instance> {
        self.resolve_in(key, parameters, None)
    }

    fn lifetime_scope(&self) -> LifetimeScope {
        self.clone()
    }
}

impl fmt::Debug for LifetimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeScope")
            .field("id", &self.inner.id)
            .field("tag", &self.inner.tag)
            .field("root", &self.is_root())
            .finish()
    }
}

/// The resolver an activator receives: the owning scope plus the key
/// being activated, so missing dependencies report who needed them.
struct ActivationContext<'a> {
    scope: &'a LifetimeScope,
    consumer: &'a DependencyKey,
}

impl Resolver for ActivationContext<'_> {
    fn resolve_key(&self, key: &DependencyKey, parameters: &Parameters) -> Result<Instance> {
        self.scope.resolve_in(key, parameters, Some(self.consumer))
    }

    fn lifetime_scope(&self) -> LifetimeScope {
        self.scope.clone()
    }
}
