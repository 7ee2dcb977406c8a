//! Deferred construction.
//!
//! A facade resolution captures a [`DeferredThunk`]: the scope it was
//! resolved in, the key of the real registration and the caller's
//! parameters. A stand-in wraps the thunk in a [`Deferred`], which
//! realises the real instance on first use and keeps it.
//!
//! ```text
//! Deferred<T>:  pending(thunk) ──get()──> realised(Arc<T>)
//!                    ▲                │
//!                    └─── on error ───┘   (failures are not cached)
//! ```

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use muajjal_container::error::{CircularDependencyError, MuajjalError, Result};
use muajjal_container::instance::{Instance, Parameters};
use muajjal_container::key::DependencyKey;
use muajjal_container::resolver::{Resolver, downcast_instance};
use muajjal_container::scope::{LifetimeScope, WeakLifetimeScope};
use muajjal_container::types::ServiceType;
use once_cell::sync::OnceCell;
use tracing::trace;

/// Resolves one real registration in a captured scope.
///
/// Stateless: every [`invoke`](Self::invoke) is a fresh resolution, so
/// caching is whatever the real registration's lifetime says. The scope is
/// held weakly, so a stand-in never keeps its scope alive.
#[derive(Clone)]
pub struct DeferredThunk {
    scope: WeakLifetimeScope,
    key: DependencyKey,
    parameters: Parameters,
}

impl DeferredThunk {
    pub fn new(scope: &LifetimeScope, key: DependencyKey, parameters: Parameters) -> Self {
        Self {
            scope: scope.downgrade(),
            key,
            parameters,
        }
    }

    /// Resolves the real registration with the captured parameters.
    ///
    /// # Errors
    /// The container's error for the real key, unchanged, or
    /// [`MuajjalError::ScopeDisposed`] when the scope is gone.
    pub fn invoke(&self) -> Result<Instance> {
        let scope = self.scope.upgrade().ok_or_else(|| MuajjalError::ScopeDisposed {
            key: self.key.clone(),
        })?;
        trace!(key = %self.key, scope = scope.id(), "Realising deferred instance");
        scope.resolve_key(&self.key, &self.parameters)
    }

    /// Key of the real registration.
    pub fn key(&self) -> &DependencyKey {
        &self.key
    }

    /// The closed service the thunk produces.
    pub fn service(&self) -> &ServiceType {
        self.key.service()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}

impl fmt::Debug for DeferredThunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredThunk")
            .field("key", &self.key)
            .field("live", &self.scope.upgrade().is_some())
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

thread_local! {
    static REALISING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

struct RealisationGuard(usize);

impl RealisationGuard {
    fn enter(address: usize, key: &DependencyKey) -> Result<Self> {
        REALISING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&address) {
                return Err(MuajjalError::CircularDependency(CircularDependencyError {
                    chain: vec![key.clone(), key.clone()],
                }));
            }
            stack.push(address);
            Ok(RealisationGuard(address))
        })
    }
}

impl Drop for RealisationGuard {
    fn drop(&mut self) {
        REALISING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().rposition(|a| *a == self.0) {
                stack.remove(position);
            }
        });
    }
}

/// Single-flight holder of a lazily realised `Arc<T>`.
///
/// Concurrent first calls to [`get`](Self::get) realise once. A failed
/// realisation leaves the holder pending, so the next call retries.
pub struct Deferred<T: ?Sized> {
    thunk: DeferredThunk,
    cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Deferred<T> {
    pub fn new(thunk: DeferredThunk) -> Self {
        Self {
            thunk,
            cell: OnceCell::new(),
        }
    }

    /// The real instance, realising it on first call.
    ///
    /// Realisation runs inside the holder's `OnceCell`, so concurrent
    /// callers wait for the first one. Two stand-ins whose constructors use
    /// each other form a cycle: on one thread it is reported as
    /// [`MuajjalError::CircularDependency`], but realised from two threads
    /// at once each waits on the other forever. Use such a dependency
    /// outside the constructor.
    ///
    /// # Errors
    /// The container's resolution error, unchanged, or
    /// [`MuajjalError::CircularDependency`] when realising this value
    /// needs this value.
    pub fn get(&self) -> Result<Arc<T>> {
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }

        let _guard = RealisationGuard::enter(self as *const Self as *const () as usize, self.thunk.key())?;
        self.cell
            .get_or_try_init(|| {
                let instance = self.thunk.invoke()?;
                downcast_instance::<T>(self.thunk.key(), &instance)
            })
            .cloned()
    }

    pub fn is_realized(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn thunk(&self) -> &DeferredThunk {
        &self.thunk
    }
}

impl<T: ?Sized> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("key", &self.thunk.key)
            .field("realized", &self.cell.get().is_some())
            .finish()
    }
}

/// A contract that has a deferred stand-in.
///
/// Implemented for the trait object of a lazily registered contract:
///
/// ```rust,ignore
/// struct ReportsStandIn(Deferred<dyn Reports>);
///
/// impl Reports for ReportsStandIn {
///     fn render(&self) -> Result<String> {
///         self.0.get()?.render()
///     }
/// }
///
/// impl LazyContract for dyn Reports {
///     fn stand_in(deferred: Deferred<Self>) -> Arc<Self> {
///         Arc::new(ReportsStandIn(deferred))
///     }
/// }
/// ```
pub trait LazyContract: Send + Sync + 'static {
    fn stand_in(deferred: Deferred<Self>) -> Arc<Self>;
}
