//! # Muajjal: lazy registrations for the Muajjal container
//!
//! A lazy registration hands out a stand-in when resolved and builds the
//! real implementation on first use. One registration becomes two:
//!
//! - a *real* registration under an internal key, bound to the
//!   implementation, configured by the caller's mutator
//! - a *facade* registration under the public key, producing stand-ins
//!   that resolve the real registration with the original parameters
//!
//! Both share one lifetime, so a singleton stand-in fronts a singleton
//! instance and a per-scope stand-in fronts a per-scope instance. Open
//! generic contracts work through a registration source that serves each
//! closed request from the open facade.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use muajjal::prelude::*;
//!
//! trait Reports: Send + Sync {
//!     fn render(&self) -> Result<String>;
//! }
//!
//! struct PdfReports;
//! impl Reports for PdfReports {
//!     fn render(&self) -> Result<String> { Ok("%PDF".into()) }
//! }
//!
//! struct ReportsStandIn(Deferred<dyn Reports>);
//! impl Reports for ReportsStandIn {
//!     fn render(&self) -> Result<String> { self.0.get()?.render() }
//! }
//!
//! impl LazyContract for dyn Reports {
//!     fn stand_in(deferred: Deferred<Self>) -> Arc<Self> {
//!         Arc::new(ReportsStandIn(deferred))
//!     }
//! }
//!
//! let container = Container::builder()
//!     .register_lazy::<dyn Reports>(
//!         |_, _| Ok(Arc::new(PdfReports) as Arc<dyn Reports>),
//!         LazyOptions::new().lifetime(ServiceLifetime::SingleInstance),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let reports: Arc<dyn Reports> = container.resolve().unwrap();
//! assert_eq!(reports.render().unwrap(), "%PDF");
//! ```

pub mod builder_ext;
pub mod deferred;
pub mod lifetime;
pub mod naming;
pub mod open_generic;
pub mod planner;
pub mod proxy;


pub use builder_ext::{LazyOptions, LazyRegistrationExt};
pub use deferred::{Deferred, DeferredThunk, LazyContract};
pub use lifetime::{LifetimePolicyMapper, ServiceLifetime};
pub use naming::NameGenerator;
pub use open_generic::OpenGenericAdapter;
pub use planner::{
    LazyImplementation, LazyRegistrationRequest, PlannedRegistration, RegistrationMutator,
    RegistrationPlanner,
};
pub use proxy::{ProxyFactory, ProxyRegistry, StandInFactory};

pub use muajjal_container as container;
pub use muajjal_support as support;

pub mod prelude {
    pub use crate::builder_ext::{LazyOptions, LazyRegistrationExt};
    pub use crate::deferred::{Deferred, LazyContract};
    pub use crate::lifetime::ServiceLifetime;
    pub use crate::planner::LazyImplementation;
    pub use crate::proxy::ProxyRegistry;
    pub use muajjal_container::generic::GenericImplementation;
    pub use muajjal_container::prelude::*;
}
