//! offergrid-scheduler — many sub-schedulers behind one framework.
//!
//! Hosts any number of independently managed services in one scheduler
//! process. All of them share a single stream of offers and task statuses
//! from the cluster manager; the router decides who sees what.
//!
//! # Architecture
//!
//! ```text
//! MultiServiceRouter
//!   ├── ServiceRegistry (name + sanitized name → ServiceHandle)
//!   ├── Discipline (AllowAll | ReserveLimit)
//!   │     └── SelectionStore → Persister (redb)
//!   └── UninstallObserver (notified after a service is forgotten)
//! ```

pub mod discipline;
pub mod error;
pub mod registry;
pub mod router;
pub mod selection;
pub mod service;

#[cfg(test)]
mod testing;

pub use discipline::{AllowAll, Discipline, ReserveLimit, discipline_from_config};
pub use error::{SchedulerError, SchedulerResult};
pub use registry::{RegistrySnapshot, ServiceRegistry};
pub use router::{MultiServiceRouter, STATE_FILE, open_state};
pub use selection::SelectionStore;
pub use service::{
    Lifecycle, NoopObserver, Service, ServiceHandle, UninstallObserver, list_namespace,
    purge_namespace, service_namespace,
};
