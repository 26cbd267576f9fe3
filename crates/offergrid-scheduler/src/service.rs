//! The sub-scheduler interface and the handle the registry stores.
//!
//! A [`Service`] is one independently managed sub-scheduler. The router only
//! ever talks to it through this trait; how the service plans deployments or
//! evaluates placement constraints is its own business.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use offergrid_core::{
    ClientStatus, Offer, OfferResponse, StatusResponse, TaskStatus, UnexpectedResourcesResponse,
    names,
};
use offergrid_state::{Persister, StateResult, join_path};

use crate::error::SchedulerResult;

/// Root of every service's namespaced persisted state.
pub const SERVICES_ROOT: &str = "Services";

/// A sub-scheduler hosted by the router.
///
/// Implementations are third-party code: they may call back into the
/// registry from any of these methods, so none of them is ever invoked
/// while the registry's write lock is held.
pub trait Service: Send + Sync {
    /// Logical service name, e.g. `/data/kafka`.
    fn name(&self) -> &str;

    /// Current disposition. Queried once per offer cycle.
    fn status(&self) -> ClientStatus;

    /// Evaluate offers. Recommendations may only reference resources present
    /// in `offers`.
    fn offers(&self, offers: &[Offer]) -> OfferResponse;

    /// Of the reserved resources in `offers` (all labelled with this
    /// service's name), report those the service no longer expects.
    fn unexpected_resources(&self, offers: &[Offer]) -> UnexpectedResourcesResponse;

    fn task_status(&self, status: &TaskStatus) -> StatusResponse;

    /// The framework registered (or re-registered) with the cluster manager.
    fn registered(&self, re_registered: bool);

    /// Produce the uninstalling variant of this service.
    fn uninstalling(&self) -> Arc<dyn Service>;

    /// Top-level keys of this service's namespaced persisted state.
    fn persisted_state(&self) -> StateResult<Vec<String>>;

    /// Delete all of this service's namespaced persisted state.
    fn purge_state(&self) -> StateResult<()>;
}

/// Persistence path holding everything stored on behalf of `service_name`.
pub fn service_namespace(service_name: &str) -> String {
    join_path(&[SERVICES_ROOT, &names::sanitize(service_name)])
}

/// List the keys under a service's namespace. Empty if nothing was stored.
pub fn list_namespace(persister: &dyn Persister, service_name: &str) -> StateResult<Vec<String>> {
    match persister.children(&service_namespace(service_name)) {
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

/// Delete a service's namespace. Succeeds if nothing was stored.
pub fn purge_namespace(persister: &dyn Persister, service_name: &str) -> StateResult<()> {
    match persister.delete(&service_namespace(service_name)) {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Lifecycle stage of a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Uninstalling,
}

/// A registered service plus the names the registry indexes it by.
#[derive(Clone)]
pub struct ServiceHandle {
    name: String,
    sanitized_name: String,
    lifecycle: Lifecycle,
    service: Arc<dyn Service>,
}

impl ServiceHandle {
    /// Wrap an active service. Fails if its name is not a legal service name.
    pub fn new(service: Arc<dyn Service>) -> SchedulerResult<Self> {
        let name = service.name().to_string();
        names::validate(&name)?;
        Ok(Self {
            sanitized_name: names::sanitize(&name),
            name,
            lifecycle: Lifecycle::Active,
            service,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sanitized_name(&self) -> &str {
        &self.sanitized_name
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_uninstalling(&self) -> bool {
        self.lifecycle == Lifecycle::Uninstalling
    }

    /// True when both handles wrap the same service instance.
    pub fn same_instance(&self, other: &ServiceHandle) -> bool {
        Arc::ptr_eq(&self.service, &other.service)
    }

    /// The uninstalling variant of this handle, under the same names.
    pub fn to_uninstalling(&self) -> Self {
        Self {
            name: self.name.clone(),
            sanitized_name: self.sanitized_name.clone(),
            lifecycle: Lifecycle::Uninstalling,
            service: self.service.uninstalling(),
        }
    }
}

impl Deref for ServiceHandle {
    type Target = dyn Service;

    fn deref(&self) -> &Self::Target {
        self.service.as_ref()
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("name", &self.name)
            .field("sanitized_name", &self.sanitized_name)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

/// Notified once per service after it has been removed from the registry.
pub trait UninstallObserver: Send + Sync {
    fn uninstalled(&self, service_name: &str);
}

/// Observer that ignores notifications.
pub struct NoopObserver;

impl UninstallObserver for NoopObserver {
    fn uninstalled(&self, _service_name: &str) {}
}
