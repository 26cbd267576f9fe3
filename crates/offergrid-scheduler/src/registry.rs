//! Service registry — the live set of hosted services.
//!
//! Services are indexed by logical name and by sanitized name. Two distinct
//! logical names that sanitize to the same string (`/a/b` and `a.b`) are a
//! configuration error and are rejected on insertion.
//!
//! # Locking
//!
//! A single `RwLock` guards the maps. Services are foreign code that may
//! call back into the registry, so no service method is ever invoked while
//! the lock is held: notification loops copy the handles they need, release
//! the lock, then call out.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use offergrid_core::{TaskStatus, names};
use tracing::{debug, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::service::{Service, ServiceHandle};

#[derive(Default)]
struct Entries {
    /// Logical name → handle. Ordered so snapshots iterate deterministically.
    services: BTreeMap<String, ServiceHandle>,
    /// Sanitized name → logical name.
    sanitized: HashMap<String, String>,
    /// Set once the framework has registered; holds the last `re_registered` flag.
    registered: Option<bool>,
}

/// Concurrent map of hosted services.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: RwLock<Entries>,
}

/// Read-locked view of every registered service.
///
/// The registry cannot be modified while a snapshot is alive. Drop it (or
/// call [`unlock`](Self::unlock)) before calling into any service.
pub struct RegistrySnapshot<'a> {
    guard: RwLockReadGuard<'a, Entries>,
}

impl RegistrySnapshot<'_> {
    /// Handles in logical-name order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceHandle> {
        self.guard.services.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.guard.services.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.guard.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.services.is_empty()
    }

    pub fn unlock(self) {}
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a service, replacing any previous service of the same name.
    ///
    /// If the framework has already registered, the new service is notified
    /// immediately so it catches up with the others.
    pub fn put(&self, service: Arc<dyn Service>) -> SchedulerResult<&Self> {
        let handle = ServiceHandle::new(service)?;
        let registered = {
            let mut entries = self.entries.write().expect("registry lock");
            if let Some(existing) = entries.sanitized.get(handle.sanitized_name()) {
                if existing != handle.name() {
                    return Err(SchedulerError::NameCollision {
                        name: handle.name().to_string(),
                        existing: existing.clone(),
                        sanitized: handle.sanitized_name().to_string(),
                    });
                }
            }
            entries
                .sanitized
                .insert(handle.sanitized_name().to_string(), handle.name().to_string());
            let replaced = entries
                .services
                .insert(handle.name().to_string(), handle.clone())
                .is_some();
            info!(service = handle.name(), replaced, "service added to registry");
            entries.registered
        };

        if registered.is_some() {
            handle.registered(false);
        }
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<ServiceHandle> {
        let entries = self.entries.read().expect("registry lock");
        entries.services.get(name).cloned()
    }

    pub fn get_by_sanitized(&self, sanitized_name: &str) -> Option<ServiceHandle> {
        let entries = self.entries.read().expect("registry lock");
        let name = entries.sanitized.get(sanitized_name)?;
        entries.services.get(name).cloned()
    }

    /// Resolve the service owning the task named in `status`.
    pub fn get_matching_by_task_status(&self, status: &TaskStatus) -> Option<ServiceHandle> {
        let sanitized = match names::extract_sanitized_name(&status.task_id) {
            Ok(sanitized) => sanitized,
            Err(e) => {
                warn!(task_id = %status.task_id, error = %e, "cannot resolve service for task status");
                return None;
            }
        };
        let handle = self.get_by_sanitized(sanitized);
        if handle.is_none() {
            warn!(task_id = %status.task_id, %sanitized, "no registered service for task status");
        }
        handle
    }

    /// Replace each named service with its uninstalling variant.
    ///
    /// Unknown and already-uninstalling names are skipped.
    pub fn mark_uninstalling(&self, names: &[String]) {
        let candidates: Vec<ServiceHandle> = {
            let entries = self.entries.read().expect("registry lock");
            names
                .iter()
                .filter_map(|name| match entries.services.get(name) {
                    None => {
                        warn!(service = %name, "cannot uninstall unknown service");
                        None
                    }
                    Some(handle) if handle.is_uninstalling() => {
                        warn!(service = %name, "service is already uninstalling");
                        None
                    }
                    Some(handle) => Some(handle.clone()),
                })
                .collect()
        };
        if candidates.is_empty() {
            return;
        }

        // Conversion calls into the service, so it happens unlocked.
        let converted: Vec<(ServiceHandle, ServiceHandle)> = candidates
            .into_iter()
            .map(|handle| {
                let next = handle.to_uninstalling();
                (handle, next)
            })
            .collect();

        let (installed, registered) = {
            let mut entries = self.entries.write().expect("registry lock");
            let mut installed = Vec::with_capacity(converted.len());
            for (previous, next) in converted {
                match entries.services.get_mut(previous.name()) {
                    Some(current) if current.same_instance(&previous) => {
                        *current = next.clone();
                        info!(service = next.name(), "service marked for uninstall");
                        installed.push(next);
                    }
                    _ => {
                        warn!(
                            service = previous.name(),
                            "service changed during uninstall conversion, skipping"
                        );
                    }
                }
            }
            (installed, entries.registered)
        };

        if registered.is_some() {
            for handle in &installed {
                handle.registered(false);
            }
        }
    }

    /// Remove the named services. Returns how many services remain.
    pub fn remove(&self, names: &[String]) -> usize {
        self.take(names).1
    }

    /// Remove the named services, returning the handles actually removed
    /// and how many services remain.
    pub fn take(&self, names: &[String]) -> (Vec<ServiceHandle>, usize) {
        let mut entries = self.entries.write().expect("registry lock");
        let mut removed = Vec::with_capacity(names.len());
        for name in names {
            match entries.services.remove(name) {
                Some(handle) => {
                    let sanitized = handle.sanitized_name();
                    if entries.sanitized.get(sanitized) == Some(name) {
                        entries.sanitized.remove(sanitized);
                    }
                    info!(service = %name, "service removed from registry");
                    removed.push(handle);
                }
                None => debug!(service = %name, "service already absent from registry"),
            }
        }
        (removed, entries.services.len())
    }

    /// Read-lock the registry for iteration.
    pub fn lock_and_snapshot(&self) -> RegistrySnapshot<'_> {
        RegistrySnapshot {
            guard: self.entries.read().expect("registry lock"),
        }
    }

    /// Record that the framework registered and notify every service.
    ///
    /// Services added or converted afterwards are notified as they arrive.
    pub fn broadcast_registered(&self, re_registered: bool) {
        let handles: Vec<ServiceHandle> = {
            let mut entries = self.entries.write().expect("registry lock");
            entries.registered = Some(re_registered);
            entries.services.values().cloned().collect()
        };
        info!(re_registered, services = handles.len(), "broadcasting registration");
        for handle in &handles {
            handle.registered(re_registered);
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.lock_and_snapshot().names()
    }

    pub fn len(&self) -> usize {
        self.lock_and_snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_and_snapshot().is_empty()
    }

    /// Drop every service without notifying any of them.
    pub fn close(&self) {
        let mut entries = self.entries.write().expect("registry lock");
        entries.services.clear();
        entries.sanitized.clear();
        debug!("registry closed");
    }
}
