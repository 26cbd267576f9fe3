//! Multi-service router — the single client the cluster-manager connection
//! talks to.
//!
//! Each offer cycle the router:
//! 1. Snapshots the registry and asks every service for its status
//! 2. Runs the statuses through the admission discipline
//! 3. Hands offers to admitted services in registry order, pruning what
//!    each one consumes before the next one looks
//! 4. Moves finished services to uninstalling, and forgets uninstalled ones
//!
//! No service is ever called while the registry lock is held.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use offergrid_core::config::FrameworkConfig;
use offergrid_core::{
    ClientStatus, Offer, OfferId, OfferResources, OfferResponse, OffergridConfig,
    Recommendation, Resource, StatusResponse, TaskStatus, UnexpectedResourcesResponse,
    UnexpectedResult,
};
use offergrid_state::{Persister, StateError, StateStore};
use tracing::{debug, error, info, warn};

use crate::discipline::{Discipline, discipline_from_config};
use crate::error::SchedulerResult;
use crate::registry::ServiceRegistry;
use crate::service::{ServiceHandle, UninstallObserver};

/// File name of the state database inside `framework.state_dir`.
pub const STATE_FILE: &str = "offergrid.redb";

/// Open the state backend described by `framework`.
///
/// With a `state_dir` the database lives at `{state_dir}/offergrid.redb`,
/// creating the directory if needed. Without one, state is kept in memory
/// and lost on restart.
pub fn open_state(framework: &FrameworkConfig) -> SchedulerResult<Arc<dyn Persister>> {
    let store = match &framework.state_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| StateError::Open(e.to_string()))?;
            let path = dir.join(STATE_FILE);
            info!(path = %path.display(), "opening state database");
            StateStore::open(&path)?
        }
        None => {
            warn!("no state_dir configured, scheduler state will not survive a restart");
            StateStore::open_in_memory()?
        }
    };
    Ok(Arc::new(store))
}

/// Routes offers and task statuses to the services in a [`ServiceRegistry`].
pub struct MultiServiceRouter {
    registry: Arc<ServiceRegistry>,
    discipline: Mutex<Box<dyn Discipline>>,
    observer: Arc<dyn UninstallObserver>,
    /// The whole framework is being uninstalled.
    uninstall_mode: bool,
    reported_uninstalled: AtomicBool,
    deregistered: OnceLock<()>,
}

/// Where a service lands after its status is checked.
enum Outcome {
    GiveOffers,
    Deferred,
    Finished,
    Uninstalled,
}

impl MultiServiceRouter {
    /// Create a router over `registry`.
    ///
    /// In uninstall mode every service already registered is converted to
    /// its uninstalling variant.
    pub fn new(
        registry: Arc<ServiceRegistry>,
        discipline: Box<dyn Discipline>,
        observer: Arc<dyn UninstallObserver>,
        uninstall_mode: bool,
    ) -> Self {
        if uninstall_mode {
            let names = registry.names();
            info!(services = names.len(), "framework uninstall requested");
            registry.mark_uninstalling(&names);
        }
        Self {
            registry,
            discipline: Mutex::new(discipline),
            observer,
            uninstall_mode,
            reported_uninstalled: AtomicBool::new(false),
            deregistered: OnceLock::new(),
        }
    }

    /// Create a router with the discipline and uninstall mode from `config`.
    pub fn from_config(
        config: &OffergridConfig,
        registry: Arc<ServiceRegistry>,
        persister: Arc<dyn Persister>,
        observer: Arc<dyn UninstallObserver>,
    ) -> SchedulerResult<Self> {
        let discipline = discipline_from_config(&config.admission, persister)?;
        Ok(Self::new(
            registry,
            discipline,
            observer,
            config.framework.uninstall,
        ))
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    // ── Framework lifecycle ────────────────────────────────────────

    /// Status of the router as a whole.
    ///
    /// `Uninstalled` only in uninstall mode once every service is gone;
    /// otherwise always `Running`.
    pub fn client_status(&self) -> ClientStatus {
        if self.uninstall_mode && self.registry.is_empty() {
            if !self.reported_uninstalled.swap(true, Ordering::SeqCst) {
                info!("all services uninstalled, framework ready for teardown");
            }
            return ClientStatus::Uninstalled;
        }
        ClientStatus::Running
    }

    /// The framework registered with the cluster manager.
    pub fn registered(&self, re_registered: bool) {
        self.registry.broadcast_registered(re_registered);
    }

    /// The framework was torn down by the cluster manager.
    ///
    /// # Panics
    ///
    /// If `Uninstalled` was never reported by [`client_status`](Self::client_status).
    pub fn unregistered(&self) {
        if !self.reported_uninstalled.load(Ordering::SeqCst) {
            panic!("unregistered() called before the framework reported uninstalled");
        }
        if self.deregistered.set(()).is_err() {
            warn!("framework already deregistered");
            return;
        }
        info!("framework deregistered");
    }

    pub fn is_deregistered(&self) -> bool {
        self.deregistered.get().is_some()
    }

    // ── Offers ─────────────────────────────────────────────────────

    /// Run one offer cycle across every registered service.
    pub fn offers(&self, offers: &[Offer]) -> OfferResponse {
        let handles: Vec<ServiceHandle> = {
            let snapshot = self.registry.lock_and_snapshot();
            if snapshot.is_empty() {
                snapshot.unlock();
                if self.uninstall_mode {
                    debug!("no services remain, waiting for framework teardown");
                } else {
                    debug!("no services registered, nothing to offer");
                }
                return OfferResponse::processed(Vec::new());
            }
            snapshot.iter().cloned().collect()
        };
        let live: Vec<String> = handles.iter().map(|h| h.name().to_string()).collect();

        let statuses: Vec<ClientStatus> = handles.iter().map(|h| h.status()).collect();

        let outcomes: Vec<Outcome> = {
            let mut discipline = self.discipline.lock().expect("discipline lock");
            if let Err(e) = discipline.update_services(&live) {
                warn!(error = %e, "admission state unavailable, retrying next cycle");
                return OfferResponse::not_ready(Vec::new());
            }
            handles
                .iter()
                .zip(&statuses)
                .map(|(handle, status)| {
                    // Always consulted so the discipline sees every transition.
                    let admitted = discipline.decide(handle.name(), status);
                    match status {
                        ClientStatus::Running | ClientStatus::Working(_) if admitted => {
                            Outcome::GiveOffers
                        }
                        ClientStatus::Running | ClientStatus::Working(_) => Outcome::Deferred,
                        ClientStatus::Finished => Outcome::Finished,
                        ClientStatus::Uninstalled => Outcome::Uninstalled,
                    }
                })
                .collect()
        };

        let mut receivers = Vec::new();
        let mut finished = Vec::new();
        let mut uninstalled = Vec::new();
        for (handle, outcome) in handles.into_iter().zip(outcomes) {
            match outcome {
                Outcome::GiveOffers => receivers.push(handle),
                Outcome::Deferred => {
                    debug!(service = handle.name(), "service deferred by admission control")
                }
                Outcome::Finished => finished.push(handle.name().to_string()),
                Outcome::Uninstalled => uninstalled.push(handle),
            }
        }

        let (recommendations, ready) = distribute(&receivers, offers);

        if !finished.is_empty() {
            info!(services = ?finished, "services finished, starting uninstall");
            self.registry.mark_uninstalling(&finished);
        }
        if !uninstalled.is_empty() {
            self.forget(&uninstalled);
        }

        debug!(
            offers = offers.len(),
            services = receivers.len(),
            recommendations = recommendations.len(),
            ready,
            "offer cycle complete"
        );
        if ready {
            OfferResponse::processed(recommendations)
        } else {
            OfferResponse::not_ready(recommendations)
        }
    }

    /// Remove uninstalled services, then notify outside any lock.
    fn forget(&self, uninstalled: &[ServiceHandle]) {
        let names: Vec<String> = uninstalled.iter().map(|h| h.name().to_string()).collect();
        let (removed, remaining) = self.registry.take(&names);
        info!(removed = removed.len(), remaining, "uninstalled services removed");

        for handle in &removed {
            self.observer.uninstalled(handle.name());
            if let Err(e) = handle.purge_state() {
                error!(service = handle.name(), error = %e, "failed to purge service state");
            }
        }
    }

    // ── Unexpected resources ───────────────────────────────────────

    /// Find reserved resources in `offers` that no live service still wants.
    pub fn unexpected_resources(&self, offers: &[Offer]) -> UnexpectedResourcesResponse {
        let mut by_owner: BTreeMap<String, Vec<Offer>> = BTreeMap::new();
        for offer in offers {
            let mut owned: BTreeMap<&str, Vec<Resource>> = BTreeMap::new();
            for resource in &offer.resources {
                match resource.owner() {
                    Some(owner) => owned.entry(owner).or_default().push(resource.clone()),
                    None if resource.is_reserved() => warn!(
                        offer = %offer.id,
                        resource = %resource.id,
                        "reserved resource has no namespace label, leaving it alone"
                    ),
                    None => {}
                }
            }
            for (owner, resources) in owned {
                by_owner
                    .entry(owner.to_string())
                    .or_default()
                    .push(offer.with_resources(resources));
            }
        }

        let mut failed = false;
        let mut unexpected = Vec::new();
        for (owner, owned_offers) in by_owner {
            let Some(handle) = self.registry.get(&owner) else {
                info!(service = %owner, "resources reserved by unknown service are unexpected");
                unexpected.extend(owned_offers.iter().map(everything));
                continue;
            };
            let response = handle.unexpected_resources(&owned_offers);
            match response.result {
                UnexpectedResult::Processed => unexpected.extend(response.resources),
                UnexpectedResult::Failed => {
                    warn!(service = %owner, "service failed to evaluate its resources, treating all as unexpected");
                    failed = true;
                    unexpected.extend(owned_offers.iter().map(everything));
                }
            }
        }

        let unexpected = merge_by_offer(unexpected);
        if failed {
            UnexpectedResourcesResponse::failed(unexpected)
        } else {
            UnexpectedResourcesResponse::processed(unexpected)
        }
    }

    // ── Task status ────────────────────────────────────────────────

    pub fn task_status(&self, status: &TaskStatus) -> StatusResponse {
        match self.registry.get_matching_by_task_status(status) {
            Some(handle) => handle.task_status(status),
            None => StatusResponse::UnknownTask,
        }
    }
}

/// Offer `offers` to each receiver in turn, removing what each consumes.
///
/// Returns the accepted recommendations and whether every receiver was ready.
fn distribute(receivers: &[ServiceHandle], offers: &[Offer]) -> (Vec<Recommendation>, bool) {
    let mut remaining: Vec<Offer> = offers.to_vec();
    let mut accepted = Vec::new();
    let mut ready = true;

    for handle in receivers {
        let response = handle.offers(&remaining);
        if !response.is_ready() {
            debug!(service = handle.name(), "service not ready for offers");
            ready = false;
        }
        if response.recommendations.is_empty() {
            continue;
        }
        let recommendations = validate(handle.name(), &remaining, response.recommendations);
        remaining = prune(remaining, &recommendations);
        accepted.extend(recommendations);
    }
    (accepted, ready)
}

/// Drop recommendations for resources the service was never shown.
fn validate(
    service: &str,
    offered: &[Offer],
    recommendations: Vec<Recommendation>,
) -> Vec<Recommendation> {
    let by_id: HashMap<&OfferId, &Offer> = offered.iter().map(|o| (&o.id, o)).collect();
    recommendations
        .into_iter()
        .filter(|rec| {
            let known = by_id
                .get(&rec.offer_id)
                .is_some_and(|offer| offer.resource(&rec.resource_id).is_some());
            if !known {
                error!(
                    service,
                    offer = %rec.offer_id,
                    resource = %rec.resource_id,
                    "recommendation references a resource that was not offered, dropping it"
                );
            }
            known
        })
        .collect()
}

/// Remove consumed resources, and offers left with none.
fn prune(offers: Vec<Offer>, recommendations: &[Recommendation]) -> Vec<Offer> {
    let mut consumed: HashMap<&OfferId, HashSet<&str>> = HashMap::new();
    for rec in recommendations {
        consumed
            .entry(&rec.offer_id)
            .or_default()
            .insert(rec.resource_id.as_str());
    }
    offers
        .into_iter()
        .filter_map(|offer| match consumed.get(&offer.id) {
            Some(resources) => offer.without_resources(resources),
            None => Some(offer),
        })
        .collect()
}

fn everything(offer: &Offer) -> OfferResources {
    OfferResources::new(offer, offer.resources.clone())
}

/// Combine entries for the same offer, keeping first-seen order.
fn merge_by_offer(entries: Vec<OfferResources>) -> Vec<OfferResources> {
    let mut merged: Vec<OfferResources> = Vec::new();
    for entry in entries {
        match merged.iter_mut().find(|m| m.offer_id == entry.offer_id) {
            Some(existing) => existing.resources.extend(entry.resources),
            None => merged.push(entry),
        }
    }
    merged
}
