//! Test doubles shared by the unit tests in this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use offergrid_core::{
    ClientStatus, Offer, OfferResources, OfferResponse, Operation, Recommendation,
    StatusResponse, TaskStatus, UnexpectedResourcesResponse,
};
use offergrid_state::{Persister, StateError, StateResult, StateStore};

use crate::service::Service;

/// In-memory persister whose reads and writes can be made to fail.
pub struct FailingPersister {
    inner: StateStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl Default for FailingPersister {
    fn default() -> Self {
        Self {
            inner: StateStore::open_in_memory().unwrap(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl FailingPersister {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Persister for FailingPersister {
    fn set(&self, path: &str, value: &[u8]) -> StateResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StateError::Write("injected".to_string()));
        }
        self.inner.set(path, value)
    }

    fn get(&self, path: &str) -> StateResult<Vec<u8>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StateError::Read("injected".to_string()));
        }
        self.inner.get(path)
    }

    fn delete(&self, path: &str) -> StateResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StateError::Write("injected".to_string()));
        }
        self.inner.delete(path)
    }

    fn children(&self, path: &str) -> StateResult<Vec<String>> {
        self.inner.children(path)
    }
}

/// How a [`FakeService`] answers offers.
#[derive(Clone)]
pub enum Claim {
    /// Claim nothing.
    Nothing,
    /// Claim every resource of the offers at these positions in what it sees.
    Positions(Vec<usize>),
    /// Claim a resource that was never offered.
    Bogus,
}

/// Scriptable service recording every call it receives.
pub struct FakeService {
    name: String,
    status: Mutex<ClientStatus>,
    claim: Mutex<Claim>,
    ready: AtomicBool,
    unexpected_fails: AtomicBool,
    pub seen_offers: Mutex<Vec<Vec<Offer>>>,
    pub seen_statuses: Mutex<Vec<TaskStatus>>,
    pub registrations: Mutex<Vec<bool>>,
    pub purges: AtomicUsize,
    pub uninstalling: AtomicBool,
    variant: Mutex<Option<Arc<FakeService>>>,
    hook: Mutex<Option<RegisteredHook>>,
}

type RegisteredHook = Box<dyn Fn() + Send + Sync>;

impl FakeService {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            status: Mutex::new(ClientStatus::Running),
            claim: Mutex::new(Claim::Nothing),
            ready: AtomicBool::new(true),
            unexpected_fails: AtomicBool::new(false),
            seen_offers: Mutex::new(Vec::new()),
            seen_statuses: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
            purges: AtomicUsize::new(0),
            uninstalling: AtomicBool::new(false),
            variant: Mutex::new(None),
            hook: Mutex::new(None),
        })
    }

    /// The instance `uninstalling()` hands out, created on first use.
    pub fn uninstall_variant(&self) -> Arc<FakeService> {
        self.variant
            .lock()
            .unwrap()
            .get_or_insert_with(|| {
                let next = FakeService::new(&self.name);
                next.uninstalling.store(true, Ordering::SeqCst);
                next.set_status(ClientStatus::in_place());
                next
            })
            .clone()
    }

    /// Run `hook` from inside every `registered` callback.
    pub fn on_registered(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.lock().unwrap().len()
    }

    pub fn set_status(&self, status: ClientStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn set_claim(&self, claim: Claim) {
        *self.claim.lock().unwrap() = claim;
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn fail_unexpected(&self, fail: bool) {
        self.unexpected_fails.store(fail, Ordering::SeqCst);
    }

    pub fn offer_calls(&self) -> usize {
        self.seen_offers.lock().unwrap().len()
    }
}

impl Service for FakeService {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> ClientStatus {
        *self.status.lock().unwrap()
    }

    fn offers(&self, offers: &[Offer]) -> OfferResponse {
        self.seen_offers.lock().unwrap().push(offers.to_vec());
        let recommendations = match &*self.claim.lock().unwrap() {
            Claim::Nothing => Vec::new(),
            Claim::Positions(positions) => positions
                .iter()
                .filter_map(|&i| offers.get(i))
                .flat_map(|offer| {
                    offer
                        .resources
                        .iter()
                        .map(move |r| Recommendation::new(offer, r.id.clone(), Operation::Reserve))
                })
                .collect(),
            Claim::Bogus => offers
                .iter()
                .take(1)
                .map(|offer| Recommendation::new(offer, "never-offered", Operation::Reserve))
                .collect(),
        };
        if self.ready.load(Ordering::SeqCst) {
            OfferResponse::processed(recommendations)
        } else {
            OfferResponse::not_ready(recommendations)
        }
    }

    fn unexpected_resources(&self, offers: &[Offer]) -> UnexpectedResourcesResponse {
        if self.unexpected_fails.load(Ordering::SeqCst) {
            return UnexpectedResourcesResponse::failed(Vec::new());
        }
        // Resources named `stale-*` are no longer wanted.
        let stale = offers
            .iter()
            .filter_map(|offer| {
                let resources: Vec<_> = offer
                    .resources
                    .iter()
                    .filter(|r| r.id.starts_with("stale-"))
                    .cloned()
                    .collect();
                (!resources.is_empty()).then(|| OfferResources::new(offer, resources))
            })
            .collect();
        UnexpectedResourcesResponse::processed(stale)
    }

    fn task_status(&self, status: &TaskStatus) -> StatusResponse {
        self.seen_statuses.lock().unwrap().push(status.clone());
        StatusResponse::Processed
    }

    fn registered(&self, re_registered: bool) {
        self.registrations.lock().unwrap().push(re_registered);
        if let Some(hook) = &*self.hook.lock().unwrap() {
            hook();
        }
    }

    fn uninstalling(&self) -> Arc<dyn Service> {
        self.uninstall_variant()
    }

    fn persisted_state(&self) -> StateResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn purge_state(&self) -> StateResult<()> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
