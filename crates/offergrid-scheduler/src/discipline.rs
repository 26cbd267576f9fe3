//! Admission control for services acquiring new footprint.
//!
//! When many services reserve resources at once they can deadlock each
//! other: each holds part of what the others need. A [`Discipline`] decides,
//! per offer cycle, which reserving services may receive offers.
//!
//! Services in any other state are always admitted.

use std::collections::BTreeSet;
use std::sync::Arc;

use offergrid_core::ClientStatus;
use offergrid_core::config::AdmissionConfig;
use offergrid_state::Persister;
use tracing::{debug, info};

use crate::error::{SchedulerError, SchedulerResult};
use crate::selection::SelectionStore;

/// Policy deciding which services may receive offers this cycle.
pub trait Discipline: Send {
    /// Called once per offer cycle, before any `decide`, with the names of
    /// every registered service.
    ///
    /// A storage failure is retryable; the caller should try again next cycle.
    fn update_services(&mut self, live: &[String]) -> SchedulerResult<()>;

    /// Whether `name`, currently reporting `status`, may receive offers.
    ///
    /// # Panics
    ///
    /// If called before the first `update_services`.
    fn decide(&mut self, name: &str, status: &ClientStatus) -> bool;
}

/// No limit: every service is always admitted.
#[derive(Debug, Default)]
pub struct AllowAll;

impl Discipline for AllowAll {
    fn update_services(&mut self, _live: &[String]) -> SchedulerResult<()> {
        Ok(())
    }

    fn decide(&mut self, _name: &str, _status: &ClientStatus) -> bool {
        true
    }
}

/// Admit at most `limit` services in the reserving state at once.
///
/// The admitted set is persisted so the same services keep their slots
/// across restarts. Holders are never evicted; if the limit is lowered the
/// set drains naturally as holders stop reserving.
pub struct ReserveLimit {
    limit: usize,
    store: SelectionStore,
    selected: Option<BTreeSet<String>>,
}

impl ReserveLimit {
    pub fn new(limit: u32, persister: Arc<dyn Persister>) -> SchedulerResult<Self> {
        if limit == 0 {
            return Err(SchedulerError::InvalidLimit(limit));
        }
        Ok(Self {
            limit: limit as usize,
            store: SelectionStore::new(persister),
            selected: None,
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Services currently holding a slot. `None` until the first update.
    pub fn selected(&self) -> Option<&BTreeSet<String>> {
        self.selected.as_ref()
    }
}

impl Discipline for ReserveLimit {
    fn update_services(&mut self, live: &[String]) -> SchedulerResult<()> {
        let selected = match self.selected.take() {
            Some(selected) => selected,
            None => {
                let loaded = self.store.fetch()?;
                info!(limit = self.limit, selected = ?loaded, "loaded reserve selection");
                loaded
            }
        };
        let selected = self.selected.insert(selected);

        selected.retain(|name| {
            let keep = live.iter().any(|l| l == name);
            if !keep {
                debug!(service = %name, "dropping departed service from reserve selection");
            }
            keep
        });

        self.store.store(selected)?;
        Ok(())
    }

    fn decide(&mut self, name: &str, status: &ClientStatus) -> bool {
        let selected = self
            .selected
            .as_mut()
            .expect("update_services must be called before decide");

        if !status.is_reserving() {
            if selected.remove(name) {
                debug!(service = %name, ?status, "service left reserve selection");
            }
            return true;
        }
        if selected.contains(name) {
            return true;
        }
        if selected.len() < self.limit {
            selected.insert(name.to_string());
            info!(
                service = %name,
                used = selected.len(),
                limit = self.limit,
                "service admitted to reserve"
            );
            return true;
        }
        debug!(service = %name, limit = self.limit, "reserve limit reached, deferring service");
        false
    }
}

/// Build the discipline described by `config`.
pub fn discipline_from_config(
    config: &AdmissionConfig,
    persister: Arc<dyn Persister>,
) -> SchedulerResult<Box<dyn Discipline>> {
    Ok(match config.reserve_limit {
        Some(limit) => Box::new(ReserveLimit::new(limit, persister)?),
        None => Box::new(AllowAll),
    })
}
