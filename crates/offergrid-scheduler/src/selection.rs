//! Persisted set of services currently admitted to reserve.
//!
//! The set is stored as its sorted members joined by `__`. Legal service
//! names never contain that sequence and never start or end with `_`, so
//! the encoding is reversible. Only legal names are accepted on write, and
//! a record holding anything else is reported as corrupt. An empty set is
//! stored as zero bytes.

use std::collections::BTreeSet;
use std::sync::Arc;

use offergrid_core::names::{DELIMITER, validate};
use offergrid_state::{Persister, StateError, join_path};
use tracing::debug;

use crate::error::SchedulerResult;

const DISCIPLINE_ROOT: &str = "ReserveDiscipline";
const SELECTED_SERVICES: &str = "SelectedServices";

/// Write-through cache over the persisted selection set.
pub struct SelectionStore {
    persister: Arc<dyn Persister>,
    path: String,
    cached: Option<BTreeSet<String>>,
}

impl SelectionStore {
    pub fn new(persister: Arc<dyn Persister>) -> Self {
        Self {
            persister,
            path: join_path(&[DISCIPLINE_ROOT, SELECTED_SERVICES]),
            cached: None,
        }
    }

    /// Persist `names` if they differ from the last known value.
    ///
    /// Returns whether a write happened. On failure the cache is untouched.
    pub fn store(&mut self, names: &BTreeSet<String>) -> SchedulerResult<bool> {
        if self.cached.as_ref() == Some(names) {
            return Ok(false);
        }
        for name in names {
            validate(name)?;
        }
        self.persister.set(&self.path, &encode(names))?;
        debug!(selected = ?names, "stored selected services");
        self.cached = Some(names.clone());
        Ok(true)
    }

    /// The persisted set. A missing record is an empty set.
    pub fn fetch(&mut self) -> SchedulerResult<BTreeSet<String>> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }
        let names = match self.persister.get(&self.path) {
            Ok(bytes) => decode(&bytes)?,
            Err(StateError::NotFound(_)) => BTreeSet::new(),
            Err(e) => return Err(e.into()),
        };
        self.cached = Some(names.clone());
        Ok(names)
    }
}

fn encode(names: &BTreeSet<String>) -> Vec<u8> {
    names
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(DELIMITER)
        .into_bytes()
}

fn decode(bytes: &[u8]) -> Result<BTreeSet<String>, StateError> {
    if bytes.is_empty() {
        return Ok(BTreeSet::new());
    }
    let corrupt = |reason: String| StateError::Read(format!("corrupt selection record: {reason}"));
    let text = std::str::from_utf8(bytes).map_err(|e| corrupt(e.to_string()))?;
    text.split(DELIMITER)
        .map(|name| -> Result<String, StateError> {
            validate(name).map_err(|e| corrupt(e.to_string()))?;
            Ok(name.to_string())
        })
        .collect()
}
