//! Client status and response types.
//!
//! These are closed enums so every `match` in the router is checked for
//! exhaustiveness at compile time.

use serde::{Deserialize, Serialize};

use crate::types::{OfferResources, Recommendation};

/// What kind of work a `Working` service is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkState {
    /// Acquiring new footprint. Subject to admission control.
    Reserving,
    /// Any other work within the existing footprint.
    InPlace,
}

/// A service's current disposition, as reported on every offer cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "work", rename_all = "snake_case")]
pub enum ClientStatus {
    /// Steady state.
    Running,
    Working(WorkState),
    /// No more work; ready to be uninstalled.
    Finished,
    /// Uninstall completed; ready to be forgotten.
    Uninstalled,
}

impl ClientStatus {
    pub const fn reserving() -> Self {
        Self::Working(WorkState::Reserving)
    }

    pub const fn in_place() -> Self {
        Self::Working(WorkState::InPlace)
    }

    /// Only the reserving sub-state is subject to admission control.
    pub fn is_reserving(&self) -> bool {
        matches!(self, Self::Working(WorkState::Reserving))
    }
}

// ── Offers ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferResult {
    /// Offers were evaluated; unused offers may be declined long-term.
    Processed,
    /// Not ready for offers; unused offers should be declined short-term.
    NotReady,
}

/// The answer to a batch of offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferResponse {
    pub result: OfferResult,
    pub recommendations: Vec<Recommendation>,
}

impl OfferResponse {
    pub fn processed(recommendations: Vec<Recommendation>) -> Self {
        Self {
            result: OfferResult::Processed,
            recommendations,
        }
    }

    pub fn not_ready(recommendations: Vec<Recommendation>) -> Self {
        Self {
            result: OfferResult::NotReady,
            recommendations,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.result == OfferResult::Processed
    }
}

// ── Unexpected resources ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnexpectedResult {
    Processed,
    /// Evaluation failed somewhere; unused offers should be declined short-term.
    Failed,
}

/// Reserved resources that should be released back to the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnexpectedResourcesResponse {
    pub result: UnexpectedResult,
    pub resources: Vec<OfferResources>,
}

impl UnexpectedResourcesResponse {
    pub fn processed(resources: Vec<OfferResources>) -> Self {
        Self {
            result: UnexpectedResult::Processed,
            resources,
        }
    }

    pub fn failed(resources: Vec<OfferResources>) -> Self {
        Self {
            result: UnexpectedResult::Failed,
            resources,
        }
    }
}

// ── Task status ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

/// A task status update delivered by the cluster manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub state: TaskState,
    #[serde(default)]
    pub message: Option<String>,
}

impl TaskStatus {
    pub fn new(task_id: impl Into<String>, state: TaskState) -> Self {
        Self {
            task_id: task_id.into(),
            state,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusResponse {
    Processed,
    /// No service claims the task; the cluster manager may kill it.
    UnknownTask,
}
