//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while managing services and admission control.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("reserve limit must be at least 1, got {0}")]
    InvalidLimit(u32),

    #[error("service {name:?} collides with {existing:?} (both sanitize to {sanitized:?})")]
    NameCollision {
        name: String,
        existing: String,
        sanitized: String,
    },

    #[error("invalid service name: {0}")]
    InvalidName(#[from] offergrid_core::NameError),

    #[error("state store error: {0}")]
    Storage(#[from] offergrid_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
