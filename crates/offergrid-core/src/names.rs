//! Service naming rules.
//!
//! Logical service names may contain `/` (e.g. `/data/kafka`). Anywhere a
//! name must live in a flat namespace, such as a task id, URL segment, or
//! persistence path, the *sanitized* form is used instead: leading slashes
//! stripped and the remaining slashes replaced with `.`.
//!
//! The sequence `__` is reserved. It never appears in a legal service name,
//! and a legal name never starts or ends with `_` in either form, so joining
//! names with `__` never produces a `___` run. That keeps `__` usable as a
//! delimiter in task ids and stored name lists.

use thiserror::Error;

/// Reserved delimiter. Never part of a legal service name.
pub const DELIMITER: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("service name must not be empty")]
    Empty,

    #[error("service name {0:?} contains the reserved sequence \"__\"")]
    ReservedDelimiter(String),

    #[error("service name {0:?} starts or ends with '_'")]
    UnderscoreEdge(String),

    #[error("malformed task id: {0:?}")]
    MalformedTaskId(String),
}

/// Reject names that cannot be stored or embedded safely.
pub fn validate(name: &str) -> Result<(), NameError> {
    let sanitized = sanitize(name);
    if sanitized.is_empty() {
        return Err(NameError::Empty);
    }
    if name.contains(DELIMITER) {
        return Err(NameError::ReservedDelimiter(name.to_string()));
    }
    let edge = |s: &str| s.starts_with('_') || s.ends_with('_');
    if edge(name) || edge(&sanitized) {
        return Err(NameError::UnderscoreEdge(name.to_string()));
    }
    Ok(())
}

/// `/data/kafka` → `data.kafka`.
pub fn sanitize(name: &str) -> String {
    name.trim_start_matches('/').replace('/', ".")
}

/// Build a task id of the form `{sanitized}__{task_name}__{uuid}`.
pub fn task_id(sanitized_name: &str, task_name: &str) -> String {
    format!(
        "{sanitized_name}{DELIMITER}{task_name}{DELIMITER}{}",
        uuid::Uuid::new_v4()
    )
}

/// Extract the sanitized service name embedded at the front of a task id.
///
/// A `___` run is malformed: no legal name borders the delimiter with `_`.
pub fn extract_sanitized_name(task_id: &str) -> Result<&str, NameError> {
    let malformed = || NameError::MalformedTaskId(task_id.to_string());
    if task_id.contains("___") {
        return Err(malformed());
    }
    let parts: Vec<&str> = task_id.split(DELIMITER).collect();
    if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(malformed());
    }
    Ok(parts[0])
}
