//! The `Persister` interface — path-addressed byte storage.
//!
//! Paths are `/`-separated. Leading, trailing, and repeated separators are
//! ignored, so `a/b`, `/a/b` and `a//b/` all name the same node.

use crate::error::{StateError, StateResult};

/// Byte storage addressed by slash-separated paths.
///
/// Implementations must be safe to share between threads and must report a
/// missing path as [`StateError::NotFound`], distinct from other failures.
pub trait Persister: Send + Sync {
    /// Store `value` at `path`, replacing any previous value.
    fn set(&self, path: &str, value: &[u8]) -> StateResult<()>;

    /// Fetch the value at `path`.
    fn get(&self, path: &str) -> StateResult<Vec<u8>>;

    /// Delete `path` and everything beneath it.
    fn delete(&self, path: &str) -> StateResult<()>;

    /// Names of the immediate children of `path`, sorted.
    fn children(&self, path: &str) -> StateResult<Vec<String>>;
}

/// Join path segments with `/`.
pub fn join_path(segments: &[&str]) -> String {
    segments.join("/")
}

/// Canonical form used as the table key.
pub(crate) fn normalize(path: &str) -> StateResult<String> {
    let normalized = path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if normalized.is_empty() {
        return Err(StateError::InvalidPath(path.to_string()));
    }
    Ok(normalized)
}
