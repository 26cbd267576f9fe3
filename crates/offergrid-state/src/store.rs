//! StateStore — redb-backed `Persister` for Offergrid.
//!
//! Every stored value lives in one table keyed by its normalized path.
//! Subtree operations (`delete`, `children`) are prefix scans over that
//! table. The store supports both on-disk and in-memory backends (the
//! latter for testing).

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::persister::{Persister, normalize};
use crate::tables::NODES;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create the table if it doesn't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// All stored keys equal to `key` or beneath it.
    ///
    /// Keys beneath `key` share the `key/` prefix and so sort contiguously;
    /// the scan starts there and stops at the first key outside it.
    fn subtree_keys(&self, key: &str) -> StateResult<Vec<String>> {
        let prefix = format!("{key}/");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut keys = Vec::new();
        if table.get(key).map_err(map_err!(Read))?.is_some() {
            keys.push(key.to_string());
        }
        for entry in table.range(prefix.as_str()..).map_err(map_err!(Read))? {
            let (k, _) = entry.map_err(map_err!(Read))?;
            let k = k.value();
            if !k.starts_with(&prefix) {
                break;
            }
            keys.push(k.to_string());
        }
        Ok(keys)
    }
}

impl Persister for StateStore {
    fn set(&self, path: &str, value: &[u8]) -> StateResult<()> {
        let key = normalize(path)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value)
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, bytes = value.len(), "value stored");
        Ok(())
    }

    fn get(&self, path: &str) -> StateResult<Vec<u8>> {
        let key = normalize(path)?;
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => Ok(guard.value().to_vec()),
            None => Err(StateError::NotFound(key)),
        }
    }

    fn delete(&self, path: &str) -> StateResult<()> {
        let key = normalize(path)?;
        // Collect keys in a read transaction first.
        let keys = self.subtree_keys(&key)?;
        if keys.is_empty() {
            return Err(StateError::NotFound(key));
        }
        // Delete in a write transaction.
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            for k in &keys {
                table.remove(k.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, removed = keys.len(), "subtree deleted");
        Ok(())
    }

    fn children(&self, path: &str) -> StateResult<Vec<String>> {
        let key = normalize(path)?;
        let keys = self.subtree_keys(&key)?;
        if keys.is_empty() {
            return Err(StateError::NotFound(key));
        }
        let prefix = format!("{key}/");
        let names: BTreeSet<String> = keys
            .iter()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(str::to_string)
            .collect();
        Ok(names.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        store.set("Services/hello/Config", b"v1").unwrap();
        assert_eq!(store.get("Services/hello/Config").unwrap(), b"v1");
        assert_eq!(store.get("/Services/hello/Config/").unwrap(), b"v1");
    }

    #[test]
    fn set_overwrites() {
        let store = StateStore::open_in_memory().unwrap();
        store.set("a", b"1").unwrap();
        store.set("a", b"2").unwrap();
        assert_eq!(store.get("a").unwrap(), b"2");
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.get("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn empty_value_is_distinct_from_missing() {
        let store = StateStore::open_in_memory().unwrap();
        store.set("empty", b"").unwrap();
        assert_eq!(store.get("empty").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn delete_removes_subtree_only() {
        let store = StateStore::open_in_memory().unwrap();
        store.set("Services/a/Tasks/t1", b"x").unwrap();
        store.set("Services/a/Config", b"y").unwrap();
        store.set("Services/ab/Config", b"z").unwrap();

        store.delete("Services/a").unwrap();
        assert!(store.get("Services/a/Tasks/t1").unwrap_err().is_not_found());
        assert!(store.get("Services/a/Config").unwrap_err().is_not_found());
        // Sibling sharing a name prefix is untouched.
        assert_eq!(store.get("Services/ab/Config").unwrap(), b"z");
    }

    #[test]
    fn subtree_scan_skips_keys_sorting_between_node_and_children() {
        let store = StateStore::open_in_memory().unwrap();
        // `-` and `.` sort before `/`, `0` after it.
        store.set("Services/a", b"node").unwrap();
        store.set("Services/a-b/Config", b"1").unwrap();
        store.set("Services/a.b/Config", b"2").unwrap();
        store.set("Services/a/Config", b"3").unwrap();
        store.set("Services/a/Tasks/t1", b"4").unwrap();
        store.set("Services/a0/Config", b"5").unwrap();

        assert_eq!(
            store.subtree_keys("Services/a").unwrap(),
            vec!["Services/a", "Services/a/Config", "Services/a/Tasks/t1"]
        );
        assert_eq!(store.children("Services/a").unwrap(), vec!["Config", "Tasks"]);

        store.delete("Services/a").unwrap();
        for kept in ["Services/a-b/Config", "Services/a.b/Config", "Services/a0/Config"] {
            assert!(store.get(kept).is_ok(), "{kept} should survive");
        }
    }

    #[test]
    fn delete_missing_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.delete("nothing/here").unwrap_err().is_not_found());
    }

    #[test]
    fn children_lists_immediate_names() {
        let store = StateStore::open_in_memory().unwrap();
        store.set("Services/b/Config", b"1").unwrap();
        store.set("Services/a/Tasks/t1", b"2").unwrap();
        store.set("Services/a/Config", b"3").unwrap();

        assert_eq!(store.children("Services").unwrap(), vec!["a", "b"]);
        assert_eq!(store.children("Services/a").unwrap(), vec!["Config", "Tasks"]);
        assert!(store.children("Services/a/Config").unwrap().is_empty());
        assert!(store.children("Other").unwrap_err().is_not_found());
    }

    #[test]
    fn root_path_is_rejected() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(matches!(store.set("/", b"x"), Err(StateError::InvalidPath(_))));
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.set("ReserveDiscipline/SelectedServices", b"a__b").unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        assert_eq!(store.get("ReserveDiscipline/SelectedServices").unwrap(), b"a__b");
    }
}
