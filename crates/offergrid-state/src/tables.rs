//! redb table definitions for the Offergrid state store.

use redb::TableDefinition;

/// Stored values keyed by their full slash-separated path.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");
