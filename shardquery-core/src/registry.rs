//! QueryRegistry (spec §4.6): the stable store mapping query-code to SQL
//! text, metadata and self-tuned estimate. Filter schema round-trips
//! through a JSON string column; a malformed blob degrades to an empty map
//! rather than failing the load.

use crate::model::{FilterSpec, Query, QueryMetadata};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::warn;

/// Serialise a filter schema to the JSON blob the persistence layer stores.
pub fn serialize_filter_schema(schema: &HashMap<String, FilterSpec>) -> String {
    serde_json::to_string(schema).unwrap_or_else(|_| "{}".to_string())
}

/// Deserialise a filter schema JSON blob, tolerating malformed JSON by
/// materialising an empty map and logging rather than failing the load
/// (spec §4.6).
pub fn deserialize_filter_schema(blob: &str) -> HashMap<String, FilterSpec> {
    serde_json::from_str(blob).unwrap_or_else(|err| {
        warn!(error = %err, "malformed filter_schema JSON; continuing with empty schema");
        HashMap::new()
    })
}

/// A registered query plus its analysed metadata.
#[derive(Debug, Clone)]
pub struct RegisteredQuery {
    pub query: Query,
    pub metadata: QueryMetadata,
    pub last_used: Option<chrono::NaiveDateTime>,
    pub use_count: u64,
}

/// CRUD surface the execution core needs from the query catalogue. A real
/// deployment backs this with a database table; this crate only needs the
/// contract (spec §1: the catalogue's own CRUD UI is out of scope).
pub trait QueryRegistry: Send + Sync {
    fn get(&self, code: &str) -> crate::Result<Option<RegisteredQuery>>;
    fn save(&self, query: Query, metadata: QueryMetadata) -> crate::Result<()>;
    /// Self-tuning mutation: the only permitted post-analysis change to
    /// metadata aside from `last_used`/`use_count` (spec §3 "Lifecycle").
    fn update_estimated_rows(&self, code: &str, estimated_rows: u64) -> crate::Result<()>;
    fn record_use(&self, code: &str, at: chrono::NaiveDateTime) -> crate::Result<()>;
}

/// In-memory registry suitable for tests and the CLI demo; a production
/// deployment implements the same trait against its own storage.
#[derive(Default)]
pub struct InMemoryQueryRegistry {
    entries: RwLock<HashMap<String, RegisteredQuery>>,
}

impl InMemoryQueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueryRegistry for InMemoryQueryRegistry {
    fn get(&self, code: &str) -> crate::Result<Option<RegisteredQuery>> {
        Ok(self.entries.read().get(code).cloned())
    }

    fn save(&self, query: Query, metadata: QueryMetadata) -> crate::Result<()> {
        let mut entries = self.entries.write();
        let existing = entries.get(&query.code);
        let (last_used, use_count) = existing
            .map(|e| (e.last_used, e.use_count))
            .unwrap_or((None, 0));
        entries.insert(
            query.code.clone(),
            RegisteredQuery {
                query,
                metadata,
                last_used,
                use_count,
            },
        );
        Ok(())
    }

    fn update_estimated_rows(&self, code: &str, estimated_rows: u64) -> crate::Result<()> {
        let mut entries = self.entries.write();
        match entries.get_mut(code) {
            Some(entry) => {
                entry.query.estimated_rows = Some(estimated_rows);
                Ok(())
            }
            // Best-effort self-tuning: a race with a concurrent deletion is
            // not an error (spec §5: last-write-wins, errors suppressed).
            None => Ok(()),
        }
    }

    fn record_use(&self, code: &str, at: chrono::NaiveDateTime) -> crate::Result<()> {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(code) {
            entry.last_used = Some(at);
            entry.use_count += 1;
        }
        Ok(())
    }
}
