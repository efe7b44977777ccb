//! KeysetManager (spec §4.8): per-shard cursor state, backed by a
//! lock-free map since writes are single-writer-per-province and readers
//! only ever read their own province (spec §5).

use crate::model::CursorState;
use crate::types::{Row, Value};
use dashmap::DashMap;

/// Pinned deterministic field ordering for consolidated cursors (spec
/// §9(b)): the order columns appear in the query's `GROUP BY` list, i.e.
/// the order `ConsolidationPlanner`/`PaginationPlanner` recorded them in.
pub struct KeysetManager {
    state: DashMap<String, CursorState>,
}

impl Default for KeysetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl KeysetManager {
    pub fn new() -> Self {
        Self {
            state: DashMap::new(),
        }
    }

    pub fn get(&self, province: &str) -> Option<CursorState> {
        self.state.get(province).map(|e| e.clone())
    }

    /// Inspect the last row of the just-emitted batch and persist the
    /// resulting cursor for `province`. If `id` is present and non-null,
    /// save a `Standard` cursor; otherwise take the first (in the row's own
    /// insertion order, per §9(b)) up to three non-null values as
    /// `Consolidated`.
    pub fn save(&self, last_row: &Row, province: &str) {
        if let Some(Value::Integer(id)) = last_row.get("id") {
            let serie = last_row.get("serie_equipo").cloned();
            let place = last_row.get("lugar").cloned();
            self.state.insert(
                province.to_string(),
                CursorState::Standard {
                    id: *id,
                    serie,
                    place,
                },
            );
            return;
        }

        let mut non_null = last_row
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(_, v)| v.clone());
        self.state.insert(
            province.to_string(),
            CursorState::Consolidated {
                col0: non_null.next(),
                col1: non_null.next(),
                col2: non_null.next(),
            },
        );
    }

    pub fn clear(&self, province: &str) {
        self.state.remove(province);
    }
}

/// `isStandard(tuple) ⇔ len≥1 ∧ tuple[0]` is integer-typed.
pub fn is_standard(cursor: &CursorState) -> bool {
    matches!(cursor, CursorState::Standard { .. })
}
