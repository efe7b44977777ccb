//! PageCalculator (spec §4.9): builds the next filter struct for either
//! offset or keyset pagination.

use crate::keyset::KeysetManager;
use crate::memory::MemoryMonitor;
use crate::model::{CursorState, FilterParams};

pub struct PageCalculator<'a> {
    pub keyset: &'a KeysetManager,
    pub memory: &'a MemoryMonitor,
}

impl<'a> PageCalculator<'a> {
    pub fn new(keyset: &'a KeysetManager, memory: &'a MemoryMonitor) -> Self {
        Self { keyset, memory }
    }

    /// Optimal page size for `base`, floored at `default_batch_size`
    /// (spec §4.9: "Optimal size = MemoryMonitor.optimalBatchSize(max(default, base))").
    pub fn optimal_size(&self, default_batch_size: u64, base: u64) -> u64 {
        self.memory.optimal_batch_size(default_batch_size.max(base))
    }

    /// Clear every cursor field and set `limit` only.
    pub fn first_page(&self, filters: &mut FilterParams, batch_size: u64) {
        filters.clear_pagination();
        filters.limit = Some(batch_size);
    }

    /// Clear the cursor and set `limit`/`offset` for offset pagination.
    pub fn with_offset(&self, filters: &mut FilterParams, batch_size: u64, offset: u64) {
        filters.clear_pagination();
        filters.limit = Some(batch_size);
        filters.offset = Some(offset);
    }

    /// Populate cursor fields from the manager's saved state for
    /// `province`. Rejects a pre-existing `offset` (a cursor and an offset
    /// never coexist). Falls back to `first_page` when no cursor state is
    /// recorded yet.
    pub fn with_keyset(&self, filters: &mut FilterParams, batch_size: u64, province: &str) {
        filters.clear_pagination();
        filters.limit = Some(batch_size);

        match self.keyset.get(province) {
            Some(CursorState::Standard { id, serie, place }) => {
                filters.last_id = Some(id);
                filters.last_serie = serie;
                filters.last_place = place;
            }
            Some(CursorState::Consolidated { col0, col1, col2 }) => {
                if let Some(v) = col0 {
                    filters.consolidated_key.insert("campo_0".to_string(), v);
                }
                if let Some(v) = col1 {
                    filters.consolidated_key.insert("campo_1".to_string(), v);
                }
                if let Some(v) = col2 {
                    filters.consolidated_key.insert("campo_2".to_string(), v);
                }
            }
            None => {}
        }
    }

    /// `shouldContinue(returned, batchSize) ⇔ returned ≥ batchSize`.
    pub fn should_continue(returned: u64, batch_size: u64) -> bool {
        returned >= batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::types::{Row, Value};

    #[test]
    fn first_page_clears_cursor_and_sets_limit() {
        let keyset = KeysetManager::new();
        let memory = MemoryMonitor::new(MemoryConfig::default());
        let calc = PageCalculator::new(&keyset, &memory);
        let mut filters = FilterParams {
            offset: Some(50),
            last_id: Some(7),
            ..Default::default()
        };
        calc.first_page(&mut filters, 1_000);
        assert_eq!(filters.limit, Some(1_000));
        assert!(filters.offset.is_none());
        assert!(filters.last_id.is_none());
    }

    #[test]
    fn with_keyset_falls_back_to_first_page_when_no_state() {
        let keyset = KeysetManager::new();
        let memory = MemoryMonitor::new(MemoryConfig::default());
        let calc = PageCalculator::new(&keyset, &memory);
        let mut filters = FilterParams::default();
        calc.with_keyset(&mut filters, 1_000, "cordoba");
        assert!(!filters.has_cursor());
        assert_eq!(filters.limit, Some(1_000));
    }

    #[test]
    fn with_keyset_populates_standard_cursor() {
        let keyset = KeysetManager::new();
        let mut row = Row::new();
        row.set("id", Value::Integer(42));
        keyset.save(&row, "cordoba");
        let memory = MemoryMonitor::new(MemoryConfig::default());
        let calc = PageCalculator::new(&keyset, &memory);
        let mut filters = FilterParams::default();
        calc.with_keyset(&mut filters, 1_000, "cordoba");
        assert_eq!(filters.last_id, Some(42));
        assert!(filters.cursor_offset_invariant_holds());
    }

    #[test]
    fn should_continue_matches_spec_definition() {
        assert!(PageCalculator::should_continue(1_000, 1_000));
        assert!(!PageCalculator::should_continue(999, 1_000));
    }
}
