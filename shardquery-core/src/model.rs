//! Persisted data model (spec §3): queries, their analysed metadata, filter
//! schema, keyset fields, cursor state and per-request filter parameters.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle status of a registered query (§3 "Lifecycle").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    Pending,
    Analysed,
    Error,
    Registered,
    Obsolete,
}

/// A named, parameterised SQL query shipped to every shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub code: String,
    pub sql: String,
    pub category: String,
    pub created_at: chrono::NaiveDateTime,
    pub version: u32,
    pub active: bool,
    pub estimated_rows: Option<u64>,
    pub max_limit: u64,
    pub status: QueryStatus,
    pub tags: Vec<String>,
}

impl Query {
    pub fn new(code: impl Into<String>, sql: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            sql: sql.into(),
            category: category.into(),
            created_at: chrono::NaiveDateTime::UNIX_EPOCH,
            version: 1,
            active: true,
            estimated_rows: None,
            max_limit: 100_000,
            status: QueryStatus::Pending,
            tags: Vec::new(),
        }
    }
}

/// The kind of consolidation an analysed query was classified into (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsolidationKind {
    Aggregation,
    AggregationStreaming,
    AggregationHighVolume,
    Raw,
    RawStreaming,
    Dedup,
    Hierarchical,
    Combined,
    ForceAggregation,
}

impl ConsolidationKind {
    /// Ordinal used to check the monotonicity invariant from spec §8:
    /// AGGREGATION < AGGREGATION_STREAMING < AGGREGATION_HIGH_VOLUME.
    pub fn aggregation_rank(self) -> Option<u8> {
        match self {
            ConsolidationKind::Aggregation => Some(0),
            ConsolidationKind::AggregationStreaming => Some(1),
            ConsolidationKind::AggregationHighVolume => Some(2),
            _ => None,
        }
    }
}

/// Pagination strategy chosen by `PaginationPlanner` (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaginationStrategy {
    KeysetWithId,
    CompositeKey,
    KeysetConsolidated,
    Offset,
    NoPagination,
    LimitOnlyFallback,
}

/// The kind of UI-level filter a `FilterSpec` describes (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    DateRange,
    Boolean,
    ArrayInteger,
    ArrayText,
    TextExact,
    TextLike,
}

/// A UI-facing description of one detected WHERE-clause filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub sql_column: String,
    pub label: String,
    pub parameters: Vec<String>,
    pub data_type: crate::types::DataType,
    pub multivalued: bool,
    pub required: bool,
    pub options: Option<Vec<String>>,
    /// Set when the analyser found a hard-coded literal in place of a
    /// dynamic predicate (spec §4.3, scenario 6).
    pub hard_coded: bool,
}

/// A candidate keyset column (§3 `KeysetField`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysetField {
    pub column_ref: String,
    pub parameter_name: String,
    pub data_type: crate::types::DataType,
    pub priority: i32,
}

/// 1:1 analysis result attached to a `Query` (§3 `QueryMetadata`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub consolidable: bool,
    pub consolidation_kind: ConsolidationKind,
    pub pagination_strategy: PaginationStrategy,
    pub grouping_fields: Vec<String>,
    pub numeric_fields: Vec<String>,
    pub time_fields: Vec<String>,
    pub location_fields: Vec<String>,
    pub filter_schema: HashMap<String, FilterSpec>,
    pub keyset_fields: Vec<KeysetField>,
    pub id_column: Option<String>,
}

impl QueryMetadata {
    /// Invariant from §3: `Consolidable ⇒ groupingFields ∪ numericFields ≠ ∅`.
    pub fn consolidable_invariant_holds(&self) -> bool {
        !self.consolidable || !(self.grouping_fields.is_empty() && self.numeric_fields.is_empty())
    }

    /// Invariant from §3: `paginationStrategy = NO_PAGINATION ⇒ consolidable`.
    pub fn no_pagination_invariant_holds(&self) -> bool {
        self.pagination_strategy != PaginationStrategy::NoPagination || self.consolidable
    }
}

/// Either a standard (id/serie/place) or consolidated (first three non-null
/// column values) keyset cursor. §3 `CursorState`, §4.8 `KeysetManager`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CursorState {
    Standard {
        id: i64,
        serie: Option<crate::types::Value>,
        place: Option<crate::types::Value>,
    },
    Consolidated {
        col0: Option<crate::types::Value>,
        col1: Option<crate::types::Value>,
        col2: Option<crate::types::Value>,
    },
}

/// Per-shard dataset size estimate (§3 `EstimationResult`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub total: u64,
    pub mean: u64,
    pub max: u64,
}

impl EstimationResult {
    pub fn from_counts(counts: &[u64]) -> Self {
        if counts.is_empty() {
            return Self { total: 0, mean: 0, max: 0 };
        }
        let total: u64 = counts.iter().sum();
        let mean = total / counts.len() as u64;
        let max = *counts.iter().max().unwrap();
        Self { total, mean, max }
    }
}

/// Request-scoped filter bag carrying shared filter keys, pagination keys and
/// the keyset cursor (§3 `FilterParams`). `ShardStore` implementations
/// interpret `extra` to bind query-specific WHERE predicates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterParams {
    pub specific_date: Option<chrono::NaiveDate>,
    pub date_from: Option<chrono::NaiveDate>,
    pub date_to: Option<chrono::NaiveDate>,
    pub extra: HashMap<String, Vec<String>>,

    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub last_id: Option<i64>,
    pub last_serie: Option<crate::types::Value>,
    pub last_place: Option<crate::types::Value>,
    pub consolidated_key: HashMap<String, crate::types::Value>,
}

impl FilterParams {
    /// Clear every pagination/cursor field (used before (re)setting one
    /// kind of pagination; §4.9 `firstPage`/`withOffset`).
    pub fn clear_pagination(&mut self) {
        self.limit = None;
        self.offset = None;
        self.last_id = None;
        self.last_serie = None;
        self.last_place = None;
        self.consolidated_key.clear();
    }

    /// A cursor is never combined with `offset`: invariant from §3.
    pub fn has_cursor(&self) -> bool {
        self.last_id.is_some() || !self.consolidated_key.is_empty()
    }

    pub fn cursor_offset_invariant_holds(&self) -> bool {
        !self.has_cursor() || self.offset.is_none()
    }
}
