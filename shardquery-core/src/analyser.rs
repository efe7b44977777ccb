//! QueryAnalyser (spec §4.6): orchestrates the lexer, classifier, filter
//! detector and the two planners to produce a persistable `QueryMetadata`.

use crate::config::{AnalysisConfig, ConsolidationConfig};
use crate::model::{ConsolidationKind, FilterSpec, PaginationStrategy, QueryMetadata};
use crate::sql;
use crate::{Error, Result};
use tracing::warn;

/// Analyse one query's SQL text end to end, producing the metadata that
/// `QueryRegistry` persists alongside it. `consolidation_config` supplies the
/// self-tuning cardinality thresholds (spec §4.5, §9) that drive the
/// aggregation-kind classification; callers typically pass the same
/// `Config::consolidation` they use for runtime drift re-estimation.
pub fn analyse(sql_text: &str, config: &AnalysisConfig, consolidation_config: &ConsolidationConfig) -> Result<QueryMetadata> {
    if sql_text.trim().is_empty() {
        return Err(Error::invalid_input("SQL text is empty"));
    }
    if sql_text.len() > config.max_sql_length {
        return Err(Error::invalid_input(format!(
            "SQL exceeds max_sql_length ({} chars)",
            config.max_sql_length
        )));
    }
    let upper = sql_text.to_uppercase();
    if !upper.contains("SELECT") || !upper.contains("FROM") {
        return Err(Error::invalid_input("SQL is missing SELECT...FROM"));
    }

    let cleaned = sql::clean(sql_text);
    let (protected, _table) = sql::protect(&cleaned)?;

    let select_text = sql::select_clause(&protected)
        .ok_or_else(|| Error::invalid_input("could not locate SELECT clause"))?;
    let select_fields = sql::split_fields_smart(&select_text);
    let group_by = sql::group_by_fields(&protected);
    let where_text = sql::where_clause(&protected).unwrap_or_default();

    let consolidation = crate::planner::plan_consolidation(&select_fields, &group_by, consolidation_config);
    let pagination = crate::planner::plan_pagination(&select_text, &group_by, config.max_sql_length)?;

    let filter_specs: Vec<FilterSpec> = sql::detect_filters(&where_text);
    for spec in filter_specs.iter().filter(|s| s.hard_coded) {
        warn!(
            column = %spec.sql_column,
            "hard-coded filter literal detected; consider a dynamic rewrite"
        );
    }
    let filter_schema = filter_specs
        .into_iter()
        .map(|spec| (spec.parameters.first().cloned().unwrap_or_default(), spec))
        .collect();

    let kind = if consolidation.consolidable {
        consolidation.kind
    } else {
        ConsolidationKind::Raw
    };

    let metadata = QueryMetadata {
        consolidable: consolidation.consolidable,
        consolidation_kind: kind,
        pagination_strategy: pagination.strategy,
        grouping_fields: consolidation.buckets.grouping,
        numeric_fields: consolidation.buckets.numeric,
        time_fields: consolidation.buckets.time,
        location_fields: consolidation.buckets.location,
        filter_schema,
        keyset_fields: pagination.keyset_fields,
        id_column: pagination.id_column,
    };

    debug_assert!(metadata.consolidable_invariant_holds());
    debug_assert!(metadata.no_pagination_invariant_holds());

    if !metadata.consolidable_invariant_holds() || !metadata.no_pagination_invariant_holds() {
        return Err(Error::invalid_input(
            "analysis produced metadata violating consolidable/pagination invariants",
        ));
    }

    Ok(metadata)
}

/// Convenience check used by callers that only need the strategy, e.g. the
/// dispatch step (§4.12), without re-running full analysis.
pub fn is_no_pagination_consolidated(strategy: PaginationStrategy, consolidable: bool) -> bool {
    strategy == PaginationStrategy::NoPagination && consolidable
}
