//! ConsolidationPlanner (spec §4.5): buckets classified fields, decides
//! whether a query is consolidable, and — for GROUP BY queries — estimates
//! result cardinality to pick an `AGGREGATION*` consolidation kind.

use crate::config::ConsolidationConfig;
use crate::model::ConsolidationKind;
use crate::sql::{classify, FieldKind};

/// Buckets produced from the SELECT list (`AnalisisConsolidacion` base).
#[derive(Debug, Clone, Default)]
pub struct FieldBuckets {
    pub grouping: Vec<String>,
    pub numeric: Vec<String>,
    pub time: Vec<String>,
    pub location: Vec<String>,
}

/// Bucket every SELECT expression by its classified field kind. Grouping
/// fields are every non-numeric, non-computed/detail field (i.e. anything a
/// GROUP BY could reasonably key on): location, time, identifier and
/// categorisation kinds.
pub fn bucket_fields(select_fields: &[String]) -> FieldBuckets {
    let mut buckets = FieldBuckets::default();
    for expr in select_fields {
        let field = classify(expr);
        match field.kind {
            FieldKind::NumericSum | FieldKind::NumericCount => buckets.numeric.push(field.final_name),
            FieldKind::Time => {
                buckets.time.push(field.final_name.clone());
                buckets.grouping.push(field.final_name);
            }
            FieldKind::Location => {
                buckets.location.push(field.final_name.clone());
                buckets.grouping.push(field.final_name);
            }
            FieldKind::Identifier | FieldKind::Categorisation => buckets.grouping.push(field.final_name),
            FieldKind::Computed | FieldKind::Detail => {}
        }
    }
    if buckets.location.is_empty() && (!buckets.numeric.is_empty() || !buckets.grouping.is_empty()) {
        buckets.location.push("provincia".to_string());
    }
    buckets
}

/// A query is consolidable iff grouping ∪ numeric is non-empty (spec §4.5).
pub fn is_consolidable(buckets: &FieldBuckets) -> bool {
    !buckets.grouping.is_empty() || !buckets.numeric.is_empty()
}

/// Cardinality-product estimate for a GROUP BY query, capped at 10^7, plus
/// the confidence ratio (#known / #total columns).
pub fn estimate_group_by_cardinality(group_by_columns: &[String], cap: u64) -> (u64, f64) {
    if group_by_columns.is_empty() {
        return (0, 1.0);
    }
    let mut product: u64 = 1;
    let mut known = 0usize;
    for col in group_by_columns {
        let field = classify(col);
        let cardinality = crate::sql::classifier::cardinality_for(&field.final_name, field.kind);
        if crate::sql::classifier::known_cardinality(&field.final_name).is_some() {
            known += 1;
        }
        product = product.saturating_mul(cardinality).min(cap);
    }
    let confidence = known as f64 / group_by_columns.len() as f64;
    (product.min(cap), confidence)
}

/// Choose a consolidation kind for a GROUP BY query from its cardinality
/// estimate, honouring the monotonicity contract from spec §4.5 and §8:
/// increasing `estimate` never selects a cheaper kind.
pub fn choose_kind_from_estimate(
    estimate: u64,
    agg_memory_threshold: u64,
    agg_streaming_threshold: u64,
) -> ConsolidationKind {
    if estimate < agg_memory_threshold {
        ConsolidationKind::Aggregation
    } else if estimate < agg_streaming_threshold {
        ConsolidationKind::AggregationStreaming
    } else {
        ConsolidationKind::AggregationHighVolume
    }
}

/// Plan produced for the query as a whole.
#[derive(Debug, Clone)]
pub struct ConsolidationPlan {
    pub buckets: FieldBuckets,
    pub consolidable: bool,
    pub kind: ConsolidationKind,
    pub cardinality_estimate: Option<u64>,
    pub confidence: Option<f64>,
}

/// Full consolidation plan: buckets fields, decides consolidability, and —
/// only for GROUP BY queries — estimates cardinality and picks a kind. A
/// query without GROUP BY is marked `RAW`; its kind is only finalised after
/// a runtime `COUNT(*)` (§4.5 "For a query without GROUP BY").
pub fn plan_consolidation(
    select_fields: &[String],
    group_by: &[String],
    config: &ConsolidationConfig,
) -> ConsolidationPlan {
    let buckets = bucket_fields(select_fields);
    let consolidable = is_consolidable(&buckets);

    if group_by.is_empty() {
        return ConsolidationPlan {
            buckets,
            consolidable,
            kind: ConsolidationKind::Raw,
            cardinality_estimate: None,
            confidence: None,
        };
    }

    let (estimate, confidence) = estimate_group_by_cardinality(group_by, config.max_cardinality_estimate);
    let kind = choose_kind_from_estimate(estimate, config.agg_memory_threshold, config.agg_streaming_threshold);

    ConsolidationPlan {
        buckets,
        consolidable,
        kind,
        cardinality_estimate: Some(estimate),
        confidence: Some(confidence),
    }
}
