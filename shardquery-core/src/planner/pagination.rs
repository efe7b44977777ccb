//! PaginationPlanner (spec §4.4): picks a pagination strategy from the
//! cleaned SELECT text, the presence of a usable `id` column, and a fixed,
//! ordered list of keyset-candidate columns.

use crate::model::{KeysetField, PaginationStrategy};
use crate::types::DataType;
use once_cell::sync::Lazy;
use regex::Regex;

/// Fixed, ordered candidate list (spec §4.4). Priorities are assigned in
/// the order candidates are *discovered* in the SELECT list, not this
/// table's order.
const CANDIDATE_COLUMNS: &[(&str, DataType)] = &[
    ("serie_equipo", DataType::Text),
    ("id_tipo_infra", DataType::Integer),
    ("fecha_infraccion", DataType::Date),
    ("id_estado", DataType::Integer),
    ("id_punto_control", DataType::Integer),
    ("packedfile", DataType::Text),
];

static ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(i|infracciones)\.id\b(?:\s+AS\s+(\w+))?").unwrap()
});

static AGGREGATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(SUM|COUNT|AVG|MIN|MAX)\s*\(").unwrap()
});

/// Result of `detect_id_column`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdColumn {
    pub alias: String,
}

/// Detect whether the SELECT exposes an infraction id column, with its
/// explicit alias if any, defaulting the alias to `"id"`.
pub fn detect_id_column(select_text: &str) -> Option<IdColumn> {
    let caps = ID_RE.captures(select_text)?;
    let alias = caps
        .get(2)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "id".to_string());
    Some(IdColumn { alias })
}

/// Candidate keyset columns present in the SELECT list, in discovery order,
/// rejecting a second temporal candidate once one has been chosen.
pub fn candidate_keyset_columns(select_text: &str) -> Vec<KeysetField> {
    let mut fields = Vec::new();
    let mut has_temporal = false;
    let mut priority = 0i32;

    for (column, data_type) in CANDIDATE_COLUMNS {
        if !select_text.to_lowercase().contains(column) {
            continue;
        }
        if matches!(data_type, DataType::Date | DataType::Timestamp) {
            if has_temporal {
                continue;
            }
            has_temporal = true;
        }
        fields.push(KeysetField {
            column_ref: column.to_string(),
            parameter_name: camel_case_last(column),
            data_type: *data_type,
            priority,
        });
        priority += 1;
    }
    fields
}

/// Derive a `last<Column>` camelCase parameter name (spec §3 `KeysetField`).
fn camel_case_last(column: &str) -> String {
    let mut camel = String::new();
    let mut capitalise_next = true;
    for ch in column.chars() {
        if ch == '_' {
            capitalise_next = true;
            continue;
        }
        if capitalise_next {
            camel.extend(ch.to_uppercase());
            capitalise_next = false;
        } else {
            camel.push(ch);
        }
    }
    format!("last{camel}")
}

/// Whether the SELECT list contains at least one aggregate function call.
pub fn has_aggregate_function(select_text: &str) -> bool {
    AGGREGATE_RE.is_match(select_text)
}

/// Output of the pagination planning step.
#[derive(Debug, Clone)]
pub struct PaginationPlan {
    pub strategy: PaginationStrategy,
    pub id_column: Option<String>,
    pub keyset_fields: Vec<KeysetField>,
}

/// Choose a pagination strategy per spec §4.4's decision table. `group_by`
/// is the list already extracted by `sql::group_by_fields`; `has_aggregate`
/// mirrors whether the SELECT list carries an aggregate function.
pub fn plan_pagination(
    select_text: &str,
    group_by: &[String],
    max_sql_length: usize,
) -> crate::Result<PaginationPlan> {
    if select_text.len() > max_sql_length {
        return Err(crate::Error::invalid_input(format!(
            "SELECT text exceeds max_sql_length ({max_sql_length} chars)"
        )));
    }

    let id = detect_id_column(select_text);
    let candidates = candidate_keyset_columns(select_text);

    if !group_by.is_empty() && has_aggregate_function(select_text) {
        let keyset_fields = group_by
            .iter()
            .take(3)
            .enumerate()
            .map(|(i, expr)| KeysetField {
                column_ref: expr.clone(),
                parameter_name: format!("campo_{i}"),
                data_type: DataType::Text,
                priority: i as i32,
            })
            .collect();
        return Ok(PaginationPlan {
            strategy: PaginationStrategy::NoPagination,
            id_column: None,
            keyset_fields,
        });
    }

    let strategy = match (id.is_some(), candidates.is_empty()) {
        (true, false) => PaginationStrategy::KeysetWithId,
        (true, true) => PaginationStrategy::CompositeKey,
        (false, false) => PaginationStrategy::KeysetConsolidated,
        (false, true) => {
            if can_support_offset(select_text) {
                PaginationStrategy::Offset
            } else {
                PaginationStrategy::LimitOnlyFallback
            }
        }
    };

    Ok(PaginationPlan {
        strategy,
        id_column: id.map(|i| i.alias),
        keyset_fields: candidates,
    })
}

/// A SELECT with no deterministic ordering column can't safely page by
/// OFFSET (result sets would drift between pages); require at least one
/// recognisable ORDER-able column. This is only reached once neither an id
/// column nor a keyset candidate was found, so a bare wildcard (`*`, `i.*`)
/// that names nothing at all is the remaining failure case: there's no
/// column left to stabilise ordering across pages.
fn can_support_offset(select_text: &str) -> bool {
    let trimmed = select_text.trim();
    if trimmed.is_empty() {
        return false;
    }
    trimmed.split(',').any(|field| !field.trim().ends_with('*'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyset_with_id_when_id_and_candidates_present() {
        let sql = "i.id AS id_infraccion, i.serie_equipo, i.lugar";
        let plan = plan_pagination(sql, &[], 100_000).unwrap();
        assert_eq!(plan.strategy, PaginationStrategy::KeysetWithId);
        assert_eq!(plan.id_column, Some("id_infraccion".to_string()));
        assert_eq!(plan.keyset_fields.len(), 1);
    }

    #[test]
    fn composite_key_when_id_but_no_candidates() {
        let sql = "i.id AS id_infraccion, i.monto";
        let plan = plan_pagination(sql, &[], 100_000).unwrap();
        assert_eq!(plan.strategy, PaginationStrategy::CompositeKey);
    }

    #[test]
    fn no_pagination_for_group_by_with_aggregate() {
        let sql = "provincia, COUNT(*) AS total";
        let plan = plan_pagination(sql, &["provincia".to_string()], 100_000).unwrap();
        assert_eq!(plan.strategy, PaginationStrategy::NoPagination);
        assert_eq!(plan.keyset_fields.len(), 1);
    }

    #[test]
    fn rejects_candidates_with_two_temporal_fields() {
        let sql = "i.fecha_infraccion, i.id_estado";
        let fields = candidate_keyset_columns(sql);
        let temporal_count = fields
            .iter()
            .filter(|f| matches!(f.data_type, DataType::Date | DataType::Timestamp))
            .count();
        assert_eq!(temporal_count, 1);
    }

    #[test]
    fn wildcard_select_with_no_candidates_falls_back_to_limit_only() {
        let plan = plan_pagination("*", &[], 100_000).unwrap();
        assert_eq!(plan.strategy, PaginationStrategy::LimitOnlyFallback);
        assert!(plan.id_column.is_none());
        assert!(plan.keyset_fields.is_empty());
    }

    #[test]
    fn named_columns_with_no_candidates_still_use_offset() {
        let plan = plan_pagination("i.monto, i.descripcion", &[], 100_000).unwrap();
        assert_eq!(plan.strategy, PaginationStrategy::Offset);
    }

    #[test]
    fn rejects_oversize_sql() {
        let huge = "x".repeat(200_000);
        assert!(plan_pagination(&huge, &[], 100_000).is_err());
    }

    #[test]
    fn parameter_name_is_camel_cased_with_last_prefix() {
        assert_eq!(camel_case_last("serie_equipo"), "lastSerieEquipo");
    }
}
