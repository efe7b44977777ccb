//! FilterDetector (spec §4.3): scans a WHERE clause for date, boolean and
//! array-valued filters and emits UI-level `FilterSpec`s, flagging
//! hard-coded literals as rewrite candidates.

use crate::model::{FilterKind, FilterSpec};
use crate::types::DataType;
use once_cell::sync::Lazy;
use regex::Regex;

/// Columns recognised as array-valued ("state"/"infraction-type"/
/// "concession" family) filters, in the order FilterDetector tries them.
const ARRAY_FILTER_COLUMNS: &[(&str, &str)] = &[
    ("id_estado", "state"),
    ("id_tipo_infra", "infraction_type"),
    ("id_concesion", "concession"),
];

const BOOLEAN_COLUMNS: &[&str] = &["exporta_sacit", "es_reincidente", "tiene_descuento"];

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\w+)\.(\w*fecha\w*)\s*(>=|<=|>|<|=|BETWEEN)").unwrap()
});

fn array_any_re(column: &str) -> Regex {
    Regex::new(&format!(r"(?i){column}\s*=\s*ANY\s*\(")).unwrap()
}
fn array_in_re(column: &str) -> Regex {
    Regex::new(&format!(r"(?i){column}\s+IN\s*\(")).unwrap()
}
fn array_eq_literal_re(column: &str) -> Regex {
    Regex::new(&format!(r"(?i){column}\s*=\s*(\d+)")).unwrap()
}
fn boolean_in_re(column: &str) -> Regex {
    Regex::new(&format!(r"(?i){column}\s+IN\s*\(")).unwrap()
}
fn boolean_eq_re(column: &str) -> Regex {
    Regex::new(&format!(r"(?i){column}\s*=\s*(TRUE|FALSE|\d)")).unwrap()
}

/// snake_case -> Title Case with ad-hoc prefix stripping (`id_`, `cod_`).
fn humanise_label(column_suffix: &str) -> String {
    let stripped = column_suffix
        .strip_prefix("id_")
        .or_else(|| column_suffix.strip_prefix("cod_"))
        .unwrap_or(column_suffix);
    stripped
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Detect the date-range filter, if the WHERE clause references a `*fecha*`
/// column via a comparison or `BETWEEN`.
pub fn detect_date_filter(where_clause: &str) -> Option<FilterSpec> {
    let caps = DATE_RE.captures(where_clause)?;
    let column = &caps[2];
    let table = &caps[1];
    Some(FilterSpec {
        kind: FilterKind::DateRange,
        sql_column: format!("{table}.{column}"),
        label: format!("Fecha de {}", humanise_label(column)),
        parameters: vec![
            "specificDate".to_string(),
            "dateFrom".to_string(),
            "dateTo".to_string(),
        ],
        data_type: DataType::Date,
        multivalued: false,
        required: false,
        options: None,
        hard_coded: false,
    })
}

/// Detect array-valued filters (state / infraction-type / concession),
/// using priority `ANY(...) > IN(...) > = <integer literal>` (spec §9(c)).
pub fn detect_array_filters(where_clause: &str) -> Vec<FilterSpec> {
    let mut specs = Vec::new();
    for (column, label_key) in ARRAY_FILTER_COLUMNS {
        let (found, hard_coded) = if array_any_re(column).is_match(where_clause) {
            (true, false)
        } else if array_in_re(column).is_match(where_clause) {
            (true, false)
        } else if array_eq_literal_re(column).is_match(where_clause) {
            (true, true)
        } else {
            (false, false)
        };

        if found {
            specs.push(FilterSpec {
                kind: FilterKind::ArrayInteger,
                sql_column: format!("i.{column}"),
                label: format!("{}", humanise_label(label_key)),
                parameters: vec![label_key.to_string()],
                data_type: DataType::Integer,
                multivalued: true,
                required: false,
                options: None,
                hard_coded,
            });
        }
    }
    specs
}

/// Detect boolean filters (`exporta_sacit` and friends), priority
/// `ANY > IN > equals` applied the same way as array filters (spec §9(c)).
pub fn detect_boolean_filters(where_clause: &str) -> Vec<FilterSpec> {
    let mut specs = Vec::new();
    for column in BOOLEAN_COLUMNS {
        let found = array_any_re(column).is_match(where_clause)
            || boolean_in_re(column).is_match(where_clause)
            || boolean_eq_re(column).is_match(where_clause);

        if found {
            specs.push(FilterSpec {
                kind: FilterKind::Boolean,
                sql_column: format!("i.{column}"),
                label: humanise_label(column),
                parameters: vec![column.to_string()],
                data_type: DataType::Boolean,
                multivalued: false,
                required: false,
                options: Some(vec!["true".to_string(), "false".to_string()]),
                hard_coded: false,
            });
        }
    }
    specs
}

/// Run every detector over a WHERE clause and collect the filter schema,
/// keyed by the label-derived parameter name.
pub fn detect_filters(where_clause: &str) -> Vec<FilterSpec> {
    let mut specs = Vec::new();
    specs.extend(detect_date_filter(where_clause));
    specs.extend(detect_array_filters(where_clause));
    specs.extend(detect_boolean_filters(where_clause));
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_date_range_with_parameters() {
        let spec = detect_date_filter("i.fecha_infraccion >= :dateFrom AND i.fecha_infraccion <= :dateTo").unwrap();
        assert_eq!(spec.kind, FilterKind::DateRange);
        assert_eq!(spec.parameters, vec!["specificDate", "dateFrom", "dateTo"]);
        assert_eq!(spec.label, "Fecha de Infraccion");
    }

    #[test]
    fn detects_hard_coded_state_filter() {
        let specs = detect_array_filters("i.id_estado = 340");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, FilterKind::ArrayInteger);
        assert!(specs[0].multivalued);
        assert!(specs[0].hard_coded);
    }

    #[test]
    fn any_form_is_not_flagged_hard_coded() {
        let specs = detect_array_filters("i.id_estado = ANY(:states)");
        assert_eq!(specs.len(), 1);
        assert!(!specs[0].hard_coded);
    }

    #[test]
    fn in_form_beats_equals_when_both_absent_for_equals() {
        let specs = detect_array_filters("i.id_tipo_infra IN (1, 2, 3)");
        assert_eq!(specs.len(), 1);
        assert!(!specs[0].hard_coded);
    }

    #[test]
    fn detects_boolean_filter() {
        let specs = detect_boolean_filters("i.exporta_sacit = TRUE");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, FilterKind::Boolean);
        assert_eq!(specs[0].options, Some(vec!["true".to_string(), "false".to_string()]));
    }
}
