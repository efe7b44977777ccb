//! FieldClassifier (spec §4.2): classifies one SELECT expression into a
//! field-kind using expression shape and name heuristics, and exposes the
//! static cardinality table consulted by `ConsolidationPlanner`.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// The classification a SELECT expression is bucketed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Location,
    Time,
    NumericSum,
    NumericCount,
    Computed,
    Identifier,
    Categorisation,
    Detail,
}

/// Result of classifying a single SELECT expression.
#[derive(Debug, Clone)]
pub struct AnalysedField {
    pub original_expr: String,
    pub clean_expr: String,
    pub final_name: String,
    pub kind: FieldKind,
    pub is_aggregate: bool,
    pub is_computed: bool,
}

static NAME_OVERRIDES: Lazy<HashMap<&'static str, FieldKind>> = Lazy::new(|| {
    HashMap::from([
        ("provincia", FieldKind::Location),
        ("departamento", FieldKind::Location),
        ("localidad", FieldKind::Location),
        ("fecha_infraccion", FieldKind::Time),
        ("fecha", FieldKind::Time),
        ("mes", FieldKind::Time),
        ("anio", FieldKind::Time),
        ("total", FieldKind::NumericSum),
        ("cantidad", FieldKind::NumericCount),
    ])
});

/// Known cardinalities for well-understood column names (province=24,
/// month=12, ...). Used by `ConsolidationPlanner` to avoid guessing.
static KNOWN_CARDINALITY: Lazy<HashMap<&'static str, u64>> = Lazy::new(|| {
    HashMap::from([
        ("provincia", 24),
        ("departamento", 24),
        ("mes", 12),
        ("dia_semana", 7),
        ("id_estado", 15),
        ("id_tipo_infra", 40),
        ("exporta_sacit", 2),
    ])
});

fn strip_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

fn name_after_alias_or_dot(expr: &str) -> String {
    let upper = expr.to_uppercase();
    if let Some(pos) = upper.rfind(" AS ") {
        return strip_quotes(expr[pos + 4..].trim()).to_lowercase();
    }
    let tail = expr.rsplit('.').next().unwrap_or(expr);
    strip_quotes(tail.trim()).to_lowercase()
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.to_uppercase().contains(&needle.to_uppercase())
}

/// Classify one SELECT expression (possibly with alias) per the ordered
/// rules in spec §4.2.
pub fn classify(expr: &str) -> AnalysedField {
    let clean_expr = expr.trim().to_string();
    let final_name = name_after_alias_or_dot(&clean_expr);

    let is_aggregate = ["SUM(", "COUNT(", "AVG(", "MIN(", "MAX("]
        .iter()
        .any(|f| contains_word(&clean_expr, f));
    let is_computed_shape = contains_word(&clean_expr, "CASE WHEN")
        || contains_word(&clean_expr, "CONCAT(")
        || contains_word(&clean_expr, "COALESCE(")
        || ["+", "-", "*", "/"].iter().any(|op| clean_expr.contains(op));

    // 1. name-based override takes precedence.
    if let Some(&kind) = NAME_OVERRIDES.get(final_name.as_str()) {
        return AnalysedField {
            original_expr: expr.to_string(),
            clean_expr,
            final_name,
            kind,
            is_aggregate,
            is_computed: is_computed_shape,
        };
    }

    // 2. expression-shape heuristics.
    let kind = if is_aggregate {
        if contains_word(&clean_expr, "COUNT(") {
            FieldKind::NumericCount
        } else {
            FieldKind::NumericSum
        }
    } else if is_computed_shape {
        FieldKind::Computed
    } else {
        classify_by_name_suffix(&final_name)
    };

    AnalysedField {
        original_expr: expr.to_string(),
        clean_expr,
        final_name,
        kind,
        is_aggregate,
        is_computed: is_computed_shape,
    }
}

fn classify_by_name_suffix(name: &str) -> FieldKind {
    if name.ends_with("_id") || name.starts_with("id_") || name.ends_with("_codigo") {
        return FieldKind::Identifier;
    }
    if name.starts_with("total") || name.starts_with("count") || name.starts_with("cantidad")
        || name.starts_with("monto") || name.starts_with("valor")
        || name.starts_with("num_") || name.starts_with("cant_")
    {
        return FieldKind::NumericSum;
    }
    if name.contains("descripcion") || name.contains("detalle") || name.contains("observacion") {
        return FieldKind::Detail;
    }
    if name.contains("provincia") || name.contains("departamento") || name.contains("localidad")
        || name.contains("lugar") || name.contains("punto_control")
    {
        return FieldKind::Location;
    }
    if name.contains("fecha") || name.contains("mes") || name.contains("anio") || name.contains("hora") {
        return FieldKind::Time;
    }
    if name.contains("tipo") || name.contains("categoria") || name.contains("clase") {
        return FieldKind::Categorisation;
    }
    FieldKind::Detail
}

/// Known cardinality for a column name, if any is recorded.
pub fn known_cardinality(name: &str) -> Option<u64> {
    KNOWN_CARDINALITY.get(name).copied()
}

/// Estimated cardinality for a column with no known value, bucketed by kind.
pub fn estimate_cardinality(kind: FieldKind) -> u64 {
    match kind {
        FieldKind::Location => 500,
        FieldKind::Time => 365,
        FieldKind::Categorisation => 20,
        FieldKind::Identifier => 1_000,
        FieldKind::NumericSum | FieldKind::NumericCount => 100,
        FieldKind::Computed | FieldKind::Detail => 100,
    }
}

/// Cardinality to use for a column: known value if recorded, otherwise an
/// estimate derived from its classified kind.
pub fn cardinality_for(name: &str, kind: FieldKind) -> u64 {
    known_cardinality(name).unwrap_or_else(|| estimate_cardinality(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_aggregate_sum() {
        let f = classify("SUM(i.monto) AS total");
        assert_eq!(f.kind, FieldKind::NumericSum);
        assert!(f.is_aggregate);
        assert_eq!(f.final_name, "total");
    }

    #[test]
    fn classifies_count_star() {
        let f = classify("COUNT(*) AS total");
        assert_eq!(f.kind, FieldKind::NumericCount);
    }

    #[test]
    fn classifies_computed_case_when() {
        let f = classify("CASE WHEN i.id_estado = 1 THEN 'activo' ELSE 'inactivo' END AS estado_desc");
        assert_eq!(f.kind, FieldKind::Computed);
        assert!(f.is_computed);
    }

    #[test]
    fn classifies_identifier_by_suffix() {
        let f = classify("i.id AS id_infraccion");
        assert_eq!(f.kind, FieldKind::Identifier);
    }

    #[test]
    fn classifies_location_by_name_override() {
        let f = classify("i.provincia");
        assert_eq!(f.kind, FieldKind::Location);
        assert_eq!(f.final_name, "provincia");
    }

    #[test]
    fn unknown_falls_back_to_detail() {
        let f = classify("i.xyzzy");
        assert_eq!(f.kind, FieldKind::Detail);
    }

    #[test]
    fn cardinality_prefers_known_table() {
        assert_eq!(cardinality_for("provincia", FieldKind::Location), 24);
        assert_eq!(cardinality_for("no_se_que_columna", FieldKind::Location), 500);
    }
}
