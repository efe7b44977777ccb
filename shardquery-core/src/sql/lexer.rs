//! SqlLexer (spec §4.1): pure, stateless primitives every other analysis
//! component builds on. Nothing below this module re-implements comment
//! stripping, protection or clause extraction.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Opaque placeholder table produced by [`protect`]. Maps a placeholder
/// token back to the original protected text.
pub type ProtectionTable = HashMap<String, String>;

/// Strip `--...EOL` and `/*...*/` comments, collapse whitespace runs, strip
/// a trailing `;`. Idempotent: `clean(clean(sql)) == clean(sql)` (spec §8).
pub fn clean(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let bytes: Vec<char> = sql.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == '-' && bytes.get(i + 1) == Some(&'-') {
            while i < bytes.len() && bytes[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if bytes[i] == '/' && bytes.get(i + 1) == Some(&'*') {
            i += 2;
            while i < bytes.len() && !(bytes[i] == '*' && bytes.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i += 2;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim().trim_end_matches(';').trim().to_string()
}

/// Word-boundary check: `idx` is the start of a token in `chars` that is not
/// a substring of a larger identifier.
fn is_word_boundary(chars: &[char], idx: usize, len: usize) -> bool {
    let before_ok = idx == 0 || !chars[idx - 1].is_alphanumeric() && chars[idx - 1] != '_';
    let after = idx + len;
    let after_ok = after >= chars.len() || !chars[after].is_alphanumeric() && chars[after] != '_';
    before_ok && after_ok
}

fn matches_keyword_at(chars: &[char], idx: usize, keyword: &str) -> bool {
    let kw: Vec<char> = keyword.chars().collect();
    if idx + kw.len() > chars.len() {
        return false;
    }
    for (offset, kc) in kw.iter().enumerate() {
        if chars[idx + offset].to_ascii_uppercase() != kc.to_ascii_uppercase() {
            return false;
        }
    }
    is_word_boundary(chars, idx, kw.len())
}

/// Replace each top-level `CASE...END` expression and each `EXISTS(...)` /
/// parenthesised `SELECT` sub-query with an opaque placeholder. `CASE...END`
/// pairing honours arbitrary nesting: depth starts at the `CASE` token and
/// is paired with the matching `END` at the same depth (other `CASE`/`END`
/// pairs, and parentheses, may appear nested inside). Tokens are
/// word-bounded.
pub fn protect(sql: &str) -> Result<(String, ProtectionTable)> {
    let chars: Vec<char> = sql.chars().collect();
    let mut table = ProtectionTable::new();
    let mut out = String::with_capacity(sql.len());
    let mut counter = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        if matches_keyword_at(&chars, i, "CASE") {
            let (end_idx, depth_at_start) = find_matching_case_end(&chars, i)?;
            let _ = depth_at_start;
            let protected: String = chars[i..end_idx].iter().collect();
            let placeholder = format!("__PROTECTED_{counter}__");
            counter += 1;
            table.insert(placeholder.clone(), protected);
            out.push_str(&placeholder);
            i = end_idx;
            continue;
        }

        if chars[i] == '(' {
            // Only protect parens that open an EXISTS(...) or a nested
            // SELECT sub-query; other parenthesised expressions are left
            // alone so outer clause scanning still sees their structure.
            let is_exists = looks_back_for_keyword(&chars, i, "EXISTS");
            let inner_start = skip_ws(&chars, i + 1);
            let is_subselect = matches_keyword_at(&chars, inner_start, "SELECT");

            if is_exists || is_subselect {
                let close = find_matching_paren(&chars, i)?;
                let span_end = close + 1;
                let protected: String = chars[i..span_end].iter().collect();
                let placeholder = format!("__PROTECTED_{counter}__");
                counter += 1;
                table.insert(placeholder.clone(), protected);
                out.push_str(&placeholder);
                i = span_end;
                continue;
            }
        }

        out.push(chars[i]);
        i += 1;
    }

    Ok((out, table))
}

fn skip_ws(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn looks_back_for_keyword(chars: &[char], paren_idx: usize, keyword: &str) -> bool {
    let mut j = paren_idx;
    while j > 0 && chars[j - 1].is_whitespace() {
        j -= 1;
    }
    let kw_len = keyword.len();
    if j < kw_len {
        return false;
    }
    matches_keyword_at(chars, j - kw_len, keyword)
}

/// Scan forward from a `CASE` token at `start`, tracking nested
/// `CASE`/`END` depth, and return the index just past the matching `END`.
fn find_matching_case_end(chars: &[char], start: usize) -> Result<(usize, usize)> {
    let mut depth = 1usize;
    let mut i = start + 4; // length of "CASE"
    while i < chars.len() {
        if matches_keyword_at(chars, i, "CASE") {
            depth += 1;
            i += 4;
            continue;
        }
        if matches_keyword_at(chars, i, "END") {
            depth -= 1;
            i += 3;
            if depth == 0 {
                return Ok((i, depth));
            }
            continue;
        }
        i += 1;
    }
    Err(Error::protection_imbalance(
        "unmatched CASE...END during SQL protection",
    ))
}

fn find_matching_paren(chars: &[char], open_idx: usize) -> Result<usize> {
    let mut depth = 0i32;
    let mut i = open_idx;
    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(Error::protection_imbalance(
        "unbalanced parentheses during SQL protection",
    ))
}

/// Inverse of [`protect`]: substitute every placeholder back with its
/// original text. `restore(protect(sql)?.0, protect(sql)?.1) == sql` for any
/// well-formed input (spec §8 round-trip property).
pub fn restore(protected_sql: &str, table: &ProtectionTable) -> String {
    let mut result = protected_sql.to_string();
    // Longer placeholder indices were inserted later but are textually
    // independent (no placeholder is a substring of another), so a single
    // pass of direct replacement is safe regardless of order.
    for (placeholder, original) in table {
        result = result.replace(placeholder, original);
    }
    result
}

/// Find the outer-level span of a clause (`WHERE`, `GROUP BY`, ...) in an
/// already cleaned+protected SQL string, stopping at the next top-level
/// clause keyword or end of string.
fn clause_span(sql: &str, clause_keyword: &str, stop_keywords: &[&str]) -> Option<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut depth = 0i32;
    let mut i = 0usize;
    let mut clause_start = None;

    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth == 0 && clause_start.is_none() && matches_keyword_at(&chars, i, clause_keyword) {
            clause_start = Some(i + clause_keyword.len());
            i += clause_keyword.len();
            continue;
        }
        if let Some(start) = clause_start {
            if depth == 0 {
                for stop in stop_keywords {
                    if matches_keyword_at(&chars, i, stop) {
                        return Some(chars[start..i].iter().collect::<String>().trim().to_string());
                    }
                }
            }
        }
        i += 1;
    }

    clause_start.map(|start| chars[start..].iter().collect::<String>().trim().to_string())
}

const CLAUSE_STOPS: &[&str] = &[
    "WHERE", "GROUP BY", "HAVING", "ORDER BY", "LIMIT", "OFFSET", "UNION",
];

/// Return the SELECT clause text (between `SELECT` and `FROM`) at depth 0.
pub fn select_clause(sql: &str) -> Option<String> {
    clause_span(sql, "SELECT", &["FROM"])
}

/// Return the WHERE clause text at depth 0.
pub fn where_clause(sql: &str) -> Option<String> {
    clause_span(sql, "WHERE", CLAUSE_STOPS)
}

/// Return the GROUP BY field list, split with [`split_fields_smart`].
pub fn group_by_fields(sql: &str) -> Vec<String> {
    clause_span(sql, "GROUP BY", CLAUSE_STOPS)
        .map(|s| split_fields_smart(&s))
        .unwrap_or_default()
}

/// Split a comma-separated expression list on commas that sit at
/// parenthesis depth 0 (protected regions contain no unprotected commas or
/// parens by construction, so this alone is sufficient after `protect`).
pub fn split_fields_smart(list: &str) -> Vec<String> {
    let chars: Vec<char> = list.chars().collect();
    let mut fields = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                let field: String = chars[start..i].iter().collect::<String>().trim().to_string();
                if !field.is_empty() {
                    fields.push(field);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail: String = chars[start..].iter().collect::<String>().trim().to_string();
    if !tail.is_empty() {
        fields.push(tail);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_comments_and_collapses_whitespace() {
        let sql = "SELECT  1  -- trailing comment\n FROM /* inline */ t;  ";
        assert_eq!(clean(sql), "SELECT 1 FROM t");
    }

    #[test]
    fn clean_is_idempotent() {
        let sql = "SELECT 1  FROM  t ;";
        let once = clean(sql);
        let twice = clean(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn protect_round_trips_nested_case_end() {
        let sql = "SELECT CASE WHEN x = 1 THEN (CASE WHEN y = 2 THEN 'a' ELSE 'b' END) ELSE 'c' END AS flag FROM t";
        let (protected, table) = protect(sql).unwrap();
        assert_ne!(protected, sql);
        assert_eq!(restore(&protected, &table), sql);
    }

    #[test]
    fn protect_round_trips_subselect() {
        let sql = "SELECT id FROM t WHERE x IN (SELECT y FROM u WHERE u.z = 1)";
        let (protected, table) = protect(sql).unwrap();
        assert_eq!(restore(&protected, &table), sql);
    }

    #[test]
    fn protect_rejects_unmatched_case() {
        let sql = "SELECT CASE WHEN x = 1 THEN 'a' FROM t";
        assert!(protect(sql).is_err());
    }

    #[test]
    fn where_clause_extracted_at_outer_level() {
        let sql = "SELECT id FROM t WHERE (a = 1 AND b = 2) GROUP BY c";
        assert_eq!(where_clause(sql).unwrap(), "(a = 1 AND b = 2)");
    }

    #[test]
    fn group_by_fields_split_correctly() {
        let sql = "SELECT a, b FROM t GROUP BY provincia, fecha_infraccion, id_estado";
        assert_eq!(
            group_by_fields(sql),
            vec!["provincia", "fecha_infraccion", "id_estado"]
        );
    }

    #[test]
    fn split_fields_smart_honours_parens() {
        let fields = split_fields_smart("a, SUM(b, c), d");
        assert_eq!(fields, vec!["a", "SUM(b, c)", "d"]);
    }

    #[test]
    fn select_clause_stops_at_from() {
        let sql = "SELECT a, COUNT(*) AS total FROM t WHERE x = 1";
        assert_eq!(select_clause(sql).unwrap(), "a, COUNT(*) AS total");
    }
}
