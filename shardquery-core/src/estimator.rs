//! DatasetEstimator (spec §4.10): fans out a per-shard `COUNT(*)` over the
//! rewritten base query and aggregates total/mean/max.

use crate::model::{EstimationResult, FilterParams};
use crate::shard_store::ShardStore;
use std::sync::Arc;
use tracing::warn;

/// Word-bounded check that `kw` occurs at `idx` in `chars`.
fn matches_keyword_at(chars: &[char], idx: usize, kw: &str) -> bool {
    let kw_chars: Vec<char> = kw.chars().collect();
    if idx + kw_chars.len() > chars.len() {
        return false;
    }
    for (i, c) in kw_chars.iter().enumerate() {
        if chars[idx + i].to_ascii_uppercase() != c.to_ascii_uppercase() {
            return false;
        }
    }
    let before_ok = idx == 0 || !(chars[idx - 1].is_alphanumeric() || chars[idx - 1] == '_');
    let after = idx + kw_chars.len();
    let after_ok = after >= chars.len() || !(chars[after].is_alphanumeric() || chars[after] == '_');
    before_ok && after_ok
}

/// Strip a trailing `;` and remove any `ORDER BY` / `LIMIT` / `OFFSET`
/// clause that lives at paren-depth 0, scanning from end to start so a
/// clause inside a sub-query (higher depth) is left untouched.
pub fn strip_trailing_clauses(sql: &str) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    let chars: Vec<char> = trimmed.chars().collect();

    let mut depth = 0i32;
    let mut depths = vec![0i32; chars.len() + 1];
    for (i, c) in chars.iter().enumerate() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        depths[i + 1] = depth;
    }

    const STOP_KEYWORDS: &[&str] = &["ORDER BY", "LIMIT", "OFFSET"];
    let mut cut = chars.len();
    let mut i = chars.len();
    while i > 0 {
        i -= 1;
        if depths[i] != 0 {
            continue;
        }
        for kw in STOP_KEYWORDS {
            if matches_keyword_at(&chars, i, kw) {
                cut = i;
            }
        }
    }

    chars[..cut].iter().collect::<String>().trim().to_string()
}

/// Wrap a (trailing-clause-stripped) base query as a `COUNT(*)` query.
pub fn wrap_count_query(inner_sql: &str) -> String {
    format!("SELECT COUNT(*) AS total FROM ({inner_sql}) AS conteo_wrapper")
}

/// Estimate dataset size across every shard in parallel. On any shard-level
/// error the shard contributes 0 and a warning is logged (spec §4.10: "On
/// any shard-level error return 0").
pub async fn estimate(
    registered_sql: &str,
    filters: &FilterParams,
    shards: &[Arc<dyn ShardStore>],
) -> EstimationResult {
    let inner = strip_trailing_clauses(registered_sql);
    let count_sql = wrap_count_query(&inner);

    let tasks = shards.iter().cloned().map(|shard| {
        let count_sql = count_sql.clone();
        let filters = filters.clone();
        async move {
            match shard.count(&count_sql, &filters).await {
                Ok(n) => n,
                Err(err) => {
                    warn!(shard = shard.province(), error = %err, "dataset estimation failed; using 0");
                    0
                }
            }
        }
    });

    let counts: Vec<u64> = futures::future::join_all(tasks).await;
    EstimationResult::from_counts(&counts)
}
