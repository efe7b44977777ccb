//! Synthetic `ShardStore`/`ProcessingContext` implementations used only by
//! the demo `run` subcommand — a real deployment supplies its own driver
//! adapter and output sink.

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use shardquery_core::model::FilterParams;
use shardquery_core::shard_store::{ProcessingContext, ShardStore};
use shardquery_core::types::{Row, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// A province-scoped shard that deals out `row_count` synthetic rows,
/// ignoring the SQL text entirely.
pub struct SyntheticShard {
    province: String,
    row_count: u64,
}

impl SyntheticShard {
    pub fn new(province: impl Into<String>, row_count: u64) -> Self {
        Self {
            province: province.into(),
            row_count,
        }
    }

    fn make_row(&self, i: u64) -> Row {
        let mut row = Row::new();
        row.set("id", Value::Integer(i as i64));
        row.set("monto", Value::Numeric((i % 997) as f64 * 1.5));
        row.set("lugar", Value::Text(format!("ruta {}", i % 40)));
        row
    }
}

#[async_trait]
impl ShardStore for SyntheticShard {
    fn province(&self) -> &str {
        &self.province
    }

    async fn execute_page(&self, _query_code: &str, filters: &FilterParams) -> anyhow::Result<Vec<Row>> {
        let offset = filters.offset.unwrap_or(0);
        let limit = filters.limit.unwrap_or(self.row_count);
        let remaining = self.row_count.saturating_sub(offset);
        let n = remaining.min(limit);
        Ok((0..n).map(|i| self.make_row(offset + i)).collect())
    }

    async fn execute(
        &self,
        _query_code: &str,
        _filters: &FilterParams,
        row_cb: &mut (dyn FnMut(Row) + Send),
    ) -> anyhow::Result<()> {
        for i in 0..self.row_count {
            row_cb(self.make_row(i));
        }
        Ok(())
    }

    async fn count(&self, _sql: &str, _filters: &FilterParams) -> anyhow::Result<u64> {
        Ok(self.row_count)
    }
}

/// Forwards every batch to a terminal spinner; used by the `run` subcommand
/// in place of a real output sink.
pub struct ConsoleContext {
    bar: ProgressBar,
    total: AtomicU64,
}

impl ConsoleContext {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            bar.set_style(style);
        }
        Self {
            bar,
            total: AtomicU64::new(0),
        }
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ConsoleContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessingContext for ConsoleContext {
    async fn push(&self, batch: Vec<Row>) -> anyhow::Result<()> {
        let n = batch.len() as u64;
        let total = self.total.fetch_add(n, Ordering::SeqCst) + n;
        self.bar.set_message(format!("{total} rows forwarded"));
        self.bar.tick();
        Ok(())
    }

    async fn drain_all(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
