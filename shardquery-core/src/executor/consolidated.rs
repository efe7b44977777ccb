//! ConsolidatedExecutor (spec §4.14): the adaptive state machine for
//! `NO_PAGINATION`-strategy consolidable queries — probe, analyse the
//! sample, then either forward it directly, page through offsets, or fall
//! back to streaming the raw result set.

use crate::config::{ConsolidationConfig, StreamingConfig};
use crate::executor::streaming;
use crate::memory::MemoryMonitor;
use crate::metrics::MetricsCollector;
use crate::model::FilterParams;
use crate::page::PageCalculator;
use crate::registry::QueryRegistry;
use crate::shard_store::{ProcessingContext, ShardStore};
use crate::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Runs the full S0 → S1 → S2 → {forward, PAGED, RAW} state machine for one
/// shard. Returns the total row count forwarded.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    shard: &dyn ShardStore,
    query_code: &str,
    estimated_rows: Option<u64>,
    mut filters: FilterParams,
    config: &ConsolidationConfig,
    streaming_config: &StreamingConfig,
    memory: &MemoryMonitor,
    registry: &dyn QueryRegistry,
    metrics: &MetricsCollector,
    ctx: &dyn ProcessingContext,
    cancel: &CancellationToken,
) -> Result<u64> {
    // S0 — validate estimate.
    let estimated = match estimated_rows {
        Some(n) if n > 0 && n <= config.validation_limit => n,
        _ => return go_raw(shard, query_code, filters, streaming_config, memory, ctx, cancel).await,
    };

    // S1 — probe.
    filters.clear_pagination();
    filters.limit = Some(config.validation_limit);
    let mut sample = shard
        .execute_page(query_code, &filters)
        .await
        .map_err(|e| Error::from_shard_failure(shard.province(), query_code, e))?;
    let sample_len = sample.len() as u64;

    // S2 — analyse sample.
    if sample_len < config.validation_limit {
        if estimated > 0 && sample_len > estimated * config.error_factor {
            registry.update_estimated_rows(query_code, sample_len)?;
            metrics.record_drift_reestimation();
        }
        for row in sample.iter_mut() {
            row.restamp_province(shard.province());
        }
        let total = sample.len() as u64;
        if total > 0 {
            ctx.push(sample).await.map_err(Error::Internal)?;
        }
        return Ok(total);
    }

    // Hit the validation cap.
    if sample_len > estimated * config.error_factor {
        registry.update_estimated_rows(query_code, sample_len * 2)?;
        metrics.record_drift_reestimation();
        metrics.record_oom_strategy_switch();
        return go_raw(shard, query_code, filters, streaming_config, memory, ctx, cancel).await;
    }

    // PAGED: forward the probe sample as the first page, then continue with
    // offset pagination at the same batch size.
    run_paged(shard, query_code, sample, filters, config, memory, ctx, cancel).await
}

#[allow(clippy::too_many_arguments)]
async fn run_paged(
    shard: &dyn ShardStore,
    query_code: &str,
    first_page: Vec<crate::types::Row>,
    mut filters: FilterParams,
    config: &ConsolidationConfig,
    memory: &MemoryMonitor,
    ctx: &dyn ProcessingContext,
    cancel: &CancellationToken,
) -> Result<u64> {
    let batch_size = config.validation_limit;
    let max_iterations = (config.absolute_limit / batch_size).max(1);

    let mut total = first_page.len() as u64;
    let mut last_returned = first_page.len() as u64;
    let mut first_page = first_page;
    for row in first_page.iter_mut() {
        row.restamp_province(shard.province());
    }
    if !first_page.is_empty() {
        ctx.push(first_page).await.map_err(Error::Internal)?;
    }

    let mut offset = batch_size;
    for iteration in 1..max_iterations {
        if !PageCalculator::should_continue(last_returned, batch_size) {
            break;
        }
        memory.pause_if_needed(cancel).await;

        filters.clear_pagination();
        filters.limit = Some(batch_size);
        filters.offset = Some(offset);

        let mut rows = shard
            .execute_page(query_code, &filters)
            .await
            .map_err(|e| Error::from_shard_failure(shard.province(), query_code, e))?;
        last_returned = rows.len() as u64;
        for row in rows.iter_mut() {
            row.restamp_province(shard.province());
        }
        total += last_returned;
        if !rows.is_empty() {
            ctx.push(rows).await.map_err(Error::Internal)?;
        }

        offset += batch_size;
        if iteration + 1 == max_iterations && PageCalculator::should_continue(last_returned, batch_size) {
            warn!(
                shard = shard.province(),
                query_code, "consolidated executor hit the absolute iteration cap"
            );
        }
    }

    Ok(total)
}

async fn go_raw(
    shard: &dyn ShardStore,
    query_code: &str,
    filters: FilterParams,
    streaming_config: &StreamingConfig,
    memory: &MemoryMonitor,
    ctx: &dyn ProcessingContext,
    cancel: &CancellationToken,
) -> Result<u64> {
    streaming::run(shard, query_code, filters, streaming_config, memory, ctx, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::model::Query;
    use crate::registry::InMemoryQueryRegistry;
    use crate::types::{Row, Value};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::Mutex;

    struct MockShard {
        province: String,
        total_rows: u64,
    }

    #[async_trait]
    impl ShardStore for MockShard {
        fn province(&self) -> &str {
            &self.province
        }

        async fn execute_page(&self, _query_code: &str, filters: &FilterParams) -> anyhow::Result<Vec<Row>> {
            let offset = filters.offset.unwrap_or(0);
            let limit = filters.limit.unwrap_or(0);
            let remaining = self.total_rows.saturating_sub(offset);
            let n = remaining.min(limit);
            Ok((0..n)
                .map(|i| {
                    let mut row = Row::new();
                    row.set("id", Value::Integer((offset + i) as i64));
                    row
                })
                .collect())
        }

        async fn execute(
            &self,
            _query_code: &str,
            _filters: &FilterParams,
            row_cb: &mut (dyn FnMut(Row) + Send),
        ) -> anyhow::Result<()> {
            for i in 0..self.total_rows {
                let mut row = Row::new();
                row.set("id", Value::Integer(i as i64));
                row_cb(row);
            }
            Ok(())
        }

        async fn count(&self, _sql: &str, _filters: &FilterParams) -> anyhow::Result<u64> {
            Ok(self.total_rows)
        }
    }

    struct CollectingContext {
        rows: Mutex<Vec<Row>>,
        pushes: AtomicU64,
    }

    impl CollectingContext {
        fn new() -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
                pushes: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl ProcessingContext for CollectingContext {
        async fn push(&self, batch: Vec<Row>) -> anyhow::Result<()> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            self.rows.lock().await.extend(batch);
            Ok(())
        }

        async fn drain_all(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn estimate_absent_goes_straight_to_raw() {
        let shard = MockShard { province: "cordoba".into(), total_rows: 5 };
        let memory = MemoryMonitor::new(MemoryConfig::default());
        let registry = InMemoryQueryRegistry::new();
        let metrics = MetricsCollector::new();
        let ctx = CollectingContext::new();
        let cancel = CancellationToken::new();
        let config = ConsolidationConfig::default();
        let streaming_config = StreamingConfig { chunk_size: 100, log_frequency: 1 };

        let total = run(
            &shard, "q1", None, FilterParams::default(), &config, &streaming_config, &memory, &registry, &metrics, &ctx, &cancel,
        )
        .await
        .unwrap();

        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn complete_sample_forwards_directly() {
        let shard = MockShard { province: "cordoba".into(), total_rows: 50 };
        let memory = MemoryMonitor::new(MemoryConfig::default());
        let registry = InMemoryQueryRegistry::new();
        let metrics = MetricsCollector::new();
        let ctx = CollectingContext::new();
        let cancel = CancellationToken::new();
        let mut config = ConsolidationConfig::default();
        config.validation_limit = 10_000;
        let streaming_config = StreamingConfig { chunk_size: 100, log_frequency: 1 };

        let total = run(
            &shard,
            "q1",
            Some(1_000),
            FilterParams::default(),
            &config,
            &streaming_config,
            &memory,
            &registry,
            &metrics,
            &ctx,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(total, 50);
        assert_eq!(ctx.pushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drift_beyond_cap_reestimates_and_falls_back_to_raw() {
        let shard = MockShard { province: "cordoba".into(), total_rows: 500 };
        let memory = MemoryMonitor::new(MemoryConfig::default());
        let registry = InMemoryQueryRegistry::new();
        registry.save(Query::new("q1", "SELECT 1", "demo"), crate::model::QueryMetadata {
            consolidable: true,
            consolidation_kind: crate::model::ConsolidationKind::Aggregation,
            pagination_strategy: crate::model::PaginationStrategy::NoPagination,
            grouping_fields: vec![],
            numeric_fields: vec![],
            time_fields: vec![],
            location_fields: vec![],
            filter_schema: Default::default(),
            keyset_fields: vec![],
            id_column: None,
        }).unwrap();
        let metrics = MetricsCollector::new();
        let ctx = CollectingContext::new();
        let cancel = CancellationToken::new();
        let mut config = ConsolidationConfig::default();
        config.validation_limit = 100;
        config.error_factor = 1;
        let streaming_config = StreamingConfig { chunk_size: 1_000, log_frequency: 1 };

        let total = run(
            &shard,
            "q1",
            Some(10),
            FilterParams::default(),
            &config,
            &streaming_config,
            &memory,
            &registry,
            &metrics,
            &ctx,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(total, 500);
        assert_eq!(metrics.drift_reestimations(), 1);
        assert_eq!(metrics.oom_strategy_switches(), 1);
        let loaded = registry.get("q1").unwrap().unwrap();
        assert_eq!(loaded.query.estimated_rows, Some(200));
    }
}
