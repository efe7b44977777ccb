//! BatchOrchestrator (spec §4.11): picks PARALLEL / HYBRID / SEQUENTIAL from
//! the job's dataset estimate, then delegates to the matching strategy.

pub mod strategy;

use crate::config::OrchestratorConfig;
use crate::model::EstimationResult;
use crate::shard_store::ShardStore;
use crate::Result;
use std::sync::Arc;
pub use strategy::JobContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Parallel,
    Hybrid,
    Sequential,
}

/// `mean < parallelPerShard ∧ total < parallelTotal → PARALLEL`;
/// `else if max > massivePerShard → SEQUENTIAL`; `else → HYBRID`.
pub fn choose_strategy(estimate: &EstimationResult, config: &OrchestratorConfig) -> Strategy {
    if estimate.mean < config.parallel_per_shard && estimate.total < config.parallel_total {
        Strategy::Parallel
    } else if estimate.max > config.massive_per_shard {
        Strategy::Sequential
    } else {
        Strategy::Hybrid
    }
}

pub struct BatchOrchestrator;

impl BatchOrchestrator {
    /// Run the whole job across every shard, aggregating the total forwarded
    /// row count. Individual shard failures are logged and skipped; they
    /// never fail the job as a whole (spec §4.11).
    pub async fn run(shards: &[Arc<dyn ShardStore>], job: JobContext, estimate: &EstimationResult) -> Result<u64> {
        match choose_strategy(estimate, &job.config.orchestrator) {
            Strategy::Parallel => strategy::run_parallel(shards, &job).await,
            Strategy::Hybrid => strategy::run_hybrid(shards, &job).await,
            Strategy::Sequential => strategy::run_sequential(shards, &job).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::memory::MemoryMonitor;
    use crate::metrics::MetricsCollector;
    use crate::model::{FilterParams, PaginationStrategy};
    use crate::registry::InMemoryQueryRegistry;
    use crate::shard_store::ProcessingContext;
    use crate::types::{Row, Value};
    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn picks_parallel_for_small_uniform_estimate() {
        let config = OrchestratorConfig::default();
        let estimate = EstimationResult { total: 10_000, mean: 2_000, max: 5_000 };
        assert_eq!(choose_strategy(&estimate, &config), Strategy::Parallel);
    }

    #[test]
    fn picks_sequential_when_one_shard_is_massive() {
        let config = OrchestratorConfig::default();
        let estimate = EstimationResult { total: 500_000, mean: 80_000, max: 400_000 };
        assert_eq!(choose_strategy(&estimate, &config), Strategy::Sequential);
    }

    #[test]
    fn picks_hybrid_otherwise() {
        let config = OrchestratorConfig::default();
        let estimate = EstimationResult { total: 400_000, mean: 80_000, max: 120_000 };
        assert_eq!(choose_strategy(&estimate, &config), Strategy::Hybrid);
    }

    struct MockShard {
        province: String,
        rows: u64,
    }

    #[async_trait]
    impl ShardStore for MockShard {
        fn province(&self) -> &str {
            &self.province
        }

        async fn execute_page(&self, _query_code: &str, filters: &FilterParams) -> anyhow::Result<Vec<Row>> {
            let offset = filters.offset.unwrap_or(0);
            let limit = filters.limit.unwrap_or(0);
            let remaining = self.rows.saturating_sub(offset);
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
            for i in 0..self.rows {
                let mut row = Row::new();
                row.set("id", Value::Integer(i as i64));
                row_cb(row);
            }
            Ok(())
        }

        async fn count(&self, _sql: &str, _filters: &FilterParams) -> anyhow::Result<u64> {
            Ok(self.rows)
        }
    }

    struct CollectingContext {
        rows: Mutex<Vec<Row>>,
    }

    #[async_trait]
    impl ProcessingContext for CollectingContext {
        async fn push(&self, batch: Vec<Row>) -> anyhow::Result<()> {
            self.rows.lock().await.extend(batch);
            Ok(())
        }

        async fn drain_all(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn job_with(config: Config, pagination_strategy: PaginationStrategy, consolidable: bool) -> (JobContext, Arc<CollectingContext>) {
        let ctx = Arc::new(CollectingContext { rows: Mutex::new(Vec::new()) });
        let job = JobContext {
            query_code: "q1".to_string(),
            pagination_strategy,
            consolidable,
            estimated_rows: None,
            base_filters: FilterParams::default(),
            config: Arc::new(config),
            memory: MemoryMonitor::new(Default::default()),
            registry: Arc::new(InMemoryQueryRegistry::new()),
            metrics: Arc::new(MetricsCollector::new()),
            ctx: ctx.clone(),
            cancel: CancellationToken::new(),
        };
        (job, ctx)
    }

    #[tokio::test]
    async fn batch_orchestrator_runs_all_shards_under_parallel_strategy() {
        let shards: Vec<Arc<dyn ShardStore>> = vec![
            Arc::new(MockShard { province: "cordoba".into(), rows: 5 }),
            Arc::new(MockShard { province: "mendoza".into(), rows: 7 }),
        ];
        let (job, _ctx) = job_with(Config::default(), PaginationStrategy::KeysetWithId, false);
        let estimate = EstimationResult { total: 12, mean: 6, max: 7 };

        let total = BatchOrchestrator::run(&shards, job, &estimate).await.unwrap();
        assert_eq!(total, 12);
    }

    #[tokio::test]
    async fn one_failing_shard_does_not_abort_the_others() {
        struct FailingShard;
        #[async_trait]
        impl ShardStore for FailingShard {
            fn province(&self) -> &str {
                "catamarca"
            }
            async fn execute_page(&self, _query_code: &str, _filters: &FilterParams) -> anyhow::Result<Vec<Row>> {
                Err(anyhow::anyhow!("connection refused"))
            }
            async fn execute(
                &self,
                _query_code: &str,
                _filters: &FilterParams,
                _row_cb: &mut (dyn FnMut(Row) + Send),
            ) -> anyhow::Result<()> {
                Err(anyhow::anyhow!("connection refused"))
            }
            async fn count(&self, _sql: &str, _filters: &FilterParams) -> anyhow::Result<u64> {
                Ok(0)
            }
        }

        let shards: Vec<Arc<dyn ShardStore>> = vec![
            Arc::new(FailingShard),
            Arc::new(MockShard { province: "mendoza".into(), rows: 4 }),
        ];
        let (job, _ctx) = job_with(Config::default(), PaginationStrategy::KeysetWithId, false);
        let estimate = EstimationResult { total: 4, mean: 2, max: 4 };

        let total = BatchOrchestrator::run(&shards, job, &estimate).await.unwrap();
        assert_eq!(total, 4);
    }
}
