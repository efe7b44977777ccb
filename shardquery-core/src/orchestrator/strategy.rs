//! The three dispatch strategies `BatchOrchestrator` chooses between, all
//! built on the same per-shard `executeShard` operation (spec §4.11).

use crate::config::Config;
use crate::executor::execute_shard;
use crate::memory::MemoryMonitor;
use crate::metrics::{MetricsCollector, ProgressMonitor, ShardProgressState};
use crate::model::{FilterParams, PaginationStrategy};
use crate::registry::QueryRegistry;
use crate::shard_store::{ProcessingContext, ShardStore};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything one shard's `executeShard` call needs, bundled so it can be
/// cloned into an owned `'static` task spawned onto the worker pool.
#[derive(Clone)]
pub struct JobContext {
    pub query_code: String,
    pub pagination_strategy: PaginationStrategy,
    pub consolidable: bool,
    pub estimated_rows: Option<u64>,
    pub base_filters: FilterParams,
    pub config: Arc<Config>,
    pub memory: Arc<MemoryMonitor>,
    pub registry: Arc<dyn QueryRegistry>,
    pub metrics: Arc<MetricsCollector>,
    pub ctx: Arc<dyn ProcessingContext>,
    pub cancel: CancellationToken,
}

/// Runs one shard to completion. Shard-level failures are logged inside
/// `execute_shard`/here and never propagate — siblings must still run
/// (spec §4.11).
async fn run_one_shard(shard: Arc<dyn ShardStore>, job: JobContext) -> u64 {
    let province = shard.province().to_string();
    match execute_shard(
        shard.as_ref(),
        &job.query_code,
        job.pagination_strategy,
        job.consolidable,
        job.estimated_rows,
        job.base_filters.clone(),
        &job.config,
        &job.memory,
        job.registry.as_ref(),
        &job.metrics,
        job.ctx.as_ref(),
        &job.cancel,
    )
    .await
    {
        Ok(rows) => {
            job.metrics.add_rows(&province, rows);
            rows
        }
        Err(_err) => 0,
    }
}

/// Dispatch every shard concurrently on a bounded pool; a ticker task
/// reports progress every `progress_interval`; wait for all, drain once.
pub async fn run_parallel(shards: &[Arc<dyn ShardStore>], job: &JobContext) -> Result<u64> {
    let monitor = Arc::new(ProgressMonitor::new());
    for shard in shards {
        monitor.set_state(shard.province(), ShardProgressState::Pending);
    }

    let mut set = JoinSet::new();
    for shard in shards.iter().cloned() {
        let task_job = job.clone();
        let task_monitor = monitor.clone();
        set.spawn(async move {
            task_monitor.set_state(shard.province(), ShardProgressState::InProgress);
            let rows = run_one_shard(shard.clone(), task_job).await;
            task_monitor.set_state(shard.province(), ShardProgressState::Completed);
            rows
        });
    }

    let ticker_monitor = monitor.clone();
    let ticker_cancel = job.cancel.clone();
    let interval = job.config.orchestrator.progress_interval;
    let ticker = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    info!(progress = %ticker_monitor.report(), "parallel progress");
                }
                _ = ticker_cancel.cancelled() => break,
            }
        }
    });

    let mut total = 0u64;
    while let Some(result) = set.join_next().await {
        total += result.unwrap_or(0);
    }
    ticker.abort();

    job.ctx.drain_all().await.map_err(Error::Internal)?;
    Ok(total)
}

/// Partition shards into contiguous groups of `max_parallel_per_group`;
/// within a group behave like `run_parallel` and wait; between groups
/// drain, then pause/GC-hint if memory pressure is high.
pub async fn run_hybrid(shards: &[Arc<dyn ShardStore>], job: &JobContext) -> Result<u64> {
    let group_size = job.config.orchestrator.max_parallel_per_group.max(1);
    let mut total = 0u64;

    for group in shards.chunks(group_size) {
        let mut set = JoinSet::new();
        for shard in group.iter().cloned() {
            set.spawn(run_one_shard(shard, job.clone()));
        }
        while let Some(result) = set.join_next().await {
            total += result.unwrap_or(0);
        }
        job.ctx.drain_all().await.map_err(Error::Internal)?;
        job.memory.pause_if_needed(&job.cancel).await;
        job.memory.hint_gc_if_needed(&job.cancel).await;
    }

    Ok(total)
}

/// One shard at a time; drain after each; pause-if-high between shards.
pub async fn run_sequential(shards: &[Arc<dyn ShardStore>], job: &JobContext) -> Result<u64> {
    let mut total = 0u64;
    for shard in shards {
        total += run_one_shard(shard.clone(), job.clone()).await;
        job.ctx.drain_all().await.map_err(Error::Internal)?;
        job.memory.pause_if_needed(&job.cancel).await;
    }
    Ok(total)
}
