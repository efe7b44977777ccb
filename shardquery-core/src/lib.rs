//! ShardQuery adaptive multi-shard query execution core
//!
//! Analyses a registered SQL query once, derives a pagination and
//! consolidation strategy from its shape, then dispatches it across many
//! province-scoped shards with an execution strategy chosen from a
//! live per-shard dataset estimate. The core never opens a connection or
//! serves an outer protocol itself — callers provide `ShardStore` and
//! `ProcessingContext` implementations and get back a forwarded row count.

#![allow(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analyser;
pub mod config;
pub mod error;
pub mod estimator;
pub mod executor;
pub mod keyset;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod page;
pub mod planner;
pub mod registry;
pub mod shard_store;
pub mod sql;
pub mod types;

pub use crate::{
    config::Config,
    error::{Error, Result},
};

use crate::memory::MemoryMonitor;
use crate::metrics::MetricsCollector;
use crate::model::FilterParams;
use crate::orchestrator::{BatchOrchestrator, JobContext};
use crate::registry::QueryRegistry;
use crate::shard_store::{ProcessingContext, ShardStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything needed to run one registered query across a fleet of shards.
pub struct Job {
    pub query_code: String,
    pub filters: FilterParams,
    pub shards: Vec<Arc<dyn ShardStore>>,
    pub registry: Arc<dyn QueryRegistry>,
    pub ctx: Arc<dyn ProcessingContext>,
    pub config: Config,
}

/// Run a registered query end to end: look it up, estimate its size across
/// every shard, pick a dispatch strategy, and execute it. Returns the total
/// row count forwarded to `job.ctx`.
pub async fn run_job(job: Job) -> Result<u64> {
    job.config.validate()?;

    let registered = job
        .registry
        .get(&job.query_code)?
        .ok_or_else(|| Error::registry(format!("unknown query code '{}'", job.query_code)))?;

    let estimate = estimator::estimate(&registered.query.sql, &job.filters, &job.shards).await;

    let job_ctx = JobContext {
        query_code: job.query_code.clone(),
        pagination_strategy: registered.metadata.pagination_strategy,
        consolidable: registered.metadata.consolidable,
        estimated_rows: registered.query.estimated_rows,
        base_filters: job.filters,
        config: Arc::new(job.config.clone()),
        memory: MemoryMonitor::new(job.config.memory.clone()),
        registry: job.registry.clone(),
        metrics: Arc::new(MetricsCollector::new()),
        ctx: job.ctx.clone(),
        cancel: CancellationToken::new(),
    };

    let total = BatchOrchestrator::run(&job.shards, job_ctx, &estimate).await?;
    job.registry.record_use(&job.query_code, chrono::Utc::now().naive_utc())?;
    Ok(total)
}
