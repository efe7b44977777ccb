//! External interfaces (spec §6): the capabilities the core requires from
//! the outside world (`ShardStore`) and calls to emit output
//! (`ProcessingContext`). Both are object-safe traits so the orchestrator
//! can hold a heterogeneous `Vec<Arc<dyn ShardStore>>`.

use crate::model::FilterParams;
use crate::types::Row;
use async_trait::async_trait;

/// One province-scoped relational database, abstracted away from any
/// concrete connection pool or driver.
#[async_trait]
pub trait ShardStore: Send + Sync {
    /// The province this shard represents.
    fn province(&self) -> &str;

    /// Execute one page of `query_code` and return its rows. Used by
    /// `StandardExecutor` and the paged branch of `ConsolidatedExecutor`.
    async fn execute_page(&self, query_code: &str, filters: &FilterParams) -> anyhow::Result<Vec<Row>>;

    /// Execute `query_code` streaming, invoking `row_cb` once per row in
    /// driver order. Used by `StreamingExecutor`.
    async fn execute(
        &self,
        query_code: &str,
        filters: &FilterParams,
        row_cb: &mut (dyn FnMut(Row) + Send),
    ) -> anyhow::Result<()>;

    /// Execute a raw `COUNT(*)` wrapper SQL string against this shard,
    /// substituting `filters`, and return the integer result. Used by
    /// `DatasetEstimator`.
    async fn count(&self, sql: &str, filters: &FilterParams) -> anyhow::Result<u64>;
}

/// What all executors write output to. May apply back-pressure by blocking
/// `push` (e.g. bounded channel, outbound writer).
#[async_trait]
pub trait ProcessingContext: Send + Sync {
    async fn push(&self, batch: Vec<Row>) -> anyhow::Result<()>;
    async fn drain_all(&self) -> anyhow::Result<()>;
}
