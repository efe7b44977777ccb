//! `executeShard` dispatch (spec §4.12): routes one shard's work to
//! `ConsolidatedExecutor` or `StandardExecutor` based on the query's
//! analysed metadata.

use crate::analyser::is_no_pagination_consolidated;
use crate::config::Config;
use crate::executor::{consolidated, standard};
use crate::memory::MemoryMonitor;
use crate::metrics::MetricsCollector;
use crate::model::{FilterParams, PaginationStrategy};
use crate::registry::QueryRegistry;
use crate::shard_store::{ProcessingContext, ShardStore};
use crate::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Dispatch one shard. `estimated_rows`/`pagination_strategy`/`consolidable`
/// come from the query's persisted `QueryMetadata`.
#[allow(clippy::too_many_arguments)]
pub async fn execute_shard(
    shard: &dyn ShardStore,
    query_code: &str,
    pagination_strategy: PaginationStrategy,
    consolidable: bool,
    estimated_rows: Option<u64>,
    filters: FilterParams,
    config: &Config,
    memory: &MemoryMonitor,
    registry: &dyn QueryRegistry,
    metrics: &MetricsCollector,
    ctx: &dyn ProcessingContext,
    cancel: &CancellationToken,
) -> Result<u64> {
    let result = if is_no_pagination_consolidated(pagination_strategy, consolidable) {
        consolidated::run(
            shard,
            query_code,
            estimated_rows,
            filters,
            &config.consolidation,
            &config.streaming,
            memory,
            registry,
            metrics,
            ctx,
            cancel,
        )
        .await
    } else {
        standard::run(shard, query_code, filters, &config.standard, memory, ctx, cancel).await
    };

    result.map_err(|err| {
        let wrapped = match err {
            Error::MemoryExhaustion { shard: province } => Error::MemoryExhaustion { shard: province },
            other => {
                error!(shard = shard.province(), query_code, error = %other, "shard execution failed");
                other
            }
        };
        wrapped
    })
}
