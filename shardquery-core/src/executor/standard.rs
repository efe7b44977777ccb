//! StandardExecutor (spec §4.13): plain offset pagination, fixed batch of
//! 10,000, used whenever the query isn't eligible for consolidation.

use crate::config::StandardConfig;
use crate::memory::MemoryMonitor;
use crate::model::FilterParams;
use crate::page::PageCalculator;
use crate::shard_store::{ProcessingContext, ShardStore};
use crate::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Runs the offset loop against one shard for one query, forwarding pages to
/// `ctx` as they arrive. Returns the total row count forwarded.
pub async fn run(
    shard: &dyn ShardStore,
    query_code: &str,
    mut filters: FilterParams,
    config: &StandardConfig,
    memory: &MemoryMonitor,
    ctx: &dyn ProcessingContext,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut offset = 0u64;
    let mut total = 0u64;

    for iteration in 0..config.max_iterations {
        let batch_size = memory.optimal_batch_size(config.batch_size);
        filters.clear_pagination();
        filters.limit = Some(batch_size);
        filters.offset = Some(offset);

        let mut rows = shard
            .execute_page(query_code, &filters)
            .await
            .map_err(|e| Error::from_shard_failure(shard.province(), query_code, e))?;

        let returned = rows.len() as u64;
        for row in rows.iter_mut() {
            row.restamp_province(shard.province());
        }
        total += returned;
        if !rows.is_empty() {
            ctx.push(rows).await.map_err(Error::Internal)?;
        }

        if !PageCalculator::should_continue(returned, batch_size) {
            return Ok(total);
        }

        offset += batch_size;
        if iteration + 1 == config.max_iterations {
            warn!(
                shard = shard.province(),
                query_code, "standard executor hit the safety cap of {} iterations", config.max_iterations
            );
            return Ok(total);
        }
        memory.pause_if_needed(cancel).await;
    }

    Ok(total)
}
