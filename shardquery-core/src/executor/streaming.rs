//! StreamingExecutor (spec §4.15): drains a shard's row-callback driver into
//! fixed-size chunks, with an optional per-row transform.

use crate::config::StreamingConfig;
use crate::memory::MemoryMonitor;
use crate::model::FilterParams;
use crate::shard_store::{ProcessingContext, ShardStore};
use crate::types::Row;
use crate::{Error, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

async fn flush_chunk(
    buffer: &mut Vec<Row>,
    ctx: &dyn ProcessingContext,
    chunk_count: &mut u32,
    config: &StreamingConfig,
    province: &str,
) -> Result<u64> {
    let batch = std::mem::replace(buffer, Vec::with_capacity(config.chunk_size));
    let n = batch.len() as u64;
    ctx.push(batch).await.map_err(Error::Internal)?;
    *chunk_count += 1;
    if *chunk_count % config.log_frequency == 0 {
        info!(province, chunks = *chunk_count, "streaming progress");
    }
    Ok(n)
}

/// Plain streaming drain: every row is forwarded unchanged.
pub async fn run(
    shard: &dyn ShardStore,
    query_code: &str,
    filters: FilterParams,
    config: &StreamingConfig,
    memory: &MemoryMonitor,
    ctx: &dyn ProcessingContext,
    cancel: &CancellationToken,
) -> Result<u64> {
    run_with_transform(shard, query_code, filters, config, memory, ctx, cancel, Some).await
}

/// `executeWithTransform`: maps each row through `transform`; a `None`
/// result drops the row silently.
pub async fn run_with_transform<F>(
    shard: &dyn ShardStore,
    query_code: &str,
    mut filters: FilterParams,
    config: &StreamingConfig,
    memory: &MemoryMonitor,
    ctx: &dyn ProcessingContext,
    cancel: &CancellationToken,
    transform: F,
) -> Result<u64>
where
    F: Fn(Row) -> Option<Row> + Send + Sync,
{
    filters.clear_pagination();
    let province = shard.province().to_string();

    let (tx, mut rx) = mpsc::unbounded_channel::<Row>();

    let consumer = async {
        let mut buffer: Vec<Row> = Vec::with_capacity(config.chunk_size);
        let mut chunk_count = 0u32;
        let mut total = 0u64;
        while let Some(mut row) = rx.recv().await {
            row.restamp_province(&province);
            buffer.push(row);
            if buffer.len() >= config.chunk_size {
                total += flush_chunk(&mut buffer, ctx, &mut chunk_count, config, &province).await?;
                memory.pause_if_needed(cancel).await;
                memory.hint_gc_if_needed(cancel).await;
            }
        }
        if !buffer.is_empty() {
            total += flush_chunk(&mut buffer, ctx, &mut chunk_count, config, &province).await?;
        }
        Ok::<u64, Error>(total)
    };

    let producer = async {
        shard
            .execute(query_code, &filters, &mut |row| {
                if let Some(row) = transform(row) {
                    let _ = tx.send(row);
                }
            })
            .await
    };

    let (consumer_result, producer_result) = tokio::join!(consumer, producer);
    producer_result.map_err(|e| Error::shard(shard.province(), query_code, e))?;
    consumer_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::model::FilterParams;
    use crate::types::Value;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;
    use tokio::sync::Mutex;

    struct StreamShard {
        rows: u64,
    }

    #[async_trait]
    impl ShardStore for StreamShard {
        fn province(&self) -> &str {
            "mendoza"
        }

        async fn execute_page(&self, _query_code: &str, _filters: &FilterParams) -> anyhow::Result<Vec<Row>> {
            unimplemented!()
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
                row.set("row_id", Value::Integer(7));
                row_cb(row);
            }
            Ok(())
        }

        async fn count(&self, _sql: &str, _filters: &FilterParams) -> anyhow::Result<u64> {
            unimplemented!()
        }
    }

    struct CollectingContext {
        batches: Mutex<Vec<Vec<Row>>>,
    }

    #[async_trait]
    impl ProcessingContext for CollectingContext {
        async fn push(&self, batch: Vec<Row>) -> anyhow::Result<()> {
            self.batches.lock().await.push(batch);
            Ok(())
        }

        async fn drain_all(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn chunks_rows_and_flushes_residual() {
        let shard = StreamShard { rows: 25 };
        let memory = MemoryMonitor::new(MemoryConfig::default());
        let ctx = CollectingContext { batches: Mutex::new(Vec::new()) };
        let config = StreamingConfig {
            chunk_size: 10,
            log_frequency: 1,
        };
        let cancel = CancellationToken::new();

        let total = run(&shard, "q1", FilterParams::default(), &config, &memory, &ctx, &cancel)
            .await
            .unwrap();

        assert_eq!(total, 25);
        let batches = ctx.batches.lock().await;
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 10);
        assert_eq!(batches[2].len(), 5);
        assert!(batches[0].iter().all(|r| r.get("row_id").is_none()));
    }

    #[tokio::test]
    async fn oscillating_memory_pressure_never_drops_or_reorders_rows() {
        let shard = StreamShard { rows: 30 };
        let memory = MemoryMonitor::new(MemoryConfig { pause_ms: 1, gc_pause_ms: 1, ..MemoryConfig::default() });
        let ctx = CollectingContext { batches: Mutex::new(Vec::new()) };
        let config = StreamingConfig {
            chunk_size: 10,
            log_frequency: 1,
        };
        let cancel = CancellationToken::new();

        memory.set_ratio(0.40);
        let ratios = [0.72, 0.90];
        let step = std::sync::atomic::AtomicUsize::new(0);
        let total = run_with_transform(
            &shard,
            "q1",
            FilterParams::default(),
            &config,
            &memory,
            &ctx,
            &cancel,
            |row| {
                let i = step.fetch_add(1, Ordering::SeqCst);
                if i < ratios.len() {
                    memory.set_ratio(ratios[i]);
                }
                Some(row)
            },
        )
        .await
        .unwrap();

        assert_eq!(total, 30);
        let batches = ctx.batches.lock().await;
        assert_eq!(batches.len(), 3);
        let ids: Vec<i64> = batches
            .iter()
            .flatten()
            .map(|r| r.get("id").unwrap().as_integer().unwrap())
            .collect();
        assert_eq!(ids, (0..30).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn transform_drops_rows_that_map_to_none() {
        let shard = StreamShard { rows: 10 };
        let memory = MemoryMonitor::new(MemoryConfig::default());
        let ctx = CollectingContext { batches: Mutex::new(Vec::new()) };
        let config = StreamingConfig {
            chunk_size: 100,
            log_frequency: 1,
        };
        let cancel = CancellationToken::new();

        let total = run_with_transform(
            &shard,
            "q1",
            FilterParams::default(),
            &config,
            &memory,
            &ctx,
            &cancel,
            |row| {
                let keep = matches!(row.get("id"), Some(Value::Integer(i)) if i % 2 == 0);
                keep.then_some(row)
            },
        )
        .await
        .unwrap();

        assert_eq!(total, 5);
    }
}
