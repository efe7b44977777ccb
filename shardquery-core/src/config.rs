//! Configuration management for ShardQuery
//!
//! Every tunable in the spec's "Configuration (all overridable)" table lives
//! here, grouped into the sub-configs each component actually consumes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for a ShardQuery job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub consolidation: ConsolidationConfig,
    pub memory: MemoryConfig,
    pub streaming: StreamingConfig,
    pub standard: StandardConfig,
    pub analysis: AnalysisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            consolidation: ConsolidationConfig::default(),
            memory: MemoryConfig::default(),
            streaming: StreamingConfig::default(),
            standard: StandardConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Config {
    /// Validate the configuration. Mirrors the invariants spec §4.7 and
    /// §4.15 call out explicitly; called once at job construction.
    pub fn validate(&self) -> crate::Result<()> {
        let m = &self.memory;
        if !(m.critical > m.high && m.high > m.normal) {
            return Err(crate::Error::configuration(
                "memory thresholds must satisfy critical > high > normal",
            ));
        }
        if !(0.0..=1.0).contains(&m.normal)
            || !(0.0..=1.0).contains(&m.high)
            || !(0.0..=1.0).contains(&m.critical)
        {
            return Err(crate::Error::configuration(
                "memory thresholds must lie within [0, 1]",
            ));
        }
        if !(100..=10_000).contains(&self.streaming.chunk_size) {
            return Err(crate::Error::configuration(
                "streaming.chunk_size must be within [100, 10000]",
            ));
        }
        if self.orchestrator.max_parallel_per_group == 0 {
            return Err(crate::Error::configuration(
                "orchestrator.max_parallel_per_group must be greater than 0",
            ));
        }
        if self.consolidation.agg_memory_threshold >= self.consolidation.agg_streaming_threshold {
            return Err(crate::Error::configuration(
                "consolidation.agg_memory_threshold must be less than agg_streaming_threshold",
            ));
        }
        Ok(())
    }
}

/// Strategy-selection and dispatch thresholds for the `BatchOrchestrator`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Mean per-shard estimate below which PARALLEL is eligible.
    pub parallel_per_shard: u64,
    /// Total estimate below which PARALLEL is eligible.
    pub parallel_total: u64,
    /// Max per-shard estimate above which SEQUENTIAL is forced.
    pub massive_per_shard: u64,
    /// Group size used by the HYBRID strategy.
    pub max_parallel_per_group: usize,
    /// How often the progress ticker reports during PARALLEL runs.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            parallel_per_shard: 50_000,
            parallel_total: 300_000,
            massive_per_shard: 200_000,
            max_parallel_per_group: 6,
            progress_interval: Duration::from_secs(3),
        }
    }
}

/// Thresholds consumed by `ConsolidationPlanner` and `ConsolidatedExecutor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Below this estimate, choose AGGREGATION.
    pub agg_memory_threshold: u64,
    /// Below this estimate (and at/above the memory threshold), choose
    /// AGGREGATION_STREAMING; at/above it, AGGREGATION_HIGH_VOLUME.
    pub agg_streaming_threshold: u64,
    /// Cap applied to the cardinality-product estimate.
    pub max_cardinality_estimate: u64,
    /// `limiteValidacion`: probe size for ConsolidatedExecutor S1.
    pub validation_limit: u64,
    /// `limiteAbsoluto`: hard ceiling on paged-consolidated iteration.
    pub absolute_limit: u64,
    /// `errorFactor`: drift multiplier.
    pub error_factor: u64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            agg_memory_threshold: 50_000,
            agg_streaming_threshold: 100_000,
            max_cardinality_estimate: 10_000_000,
            validation_limit: 10_000,
            absolute_limit: 100_000,
            error_factor: 10,
        }
    }
}

/// Heap-pressure thresholds and cooperative pause/GC-hint timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub normal: f64,
    pub high: f64,
    pub critical: f64,
    pub pause_ms: u64,
    pub gc_pause_ms: u64,
    pub min_batch_size: u64,
    pub max_batch_size: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            normal: 0.50,
            high: 0.70,
            critical: 0.85,
            pause_ms: 50,
            gc_pause_ms: 100,
            min_batch_size: 1_000,
            max_batch_size: 10_000,
        }
    }
}

/// Tunables for `StreamingExecutor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    pub chunk_size: usize,
    pub log_frequency: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            log_frequency: 10,
        }
    }
}

/// Tunables for `StandardExecutor` and `DatasetEstimator`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardConfig {
    pub batch_size: u64,
    pub max_iterations: u32,
}

impl Default for StandardConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            max_iterations: 100,
        }
    }
}

/// SQL analysis limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub max_sql_length: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_sql_length: 100_000,
        }
    }
}
