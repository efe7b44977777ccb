//! MemoryMonitor (spec §4.7): reports a heap usage level, derives a batch
//! size reduction factor, and exposes cooperative pause/GC-hint primitives.

use crate::config::MemoryConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Heap pressure level derived from the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryLevel {
    Low,
    Normal,
    High,
    Critical,
}

/// Reports heap usage and exposes cooperative back-pressure primitives.
/// `ratio` is injected by the host process (e.g. sampled from the runtime
/// heap) rather than measured here — the core is platform-agnostic.
pub struct MemoryMonitor {
    config: MemoryConfig,
    ratio_bits: AtomicU64,
}

impl MemoryMonitor {
    pub fn new(config: MemoryConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            ratio_bits: AtomicU64::new(0f64.to_bits()),
        })
    }

    /// Update the observed heap usage ratio in `[0, 1]`.
    pub fn set_ratio(&self, ratio: f64) {
        self.ratio_bits.store(ratio.to_bits(), Ordering::Relaxed);
    }

    pub fn ratio(&self) -> f64 {
        f64::from_bits(self.ratio_bits.load(Ordering::Relaxed))
    }

    /// `LOW < NORMAL ≤ HIGH ≤ CRITICAL` per the configured thresholds.
    pub fn level(&self) -> MemoryLevel {
        let r = self.ratio();
        if r > self.config.critical {
            MemoryLevel::Critical
        } else if r > self.config.high {
            MemoryLevel::High
        } else if r >= self.config.normal {
            MemoryLevel::Normal
        } else {
            MemoryLevel::Low
        }
    }

    pub fn is_high(&self) -> bool {
        self.ratio() > self.config.high
    }

    pub fn is_critical(&self) -> bool {
        self.ratio() > self.config.critical
    }

    /// `optimalBatchSize`: scale `base` by the level's reduction factor,
    /// clamped to `[min_batch_size, max_batch_size]`.
    pub fn optimal_batch_size(&self, base: u64) -> u64 {
        let factor = match self.level() {
            MemoryLevel::Critical => 0.25,
            MemoryLevel::High => 0.50,
            MemoryLevel::Normal | MemoryLevel::Low => 1.0,
        };
        let scaled = (base as f64 * factor) as u64;
        scaled.clamp(self.config.min_batch_size, self.config.max_batch_size)
    }

    /// If heap usage is high, sleep cooperatively, re-checking cancellation.
    /// A no-op under NORMAL/LOW pressure.
    pub async fn pause_if_needed(&self, cancel: &CancellationToken) {
        if !self.is_high() {
            return;
        }
        debug!(ratio = self.ratio(), "memory pressure high; pausing");
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(self.config.pause_ms)) => {}
            _ = cancel.cancelled() => {}
        }
    }

    /// Under critical pressure, suggest reclamation (platform-dependent, may
    /// be a no-op on this core) and sleep for `gc_pause_ms`. Records the
    /// before/after ratio for diagnostics; never retries.
    pub async fn hint_gc_if_needed(&self, cancel: &CancellationToken) {
        if !self.is_critical() {
            return;
        }
        let before = self.ratio();
        info!(ratio = before, "memory pressure critical; hinting GC");
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(self.config.gc_pause_ms)) => {}
            _ = cancel.cancelled() => {}
        }
        let after = self.ratio();
        debug!(before, after, "gc hint window elapsed");
    }
}
