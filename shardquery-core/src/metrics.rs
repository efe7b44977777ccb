//! MetricsCollector / HeartbeatReporter / ProgressMonitor (spec §4.16):
//! live progress and final metrics for a running batch job.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// Per-job metrics: per-shard row counters, a total counter, drift
/// re-estimations and OOM-triggered strategy switches (spec §9(a): these
/// two are tracked separately).
#[derive(Default)]
pub struct MetricsCollector {
    per_shard: DashMap<String, AtomicU64>,
    total_rows: AtomicU64,
    drift_reestimations: AtomicU64,
    oom_strategy_switches: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rows(&self, province: &str, rows: u64) {
        self.per_shard
            .entry(province.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(rows, Ordering::Relaxed);
        self.total_rows.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_drift_reestimation(&self) {
        self.drift_reestimations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oom_strategy_switch(&self) {
        self.oom_strategy_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows.load(Ordering::Relaxed)
    }

    pub fn drift_reestimations(&self) -> u64 {
        self.drift_reestimations.load(Ordering::Relaxed)
    }

    pub fn oom_strategy_switches(&self) -> u64 {
        self.oom_strategy_switches.load(Ordering::Relaxed)
    }

    /// Top-5 shards by rows forwarded, for the final report.
    pub fn top_shards(&self, n: usize) -> Vec<(String, u64)> {
        let mut rows: Vec<(String, u64)> = self
            .per_shard
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows.truncate(n);
        rows
    }

    pub fn final_report(&self) -> String {
        let top = self
            .top_shards(5)
            .into_iter()
            .map(|(p, n)| format!("{p}={n}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "total_rows={} drift_reestimations={} oom_strategy_switches={} top_shards=[{top}]",
            self.total_rows(),
            self.drift_reestimations(),
            self.oom_strategy_switches(),
        )
    }
}

/// Emits `{elapsed, totalRows, memPct}` at most once every 30s.
pub struct HeartbeatReporter {
    started_at: Instant,
    last_emitted: parking_lot::Mutex<Option<Instant>>,
}

impl HeartbeatReporter {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            last_emitted: parking_lot::Mutex::new(None),
        }
    }

    pub fn maybe_emit(&self, total_rows: u64, mem_pct: f64) {
        let now = Instant::now();
        let mut last = self.last_emitted.lock();
        let should_emit = last.map(|t| now.duration_since(t) >= Duration::from_secs(30)).unwrap_or(true);
        if should_emit {
            info!(
                elapsed_secs = self.started_at.elapsed().as_secs(),
                total_rows, mem_pct, "heartbeat"
            );
            *last = Some(now);
        }
    }
}

impl Default for HeartbeatReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-shard lifecycle state, as surfaced by the progress ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardProgressState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Scheduled every `interval` during a parallel/hybrid run; prints
/// completed/in-progress/state-per-shard.
pub struct ProgressMonitor {
    states: DashMap<String, ShardProgressState>,
}

impl ProgressMonitor {
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    pub fn set_state(&self, province: &str, state: ShardProgressState) {
        self.states.insert(province.to_string(), state);
    }

    pub fn completed_count(&self) -> usize {
        self.states
            .iter()
            .filter(|e| *e.value() == ShardProgressState::Completed)
            .count()
    }

    pub fn in_progress_count(&self) -> usize {
        self.states
            .iter()
            .filter(|e| *e.value() == ShardProgressState::InProgress)
            .count()
    }

    pub fn report(&self) -> String {
        format!(
            "completed={} in_progress={} total={}",
            self.completed_count(),
            self.in_progress_count(),
            self.states.len()
        )
    }
}

impl Default for ProgressMonitor {
    fn default() -> Self {
        Self::new()
    }
}
