use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters exposed by the capture pipeline. Observability only; nothing in
/// the control flow reads them.
#[derive(Debug, Default)]
pub struct PipelineStats {
    ticks: AtomicU64,
    batches: AtomicU64,
    capture_failures: AtomicU64,
    classification_failures: AtomicU64,
    timeouts: AtomicU64,
    suspended_ticks: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatsSnapshot {
    pub ticks: u64,
    pub batches: u64,
    pub capture_failures: u64,
    pub classification_failures: u64,
    pub timeouts: u64,
    pub suspended_ticks: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_capture_failure(&self) {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_classification_failure(&self) {
        self.classification_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suspended_tick(&self) {
        self.suspended_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            classification_failures: self.classification_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            suspended_ticks: self.suspended_ticks.load(Ordering::Relaxed),
        }
    }
}
