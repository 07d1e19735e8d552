use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Dispatch counters shared by the scheduler and the workers.
///
/// Built once at startup and handed to each component; there is no global
/// instance.
#[derive(Debug, Default)]
pub struct DispatchStats {
    claimed: AtomicU64,
    deferred: AtomicU64,
    reclaimed: AtomicU64,
    processed: AtomicU64,
    tokens_succeeded: AtomicU64,
    tokens_failed: AtomicU64,
    gateway_errors: AtomicU64,
    gateway_time_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub claimed: u64,
    pub deferred: u64,
    pub reclaimed: u64,
    pub processed: u64,
    pub tokens_succeeded: u64,
    pub tokens_failed: u64,
    pub gateway_errors: u64,
    pub gateway_time_ms: u64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_claimed(&self) {
        self.claimed.fetch_add(1, Ordering::Relaxed);
    }

    /// A claim was reverted because the worker queue was full.
    pub fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reclaimed(&self, count: u64) {
        self.reclaimed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send(&self, succeeded: usize, failed: usize, elapsed: Duration) {
        self.tokens_succeeded.fetch_add(succeeded as u64, Ordering::Relaxed);
        self.tokens_failed.fetch_add(failed as u64, Ordering::Relaxed);
        self.gateway_time_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_gateway_error(&self) {
        self.gateway_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            claimed: self.claimed.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            tokens_succeeded: self.tokens_succeeded.load(Ordering::Relaxed),
            tokens_failed: self.tokens_failed.load(Ordering::Relaxed),
            gateway_errors: self.gateway_errors.load(Ordering::Relaxed),
            gateway_time_ms: self.gateway_time_ms.load(Ordering::Relaxed),
        }
    }
}
