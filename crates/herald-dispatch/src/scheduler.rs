use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use herald_db::{Claim, NotificationStore, StoreError};
use herald_types::{Notification, NotificationId};

use crate::stats::DispatchStats;

/// Floor for the poll period. `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// Maximum rows fetched per tick.
    pub batch_size: usize,
    /// Claims older than this are presumed abandoned and released.
    pub claim_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 100,
            claim_timeout: Duration::from_secs(300),
        }
    }
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub reclaimed: u64,
    pub fetched: usize,
    pub enqueued: usize,
    /// Claimed, then reverted because the worker queue was full. Claiming
    /// stops for the rest of the tick once this happens.
    pub deferred: usize,
    /// Lost the claim to another scheduler, or the row disappeared.
    pub skipped: usize,
}

/// Polls the store for unclaimed work and feeds the worker queue.
///
/// The scheduler owns the only sender of the worker channel. When it stops,
/// the channel closes and workers drain what is left.
pub struct DispatchScheduler {
    store: Arc<dyn NotificationStore>,
    tx: mpsc::Sender<Notification>,
    config: SchedulerConfig,
    stats: Arc<DispatchStats>,
}

impl DispatchScheduler {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        tx: mpsc::Sender<Notification>,
        config: SchedulerConfig,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            store,
            tx,
            config,
            stats,
        }
    }

    /// Tick until `shutdown` fires. Storage errors never end the loop.
    pub async fn run(self, shutdown: CancellationToken) {
        let period = self.config.poll_interval.max(MIN_POLL_INTERVAL);
        if period != self.config.poll_interval {
            warn!(
                requested_ms = self.config.poll_interval.as_millis() as u64,
                "Poll interval below minimum, clamping"
            );
        }
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval_ms = period.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Dispatch scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            match self.tick().await {
                Ok(summary) => {
                    if summary.fetched > 0 || summary.reclaimed > 0 {
                        debug!(
                            fetched = summary.fetched,
                            enqueued = summary.enqueued,
                            deferred = summary.deferred,
                            skipped = summary.skipped,
                            reclaimed = summary.reclaimed,
                            "Scheduler tick"
                        );
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Scheduler tick failed, retrying next interval");
                }
            }
        }

        info!("Dispatch scheduler stopped");
    }

    /// One poll cycle: release stale claims, fetch, claim, enqueue.
    pub async fn tick(&self) -> Result<TickSummary, StoreError> {
        let now = Utc::now();
        let mut summary = TickSummary::default();

        if let Some(cutoff) = self.lease_cutoff(now) {
            summary.reclaimed = self.store.reclaim_stale(cutoff).await?;
            if summary.reclaimed > 0 {
                warn!(count = summary.reclaimed, "Released abandoned claims");
                self.stats.record_reclaimed(summary.reclaimed);
            }
        }

        let pending = self
            .store
            .fetch_pending_unclaimed(self.config.batch_size)
            .await?;
        summary.fetched = pending.len();

        for mut notification in pending {
            let id = notification.id;

            match self.store.mark_claimed(id, now).await {
                Ok(Claim::Acquired) => {}
                Ok(Claim::Taken) | Err(StoreError::NotFound(_)) => {
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(id, error = %e, "Failed to claim notification");
                    summary.skipped += 1;
                    continue;
                }
            }
            self.stats.record_claimed();

            notification.processing = true;
            notification.claimed_at = Some(now);

            match self.tx.try_send(notification) {
                Ok(()) => summary.enqueued += 1,
                Err(TrySendError::Full(n)) => {
                    // Rows after this one were never claimed and stay eligible
                    info!(id = n.id, "Worker queue full, deferring to next tick");
                    self.revert_claim(n.id).await;
                    self.stats.record_deferred();
                    summary.deferred += 1;
                    break;
                }
                Err(TrySendError::Closed(n)) => {
                    warn!(id = n.id, "Worker queue closed, stopping tick");
                    self.revert_claim(n.id).await;
                    summary.deferred += 1;
                    break;
                }
            }
        }

        Ok(summary)
    }

    fn lease_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let lease = TimeDelta::from_std(self.config.claim_timeout).ok()?;
        now.checked_sub_signed(lease)
    }

    async fn revert_claim(&self, id: NotificationId) {
        if let Err(e) = self.store.mark_unclaimed(id).await {
            // The lease releases it eventually
            error!(id, error = %e, "Failed to revert claim");
        }
    }
}
