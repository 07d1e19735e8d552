use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeDelta, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use herald_db::{NotificationStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionReport {
    pub threshold: DateTime<Utc>,
    pub deleted: u64,
    pub compacted: bool,
}

/// Daily purge of notifications older than the retention window.
pub struct RetentionJob {
    store: Arc<dyn NotificationStore>,
    window: Duration,
    run_at: NaiveTime,
}

impl RetentionJob {
    pub fn new(store: Arc<dyn NotificationStore>, window: Duration, run_at: NaiveTime) -> Self {
        Self {
            store,
            window,
            run_at,
        }
    }

    /// Sleep until the next local `run_at`, purge, repeat. Failures wait for
    /// the next day.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            let now = Local::now();
            let next = next_run_after(&now, self.run_at);
            let wait = (next.clone() - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, "Retention job scheduled");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            match self.run_once(Utc::now()).await {
                Ok(report) => info!(
                    deleted = report.deleted,
                    compacted = report.compacted,
                    threshold = %report.threshold,
                    "Retention pass complete"
                ),
                Err(e) => warn!(error = %e, "Error cleaning up old notifications"),
            }
        }

        info!("Retention job stopped");
    }

    /// Delete rows created before `now - window`, then compact.
    ///
    /// A failed compaction is logged and reported, not returned.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RetentionReport, StoreError> {
        let threshold = TimeDelta::from_std(self.window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let deleted = self.store.delete_older_than(threshold).await?;

        let compacted = match self.store.compact().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Error compacting storage after cleanup");
                false
            }
        };

        Ok(RetentionReport {
            threshold,
            deleted,
            compacted,
        })
    }
}

/// First instant strictly after `now` whose wall-clock time in `now`'s zone
/// is `at`. Skips days where `at` falls into a DST gap.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();

    for _ in 0..3 {
        if let Some(candidate) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if candidate > *now {
                return candidate;
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    now.clone() + TimeDelta::days(1)
}
