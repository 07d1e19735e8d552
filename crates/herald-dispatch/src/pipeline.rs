use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};

use herald_db::NotificationStore;

use crate::gateway::PushGateway;
use crate::retention::RetentionJob;
use crate::scheduler::{DispatchScheduler, SchedulerConfig};
use crate::stats::DispatchStats;
use crate::worker::{WorkerContext, WorkerPool};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of workers, and capacity of the queue between scheduler and workers.
    pub worker_count: usize,
    pub scheduler: SchedulerConfig,
    pub retention_window: Duration,
    /// Local wall-clock time of the daily retention run.
    pub retention_run_at: NaiveTime,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            scheduler: SchedulerConfig::default(),
            retention_window: Duration::from_secs(24 * 3600),
            retention_run_at: NaiveTime::default(),
        }
    }
}

/// Running scheduler, worker pool and retention job.
pub struct Pipeline {
    shutdown: CancellationToken,
    scheduler: JoinHandle<()>,
    retention: JoinHandle<()>,
    workers: WorkerPool,
    stats: Arc<DispatchStats>,
}

impl Pipeline {
    pub fn start(
        config: PipelineConfig,
        store: Arc<dyn NotificationStore>,
        gateway: Arc<dyn PushGateway>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        let worker_count = config.worker_count.max(1);
        let shutdown = CancellationToken::new();
        let (tx, rx) = mpsc::channel(worker_count);

        let ctx = Arc::new(WorkerContext {
            store: store.clone(),
            gateway,
            stats: stats.clone(),
        });
        let workers = WorkerPool::spawn(worker_count, rx, ctx);

        let scheduler = DispatchScheduler::new(store.clone(), tx, config.scheduler, stats.clone());
        let scheduler = tokio::spawn(
            scheduler
                .run(shutdown.clone())
                .instrument(info_span!("scheduler")),
        );

        let retention = RetentionJob::new(store, config.retention_window, config.retention_run_at);
        let retention = tokio::spawn(
            retention
                .run(shutdown.clone())
                .instrument(info_span!("retention")),
        );

        info!(workers = worker_count, "Dispatch pipeline started");

        Self {
            shutdown,
            scheduler,
            retention,
            workers,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    /// Stop polling, let workers finish everything already queued, then return.
    pub async fn shutdown(self) {
        self.shutdown.cancel();

        if let Err(e) = self.scheduler.await {
            error!("Scheduler task failed: {}", e);
        }
        if let Err(e) = self.retention.await {
            error!("Retention task failed: {}", e);
        }
        self.workers.join().await;

        let stats = self.stats.snapshot();
        info!(
            processed = stats.processed,
            deferred = stats.deferred,
            gateway_errors = stats.gateway_errors,
            "Dispatch pipeline stopped"
        );
    }
}
