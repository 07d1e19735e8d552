use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span};

use herald_db::NotificationStore;
use herald_types::Notification;

use crate::gateway::{PushGateway, build_messages};
use crate::stats::DispatchStats;

/// Shared, read-only context for all workers.
pub struct WorkerContext {
    pub store: Arc<dyn NotificationStore>,
    pub gateway: Arc<dyn PushGateway>,
    pub stats: Arc<DispatchStats>,
}

/// How one dispatch attempt ended. The row is marked processed either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Attempted { succeeded: usize, failed: usize },
    GatewayUnavailable,
}

/// Fixed set of long-lived workers sharing one bounded queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        worker_count: usize,
        rx: mpsc::Receiver<Notification>,
        ctx: Arc<WorkerContext>,
    ) -> Self {
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..worker_count.max(1))
            .map(|worker| {
                let span = info_span!("worker", worker);
                tokio::spawn(worker_loop(worker, rx.clone(), ctx.clone()).instrument(span))
            })
            .collect();

        Self { handles }
    }

    /// Wait for every worker to exit. Workers exit once the queue is closed
    /// and empty.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<Notification>>>,
    ctx: Arc<WorkerContext>,
) {
    loop {
        let next = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };

        let Some(notification) = next else { break };

        process_notification(&notification, &ctx).await;
    }

    debug!(worker, "Worker exiting, queue drained");
}

/// Send one notification and record the attempt.
///
/// `processed` is set whatever the per-token outcome, including when the
/// gateway cannot be initialised. There is no retry or dead-letter path.
pub async fn process_notification(notification: &Notification, ctx: &WorkerContext) -> DispatchOutcome {
    let id = notification.id;
    let messages = build_messages(notification);

    let started = Instant::now();
    let outcome = match ctx.gateway.send_each(&messages).await {
        Ok(report) => {
            let elapsed = started.elapsed();
            let succeeded = report.success_count();
            let failed = report.failure_count();
            ctx.stats.record_send(succeeded, failed, elapsed);

            info!(
                id,
                tokens = messages.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                success_count = succeeded,
                failure_count = failed,
                "Dispatched notification"
            );
            for outcome in report.outcomes.iter().filter(|o| !o.is_success()) {
                debug!(id, error = outcome.error.as_deref().unwrap_or_default(), "Token rejected");
            }

            DispatchOutcome::Attempted { succeeded, failed }
        }
        Err(e) => {
            ctx.stats.record_gateway_error();
            error!(id, error = %e, "Gateway unavailable, abandoning batch");
            DispatchOutcome::GatewayUnavailable
        }
    };

    match ctx.store.mark_processed(id).await {
        Ok(()) => ctx.stats.record_processed(),
        Err(e) => error!(id, error = %e, "Failed to mark notification processed"),
    }

    outcome
}
