//! Dispatch side of the notification outbox.
//!
//! Rows written by ingress are picked up by the [`DispatchScheduler`],
//! claimed in the store, and handed to a fixed [`WorkerPool`] over a bounded
//! channel. Workers call the [`PushGateway`] and mark each row processed once
//! the attempt completes. The [`RetentionJob`] purges old rows once a day.
//!
//! ## Guarantees
//! - At-least-once dispatch attempts; abandoned claims expire after a lease
//! - Bounded in-memory queue, never blocks the scheduler
//! - Clean shutdown: queued work drains before workers exit
//!
//! ## Non-Guarantees
//! - Exactly-once delivery
//! - Ordering across notifications

pub mod gateway;
pub mod http_gateway;
pub mod pipeline;
pub mod retention;
pub mod scheduler;
pub mod stats;
pub mod worker;

pub use gateway::{GatewayError, PushGateway, PushMessage, SendReport, TokenOutcome, build_messages};
pub use http_gateway::HttpPushGateway;
pub use pipeline::{Pipeline, PipelineConfig};
pub use retention::{RetentionJob, RetentionReport, next_run_after};
pub use scheduler::{DispatchScheduler, SchedulerConfig, TickSummary};
pub use stats::{DispatchStats, StatsSnapshot};
pub use worker::{DispatchOutcome, WorkerContext, WorkerPool};
