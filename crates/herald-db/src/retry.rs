use std::time::Duration;

use tracing::{error, warn};

use herald_types::{NewNotification, NotificationId};

use crate::{NotificationStore, StoreError};

/// Linear backoff for inserts that hit write contention.
///
/// Attempt `i` (1-based) that fails with [`StoreError::Busy`] is followed by
/// a wait of `i * unit`. No wait follows the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.unit * attempt
    }
}

pub async fn insert_with_retry<S>(
    store: &S,
    notification: &NewNotification,
    policy: RetryPolicy,
) -> Result<NotificationId, StoreError>
where
    S: NotificationStore + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match store.insert(notification).await {
            Ok(id) => return Ok(id),
            Err(StoreError::Busy(reason)) => {
                if attempt == max_attempts {
                    break;
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "Store busy, retrying insert"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }

    error!(attempts = max_attempts, "Failed to save notification, giving up");
    Err(StoreError::RetriesExhausted {
        attempts: max_attempts,
    })
}
