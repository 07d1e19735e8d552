use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use herald_types::{NewNotification, Notification, NotificationId};

use crate::{Database, StoreError};

/// Result of trying to claim a row for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// This caller now owns the row.
    Acquired,
    /// Someone else claimed or finished it first.
    Taken,
}

/// Durable record of notifications and their dispatch state.
///
/// The store is the only coordination point between ingress, the scheduler
/// and the workers. `mark_claimed` must be atomic per row.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: &NewNotification) -> Result<NotificationId, StoreError>;

    async fn get(&self, id: NotificationId) -> Result<Option<Notification>, StoreError>;

    /// Rows with `processed = false AND processing = false`, oldest id first.
    async fn fetch_pending_unclaimed(&self, limit: usize) -> Result<Vec<Notification>, StoreError>;

    async fn mark_claimed(&self, id: NotificationId, now: DateTime<Utc>) -> Result<Claim, StoreError>;

    async fn mark_unclaimed(&self, id: NotificationId) -> Result<(), StoreError>;

    async fn mark_processed(&self, id: NotificationId) -> Result<(), StoreError>;

    async fn reclaim_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn compact(&self) -> Result<(), StoreError>;
}

/// SQLite-backed store.
///
/// rusqlite is synchronous, so every call runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn insert(&self, notification: &NewNotification) -> Result<NotificationId, StoreError> {
        let notification = notification.clone();
        self.blocking(move |db| db.insert_notification(&notification)).await
    }

    async fn get(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        self.blocking(move |db| db.get_notification(id)).await
    }

    async fn fetch_pending_unclaimed(&self, limit: usize) -> Result<Vec<Notification>, StoreError> {
        self.blocking(move |db| db.fetch_pending_unclaimed(limit)).await
    }

    async fn mark_claimed(&self, id: NotificationId, now: DateTime<Utc>) -> Result<Claim, StoreError> {
        self.blocking(move |db| db.mark_claimed(id, now)).await
    }

    async fn mark_unclaimed(&self, id: NotificationId) -> Result<(), StoreError> {
        self.blocking(move |db| db.mark_unclaimed(id)).await
    }

    async fn mark_processed(&self, id: NotificationId) -> Result<(), StoreError> {
        self.blocking(move |db| db.mark_processed(id)).await
    }

    async fn reclaim_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64, StoreError> {
        self.blocking(move |db| db.reclaim_stale(claimed_before)).await
    }

    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        self.blocking(move |db| db.delete_older_than(threshold)).await
    }

    async fn compact(&self) -> Result<(), StoreError> {
        self.blocking(|db| db.vacuum()).await
    }
}
