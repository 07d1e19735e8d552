use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use herald_types::{NewNotification, Notification, NotificationId};

use crate::{Claim, NotificationStore, StoreError};

/// In-memory store for tests and lightweight deployments.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    last_id: NotificationId,
    rows: BTreeMap<NotificationId, Notification>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row currently held, in id order.
    pub async fn snapshot(&self) -> Vec<Notification> {
        self.inner.lock().await.rows.values().cloned().collect()
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert(&self, notification: &NewNotification) -> Result<NotificationId, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.last_id += 1;
        let id = inner.last_id;
        inner.rows.insert(id, notification.clone().into_stored(id));
        Ok(id)
    }

    async fn get(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        Ok(self.inner.lock().await.rows.get(&id).cloned())
    }

    async fn fetch_pending_unclaimed(&self, limit: usize) -> Result<Vec<Notification>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .values()
            .filter(|n| n.is_claimable())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_claimed(&self, id: NotificationId, now: DateTime<Utc>) -> Result<Claim, StoreError> {
        let mut inner = self.inner.lock().await;
        let row = inner.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !row.is_claimable() {
            return Ok(Claim::Taken);
        }
        row.processing = true;
        row.claimed_at = Some(now);
        Ok(Claim::Acquired)
    }

    async fn mark_unclaimed(&self, id: NotificationId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let row = inner.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !row.processed {
            row.processing = false;
            row.claimed_at = None;
        }
        Ok(())
    }

    async fn mark_processed(&self, id: NotificationId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let row = inner.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        row.processed = true;
        row.processing = false;
        Ok(())
    }

    async fn reclaim_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut reclaimed = 0;
        for row in inner.rows.values_mut() {
            let stale = row.claimed_at.is_none_or(|at| at < claimed_before);
            if row.processing && !row.processed && stale {
                row.processing = false;
                row.claimed_at = None;
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.rows.len();
        inner.rows.retain(|_, n| n.created_at >= threshold);
        Ok((before - inner.rows.len()) as u64)
    }

    async fn compact(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
