use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use herald_types::{NewNotification, Notification, NotificationId};

use crate::models::{NOTIFICATION_COLUMNS, NotificationRow, format_timestamp};
use crate::store::Claim;
use crate::{Database, StoreError};

impl Database {
    pub fn insert_notification(&self, n: &NewNotification) -> Result<NotificationId, StoreError> {
        let device_tokens = serde_json::to_string(&n.device_tokens)?;
        let data = serde_json::to_string(&n.data)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications
                    (message, title, body, image_url, analytics_label, device_tokens, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    n.message,
                    n.title,
                    n.body,
                    n.image_url,
                    n.analytics_label,
                    device_tokens,
                    data,
                    format_timestamp(n.created_at),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_notification(&self, id: NotificationId) -> Result<Option<Notification>, StoreError> {
        self.with_conn(|conn| query_notification(conn, id))
    }

    pub fn fetch_pending_unclaimed(&self, limit: usize) -> Result<Vec<Notification>, StoreError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM notifications
                 WHERE processed = 0 AND processing = 0
                 ORDER BY id
                 LIMIT ?1",
                NOTIFICATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit as i64], NotificationRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter().map(Notification::try_from).collect()
        })
    }

    /// Single conditional UPDATE, so concurrent claimers cannot both win.
    pub fn mark_claimed(&self, id: NotificationId, now: DateTime<Utc>) -> Result<Claim, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET processing = 1, claimed_at = ?2
                 WHERE id = ?1 AND processed = 0 AND processing = 0",
                params![id, format_timestamp(now)],
            )?;
            if changed == 1 {
                return Ok(Claim::Acquired);
            }
            if row_exists(conn, id)? {
                Ok(Claim::Taken)
            } else {
                Err(StoreError::NotFound(id))
            }
        })
    }

    pub fn mark_unclaimed(&self, id: NotificationId) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET processing = 0, claimed_at = NULL
                 WHERE id = ?1 AND processed = 0",
                [id],
            )?;
            if changed == 0 && !row_exists(conn, id)? {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
    }

    pub fn mark_processed(&self, id: NotificationId) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET processed = 1, processing = 0 WHERE id = ?1",
                [id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
    }

    /// Release claims older than `claimed_before` that never reached `processed`.
    pub fn reclaim_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET processing = 0, claimed_at = NULL
                 WHERE processing = 1 AND processed = 0
                   AND (claimed_at IS NULL OR claimed_at < ?1)",
                [format_timestamp(claimed_before)],
            )?;
            Ok(changed as u64)
        })
    }

    pub fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notifications WHERE created_at < ?1",
                [format_timestamp(threshold)],
            )?;
            Ok(deleted as u64)
        })
    }

    pub fn vacuum(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch("VACUUM")?;
            Ok(())
        })
    }
}

fn query_notification(conn: &Connection, id: NotificationId) -> Result<Option<Notification>, StoreError> {
    let sql = format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLUMNS);
    let row = conn
        .query_row(&sql, [id], NotificationRow::from_row)
        .optional()?;

    row.map(Notification::try_from).transpose()
}

fn row_exists(conn: &Connection, id: NotificationId) -> Result<bool, StoreError> {
    let found = conn
        .query_row("SELECT 1 FROM notifications WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}
