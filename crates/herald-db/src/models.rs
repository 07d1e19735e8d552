//! Database row types: these map directly to SQLite rows.
//! Distinct from herald-types models so JSON and timestamp decoding stay here.

use chrono::{DateTime, SecondsFormat, Utc};

use herald_types::Notification;

use crate::StoreError;

pub(crate) const NOTIFICATION_COLUMNS: &str = "id, message, title, body, image_url, analytics_label, \
     device_tokens, data, processed, processing, claimed_at, created_at";

pub struct NotificationRow {
    pub id: i64,
    pub message: String,
    pub title: String,
    pub body: String,
    pub image_url: String,
    pub analytics_label: String,
    pub device_tokens: String,
    pub data: String,
    pub processed: bool,
    pub processing: bool,
    pub claimed_at: Option<String>,
    pub created_at: String,
}

impl NotificationRow {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            message: row.get(1)?,
            title: row.get(2)?,
            body: row.get(3)?,
            image_url: row.get(4)?,
            analytics_label: row.get(5)?,
            device_tokens: row.get(6)?,
            data: row.get(7)?,
            processed: row.get(8)?,
            processing: row.get(9)?,
            claimed_at: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            message: row.message,
            title: row.title,
            body: row.body,
            image_url: row.image_url,
            analytics_label: row.analytics_label,
            device_tokens: serde_json::from_str(&row.device_tokens)?,
            data: serde_json::from_str(&row.data)?,
            processed: row.processed,
            processing: row.processing,
            claimed_at: row.claimed_at.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Fixed-width RFC 3339 in UTC, so stored timestamps compare correctly as text.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 59).unwrap();
        let late = early + Duration::milliseconds(1500);
        assert!(format_timestamp(early) < format_timestamp(late));
        assert_eq!(parse_timestamp(&format_timestamp(late)).unwrap(), late);
    }

    #[test]
    fn sub_millisecond_precision_is_kept() {
        let base = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let a = base + Duration::microseconds(100);
        let b = base + Duration::microseconds(900);

        assert_eq!(format_timestamp(a).len(), format_timestamp(base).len());
        assert!(format_timestamp(base) < format_timestamp(a));
        assert!(format_timestamp(a) < format_timestamp(b));
        assert_eq!(parse_timestamp(&format_timestamp(a)).unwrap(), a);
    }

    #[test]
    fn malformed_tokens_are_reported_as_corrupt() {
        let row = NotificationRow {
            id: 7,
            message: String::new(),
            title: String::new(),
            body: String::new(),
            image_url: String::new(),
            analytics_label: String::new(),
            device_tokens: "tok-a,tok-b".into(),
            data: "{}".into(),
            processed: false,
            processing: false,
            claimed_at: None,
            created_at: format_timestamp(Utc::now()),
        };

        assert!(matches!(
            Notification::try_from(row),
            Err(StoreError::Corrupt(_))
        ));
    }
}
