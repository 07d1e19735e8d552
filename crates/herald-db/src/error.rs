use rusqlite::ErrorCode;
use thiserror::Error;

use herald_types::NotificationId;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Write contention; the only error worth retrying.
    #[error("database busy: {0}")]
    Busy(String),

    #[error("notification {0} not found")]
    NotFound(NotificationId),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("storage task failed: {0}")]
    Task(String),

    #[error("gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl StoreError {
    pub fn is_busy(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                StoreError::Busy(e.to_string())
            }
            _ => StoreError::Sqlite(e),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_database_maps_to_busy() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".into()),
        );
        assert!(StoreError::from(err).is_busy());
    }

    #[test]
    fn other_sqlite_errors_are_not_retryable() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(!err.is_busy());
    }
}
