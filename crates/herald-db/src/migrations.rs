use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (notifications)");
        conn.execute_batch(
            "
            CREATE TABLE notifications (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                message         TEXT NOT NULL DEFAULT '',
                title           TEXT NOT NULL DEFAULT '',
                body            TEXT NOT NULL DEFAULT '',
                image_url       TEXT NOT NULL DEFAULT '',
                analytics_label TEXT NOT NULL DEFAULT '',
                device_tokens   TEXT NOT NULL,
                data            TEXT NOT NULL DEFAULT '{}',
                processed       INTEGER NOT NULL DEFAULT 0,
                processing      INTEGER NOT NULL DEFAULT 0,
                claimed_at      TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_pending
                ON notifications(processing, processed);

            CREATE INDEX idx_notifications_created
                ON notifications(created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
