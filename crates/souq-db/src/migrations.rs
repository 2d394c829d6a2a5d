use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Users, projects and offers live in the platform's main database; rows here
/// reference them by id only.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            from_user_id    TEXT NOT NULL,
            to_user_id      TEXT NOT NULL,
            project_id      TEXT,
            content         TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            is_read         INTEGER NOT NULL DEFAULT 0,
            delivery_status TEXT NOT NULL DEFAULT 'sent'
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(from_user_id, to_user_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_recipient_status
            ON messages(to_user_id, delivery_status);

        -- seq gives a total creation order used to bound mark-all-read sweeps
        CREATE TABLE IF NOT EXISTS notifications (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            id          TEXT NOT NULL UNIQUE,
            user_id     TEXT NOT NULL,
            kind        TEXT NOT NULL,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            action_url  TEXT,
            metadata    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, seq);

        CREATE TABLE IF NOT EXISTS notification_preferences (
            user_id     TEXT PRIMARY KEY,
            message     INTEGER NOT NULL DEFAULT 1,
            offer       INTEGER NOT NULL DEFAULT 1,
            project     INTEGER NOT NULL DEFAULT 1,
            payment     INTEGER NOT NULL DEFAULT 1,
            system      INTEGER NOT NULL DEFAULT 1,
            email       INTEGER NOT NULL DEFAULT 1,
            updated_at  TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
