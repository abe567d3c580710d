use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            user_low    TEXT NOT NULL,
            user_high   TEXT NOT NULL,
            sender_id   TEXT NOT NULL,
            body        TEXT NOT NULL,
            is_system   INTEGER NOT NULL DEFAULT 0,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL,
            CHECK (user_low < user_high),
            CHECK (sender_id IN (user_low, user_high))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(user_low, user_high, updated_at);

        -- Viewers a message is hidden from (delete for me, clear chat)
        CREATE TABLE IF NOT EXISTS message_hidden (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL,
            PRIMARY KEY (message_id, user_id)
        );

        -- One row per reactor: re-reacting replaces the row
        CREATE TABLE IF NOT EXISTS reactions (
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL,
            emoji       TEXT NOT NULL,
            created_at  INTEGER NOT NULL,
            PRIMARY KEY (message_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS blocks (
            user_id     TEXT NOT NULL,
            blocked_id  TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, blocked_id)
        );

        CREATE TABLE IF NOT EXISTS nicknames (
            user_id     TEXT NOT NULL,
            contact_id  TEXT NOT NULL,
            nickname    TEXT NOT NULL,
            PRIMARY KEY (user_id, contact_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
