use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Server every new user joins on registration.
pub const DEFAULT_SERVER_ID: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                avatar_url      TEXT,
                status          TEXT NOT NULL DEFAULT 'offline',
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE servers (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                icon_url    TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE server_members (
                server_id   INTEGER NOT NULL REFERENCES servers(id),
                user_id     INTEGER NOT NULL REFERENCES users(id),
                joined_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (server_id, user_id)
            );

            CREATE INDEX idx_server_members_user ON server_members(user_id);

            CREATE TABLE channels (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                server_id   INTEGER NOT NULL REFERENCES servers(id),
                name        TEXT NOT NULL,
                type        TEXT NOT NULL DEFAULT 'text' CHECK (type IN ('text', 'voice'))
            );

            CREATE INDEX idx_channels_server ON channels(server_id, id);

            CREATE TABLE messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id  INTEGER NOT NULL REFERENCES channels(id),
                user_id     INTEGER NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_messages_channel ON messages(channel_id, created_at);

            CREATE TABLE friendships (
                user_id     INTEGER NOT NULL REFERENCES users(id),
                friend_id   INTEGER NOT NULL REFERENCES users(id),
                status      TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (user_id, friend_id),
                CHECK (user_id != friend_id)
            );

            CREATE INDEX idx_friendships_friend ON friendships(friend_id);

            -- Seed the default server and its channels
            INSERT INTO servers (id, name, icon_url) VALUES (1, 'Hearth', '🔥');
            INSERT INTO channels (server_id, name, type) VALUES
                (1, 'general', 'text'),
                (1, 'random', 'text'),
                (1, 'Lounge', 'voice');

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
