use crate::Database;
use crate::models::{ChannelRow, ContactRow, MessageRow, ServerRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

const USER_COLUMNS: &str = "id, username, email, password_hash, avatar_url, status, created_at";

const MESSAGE_SELECT: &str = "SELECT m.id, m.channel_id, m.user_id, m.content, m.created_at, u.username, u.avatar_url
     FROM messages m
     JOIN users u ON m.user_id = u.id";

impl Database {
    // -- Users --

    /// Insert a user and their membership in `server_id` as one transaction.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        server_id: i64,
    ) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
                (username, email, password_hash),
            )?;
            let user_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO server_members (server_id, user_id) VALUES (?1, ?2)",
                (server_id, user_id),
            )?;

            let user = tx.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [user_id],
                user_from_row,
            )?;
            tx.commit()?;
            Ok(user)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", &email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", &username))
    }

    pub fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                (password_hash, user_id),
            )?;
            Ok(())
        })
    }

    // -- Contacts --

    /// Every user except `user_id`, with the status of any friendship row
    /// between the two in either direction.
    pub fn list_contacts(&self, user_id: i64) -> Result<Vec<ContactRow>> {
        self.with_conn(|conn| {
            // Correlated subquery keeps one row per user even when both
            // directions of a friendship exist.
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.email, u.avatar_url, u.status,
                        (SELECT f.status FROM friendships f
                          WHERE (f.user_id = ?1 AND f.friend_id = u.id)
                             OR (f.friend_id = ?1 AND f.user_id = u.id)
                          ORDER BY f.created_at
                          LIMIT 1) AS friendship_status
                 FROM users u
                 WHERE u.id != ?1
                 ORDER BY u.username",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ContactRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        avatar_url: row.get(3)?,
                        status: row.get(4)?,
                        friendship_status: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn friendship_exists(&self, user_id: i64, friend_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM friendships WHERE user_id = ?1 AND friend_id = ?2)",
                (user_id, friend_id),
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn add_friendship(&self, user_id: i64, friend_id: i64, status: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO friendships (user_id, friend_id, status) VALUES (?1, ?2, ?3)",
                params![user_id, friend_id, status],
            )?;
            Ok(())
        })
    }

    // -- Messages --

    pub fn channel_exists(&self, channel_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM channels WHERE id = ?1)",
                [channel_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Store a message and read it back joined with its author.
    pub fn insert_message(&self, channel_id: i64, user_id: i64, content: &str) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (channel_id, user_id, content) VALUES (?1, ?2, ?3)",
                params![channel_id, user_id, content],
            )?;
            let id = conn.last_insert_rowid();

            let row = conn.query_row(
                &format!("{MESSAGE_SELECT} WHERE m.id = ?1"),
                [id],
                message_from_row,
            )?;
            Ok(row)
        })
    }

    /// Most recent `limit` messages of a channel, newest first.
    pub fn get_messages(&self, channel_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT}
                 WHERE m.channel_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2"
            ))?;

            let rows = stmt
                .query_map(params![channel_id, limit], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Servers --

    /// All servers, or only those `user_id` is a member of, oldest first.
    pub fn list_servers(&self, user_id: Option<i64>) -> Result<Vec<ServerRow>> {
        self.with_conn(|conn| {
            let rows = match user_id {
                Some(user_id) => {
                    let mut stmt = conn.prepare(
                        "SELECT s.id, s.name, s.icon_url, s.created_at
                         FROM servers s
                         JOIN server_members sm ON s.id = sm.server_id
                         WHERE sm.user_id = ?1
                         ORDER BY s.created_at, s.id",
                    )?;
                    let rows = stmt
                        .query_map([user_id], server_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, name, icon_url, created_at
                         FROM servers
                         ORDER BY created_at, id",
                    )?;
                    let rows = stmt
                        .query_map([], server_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
            };

            Ok(rows)
        })
    }

    /// Batch-fetch channels for a set of server IDs, ordered by server then channel id.
    pub fn get_channels_for_servers(&self, server_ids: &[i64]) -> Result<Vec<ChannelRow>> {
        if server_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=server_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, server_id, name, type FROM channels
                 WHERE server_id IN ({})
                 ORDER BY server_id, id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(server_ids), |row| {
                    Ok(ChannelRow {
                        id: row.get(0)?,
                        server_id: row.get(1)?,
                        name: row.get(2)?,
                        kind: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Seeding --
    //
    // Servers and channels have no HTTP write path; operators and tests
    // provision them through these.

    pub fn create_server(&self, name: &str, icon_url: Option<&str>) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO servers (name, icon_url) VALUES (?1, ?2)",
                (name, icon_url),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn create_channel(&self, server_id: i64, name: &str, kind: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO channels (server_id, name, type) VALUES (?1, ?2, ?3)",
                (server_id, name, kind),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    // -- Membership --

    pub fn get_member_server_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT server_id FROM server_members WHERE user_id = ?1 ORDER BY server_id",
            )?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &dyn rusqlite::ToSql) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"),
            [value],
            user_from_row,
        )
        .optional()?;

    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        avatar_url: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn server_from_row(row: &Row<'_>) -> rusqlite::Result<ServerRow> {
    Ok(ServerRow {
        id: row.get(0)?,
        name: row.get(1)?,
        icon_url: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        user_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        username: row.get(5)?,
        avatar_url: row.get(6)?,
    })
}
