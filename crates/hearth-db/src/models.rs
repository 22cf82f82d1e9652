/// Database row types, mapped directly from SQLite rows.
/// Timestamps stay as the stored RFC 3339 strings; the API layer parses them.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub status: String,
    pub created_at: String,
}

pub struct ContactRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub status: String,
    pub friendship_status: Option<String>,
}

pub struct ServerRow {
    pub id: i64,
    pub name: String,
    pub icon_url: Option<String>,
    pub created_at: String,
}

pub struct ChannelRow {
    pub id: i64,
    pub server_id: i64,
    pub name: String,
    pub kind: String,
}

/// A message joined with its author's profile.
pub struct MessageRow {
    pub id: i64,
    pub channel_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: String,
    pub username: String,
    pub avatar_url: Option<String>,
}
