use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use hearth_db::models::{ChannelRow, ContactRow, MessageRow, ServerRow, UserRow};
use hearth_types::models::{Channel, Contact, Message, PostedMessage, Server, User};

/// Parse a stored timestamp. Rows written by this service are RFC 3339;
/// older imports may carry SQLite's `datetime('now')` format instead.
pub fn parse_timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {}: {}", raw, what, e);
            DateTime::default()
        })
}

pub fn user(row: UserRow) -> User {
    User {
        id: row.id,
        username: row.username,
        email: row.email,
        avatar_url: row.avatar_url,
        status: row.status,
    }
}

pub fn contact(row: ContactRow) -> Contact {
    Contact {
        id: row.id,
        username: row.username,
        email: row.email,
        avatar_url: row.avatar_url,
        status: row.status,
        friendship_status: row.friendship_status,
    }
}

pub fn channel(row: ChannelRow) -> Channel {
    Channel {
        id: row.id,
        name: row.name,
        kind: row.kind,
    }
}

pub fn server(row: ServerRow, channels: Vec<Channel>) -> Server {
    let created_at = parse_timestamp(&row.created_at, &format!("server {}", row.id));
    Server {
        id: row.id,
        name: row.name,
        icon_url: row.icon_url,
        created_at,
        channels,
    }
}

pub fn message(row: MessageRow) -> Message {
    let created_at = parse_timestamp(&row.created_at, &format!("message {}", row.id));
    Message {
        id: row.id,
        content: row.content,
        created_at,
        user_id: row.user_id,
        username: row.username,
        avatar_url: row.avatar_url,
    }
}

pub fn posted_message(row: MessageRow) -> PostedMessage {
    let created_at = parse_timestamp(&row.created_at, &format!("message {}", row.id));
    PostedMessage {
        id: row.id,
        channel_id: row.channel_id,
        user_id: row.user_id,
        content: row.content,
        created_at,
        username: row.username,
        avatar_url: row.avatar_url,
    }
}
