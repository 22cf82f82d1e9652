use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public user profile. The password hash never leaves the DB layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub status: String,
}

/// Another user as seen from the caller's contact list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub status: String,
    /// `None` when no friendship row exists in either direction.
    pub friendship_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: i64,
    pub name: String,
    pub icon_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub channels: Vec<Channel>,
}

/// A message in a channel listing, denormalized with its author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// A freshly stored message, echoed back to the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedMessage {
    pub id: i64,
    pub channel_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub avatar_url: Option<String>,
}
