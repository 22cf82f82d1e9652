use serde::{Deserialize, Serialize};

use crate::models::{Contact, Message, PostedMessage, Server, User};

/// Channel listed when the caller does not name one.
pub const DEFAULT_CHANNEL_ID: i64 = 1;

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth`, dispatched on its `action` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AuthAction {
    Register(RegisterRequest),
    Login(LoginRequest),
}

impl AuthAction {
    pub const NAMES: &'static [&'static str] = &["register", "login"];
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub message: String,
}

// -- Contacts --

#[derive(Debug, Deserialize)]
pub struct ContactsQuery {
    pub user_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactsResponse {
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Deserialize)]
pub struct AddFriendRequest {
    pub user_id: i64,
    pub friend_id: i64,
}

// -- Messages --

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "default_channel_id")]
    pub channel_id: i64,
}

fn default_channel_id() -> i64 {
    DEFAULT_CHANNEL_ID
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub channel_id: i64,
    pub user_id: i64,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub message: PostedMessage,
}

// -- Servers --

/// `?user_id=` with no value means "all servers", same as leaving it out.
#[derive(Debug, Default, Deserialize)]
pub struct ServersQuery {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub user_id: Option<i64>,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServersResponse {
    pub servers: Vec<Server>,
}

// -- Shared --

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
