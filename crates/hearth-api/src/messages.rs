use axum::{Json, extract::State};
use tracing::debug;

use hearth_types::api::{MessagesQuery, MessagesResponse, SendMessageRequest, SendMessageResponse};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::{AppState, run_blocking};

/// Messages returned per channel listing.
pub const MESSAGE_PAGE_SIZE: u32 = 50;

pub const MAX_CONTENT_CHARS: usize = 4000;

/// GET /messages?channel_id=N: newest first, at most [`MESSAGE_PAGE_SIZE`].
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MessagesQuery>,
) -> ApiResult<Json<MessagesResponse>> {
    let channel_id = query.channel_id;
    let rows = run_blocking(&state, move |db| {
        Ok(db.get_messages(channel_id, MESSAGE_PAGE_SIZE)?)
    })
    .await?;

    Ok(Json(MessagesResponse {
        messages: rows.into_iter().map(convert::message).collect(),
    }))
}

/// POST /messages
pub async fn send(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> ApiResult<Json<SendMessageResponse>> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("Message content cannot be empty".into()));
    }
    if req.content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::Validation(format!(
            "Message content exceeds {} characters",
            MAX_CONTENT_CHARS
        )));
    }

    let SendMessageRequest {
        channel_id,
        user_id,
        content,
    } = req;

    let row = run_blocking(&state, move |db| {
        if !db.channel_exists(channel_id)? {
            return Err(ApiError::NotFound(format!("Channel {} not found", channel_id)));
        }
        if db.get_user_by_id(user_id)?.is_none() {
            return Err(ApiError::NotFound(format!("User {} not found", user_id)));
        }

        Ok(db.insert_message(channel_id, user_id, &content)?)
    })
    .await?;

    debug!("Message {} stored in channel {}", row.id, row.channel_id);

    Ok(Json(SendMessageResponse {
        message: convert::posted_message(row),
    }))
}
