use axum::{Json, extract::State};
use tracing::info;

use hearth_db::is_constraint_violation;
use hearth_types::api::{AddFriendRequest, ContactsQuery, ContactsResponse, StatusMessage};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::{AppState, run_blocking};

/// Friendships are created already accepted; there is no request step.
pub const FRIENDSHIP_ACCEPTED: &str = "accepted";

/// GET /contacts?user_id=N
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ContactsQuery>,
) -> ApiResult<Json<ContactsResponse>> {
    let user_id = query.user_id;
    let rows = run_blocking(&state, move |db| Ok(db.list_contacts(user_id)?)).await?;

    Ok(Json(ContactsResponse {
        contacts: rows.into_iter().map(convert::contact).collect(),
    }))
}

/// POST /contacts: record a one-directional, accepted friendship.
pub async fn add(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AddFriendRequest>,
) -> ApiResult<Json<StatusMessage>> {
    let AddFriendRequest { user_id, friend_id } = req;
    if user_id == friend_id {
        return Err(ApiError::Validation("Cannot add yourself as a friend".into()));
    }

    run_blocking(&state, move |db| {
        for id in [user_id, friend_id] {
            if db.get_user_by_id(id)?.is_none() {
                return Err(ApiError::NotFound(format!("User {} not found", id)));
            }
        }
        if db.friendship_exists(user_id, friend_id)? {
            return Err(ApiError::Conflict("Friend already added".into()));
        }

        db.add_friendship(user_id, friend_id, FRIENDSHIP_ACCEPTED)
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ApiError::Conflict("Friend already added".into())
                } else {
                    e.into()
                }
            })
    })
    .await?;

    info!("User {} added friend {}", user_id, friend_id);

    Ok(Json(StatusMessage::new("Friend added")))
}
