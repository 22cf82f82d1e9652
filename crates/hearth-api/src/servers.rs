use std::collections::HashMap;

use axum::{Json, extract::State};

use hearth_types::api::{ServersQuery, ServersResponse};
use hearth_types::models::Channel;

use crate::convert;
use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::{AppState, run_blocking};

/// GET /servers[?user_id=N]: servers with their channels nested.
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ServersQuery>,
) -> ApiResult<Json<ServersResponse>> {
    let user_id = query.user_id;

    let (server_rows, channel_rows) = run_blocking(&state, move |db| {
        let servers = db.list_servers(user_id)?;

        // One batched channel query for every server (no N+1)
        let ids: Vec<i64> = servers.iter().map(|s| s.id).collect();
        let channels = db.get_channels_for_servers(&ids)?;

        Ok((servers, channels))
    })
    .await?;

    // Rows arrive ordered by (server_id, id), so each bucket stays sorted
    let mut by_server: HashMap<i64, Vec<Channel>> = HashMap::new();
    for row in channel_rows {
        by_server
            .entry(row.server_id)
            .or_default()
            .push(convert::channel(row));
    }

    let servers = server_rows
        .into_iter()
        .map(|row| {
            let channels = by_server.remove(&row.id).unwrap_or_default();
            convert::server(row, channels)
        })
        .collect();

    Ok(Json(ServersResponse { servers }))
}
