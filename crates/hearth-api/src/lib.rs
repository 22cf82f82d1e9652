//! HTTP handlers for the Hearth chat backend.
//!
//! Four resource handlers (auth, contacts, messages, servers) share one
//! [`Database`] through the axum state. Each request runs its SQL on the
//! blocking pool and answers with JSON.

pub mod auth;
pub mod contacts;
pub mod convert;
pub mod cors;
pub mod error;
pub mod extract;
pub mod messages;
pub mod password;
pub mod servers;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderValue, header::ACCESS_CONTROL_ALLOW_ORIGIN},
    middleware,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::error;

use hearth_db::Database;

use crate::error::{ApiError, ApiResult};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
}

impl AppStateInner {
    pub fn new(db: Database) -> AppState {
        Arc::new(Self { db })
    }
}

/// Build the API router: resource routes, preflight handling and the
/// `Access-Control-Allow-Origin: *` header on every response.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth", post(auth::dispatch).fallback(method_not_allowed))
        .route("/auth/register", post(auth::register).fallback(method_not_allowed))
        .route("/auth/login", post(auth::login).fallback(method_not_allowed))
        .route(
            "/contacts",
            get(contacts::list)
                .post(contacts::add)
                .fallback(method_not_allowed),
        )
        .route(
            "/messages",
            get(messages::list)
                .post(messages::send)
                .fallback(method_not_allowed),
        )
        .route("/servers", get(servers::list).fallback(method_not_allowed))
        .route("/health", get(health).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(middleware::from_fn(cors::preflight))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .with_state(state)
}

/// Run database work on the blocking pool; rusqlite calls must not stall
/// the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".into())
}
