use axum::{Json, body::Bytes, extract::State};
use serde_json::Value;
use tracing::{info, warn};

use hearth_db::is_constraint_violation;
use hearth_db::migrations::DEFAULT_SERVER_ID;
use hearth_types::api::{AuthAction, AuthResponse, LoginRequest, RegisterRequest};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::password::{self, Verification};
use crate::{AppState, run_blocking};

/// POST /auth: dispatch on the body's `action` field.
///
/// The body is read as JSON whatever its Content-Type, and an empty body
/// counts as `{}`. A missing or unknown action is treated like an
/// unsupported method.
pub async fn dispatch(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<AuthResponse>> {
    let body = parse_body(&body)?;
    let action = body.get("action").and_then(Value::as_str);
    if !action.is_some_and(|a| AuthAction::NAMES.contains(&a)) {
        warn!("Rejected auth request with action {:?}", action);
        return Err(ApiError::MethodNotAllowed);
    }

    let action: AuthAction =
        serde_json::from_value(body).map_err(|e| ApiError::Validation(e.to_string()))?;

    match action {
        AuthAction::Register(req) => register_user(&state, req).await,
        AuthAction::Login(req) => login_user(&state, req).await,
    }
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    register_user(&state, req).await
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    login_user(&state, req).await
}

async fn register_user(state: &AppState, req: RegisterRequest) -> ApiResult<Json<AuthResponse>> {
    let username = req.username.trim().to_string();
    let email = normalize_email(&req.email);

    // Validate input
    let username_len = username.chars().count();
    if !(3..=32).contains(&username_len) {
        return Err(ApiError::Validation(
            "Username must be between 3 and 32 characters".into(),
        ));
    }
    if email.len() > 254 || !email.contains('@') {
        return Err(ApiError::Validation("Invalid email address".into()));
    }
    if req.password.chars().count() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    let password = req.password;
    let user = run_blocking(state, move |db| {
        if db.get_user_by_username(&username)?.is_some() {
            return Err(ApiError::Conflict("Username already taken".into()));
        }
        if db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::Conflict("Email already registered".into()));
        }

        // Hash password with Argon2id
        let password_hash = password::hash_password(&password)?;

        // User row and default-server membership commit together
        db.create_user(&username, &email, &password_hash, DEFAULT_SERVER_ID)
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ApiError::Conflict("Username or email already registered".into())
                } else {
                    e.into()
                }
            })
    })
    .await?;

    info!("Registered user {} ({})", user.username, user.id);

    Ok(Json(AuthResponse {
        user: convert::user(user),
        message: "Registration successful".into(),
    }))
}

async fn login_user(state: &AppState, req: LoginRequest) -> ApiResult<Json<AuthResponse>> {
    let email = normalize_email(&req.email);
    let password = req.password;

    let user = run_blocking(state, move |db| {
        // Unknown email and wrong password are indistinguishable to the caller
        let user = db.get_user_by_email(&email)?.ok_or(ApiError::Unauthorized)?;

        match password::verify_password(&password, &user.password_hash) {
            Verification::Valid => {}
            Verification::Legacy => {
                // Credentials are already verified; a failed upgrade only
                // means the next login retries it.
                match password::hash_password(&password)
                    .and_then(|upgraded| db.update_password_hash(user.id, &upgraded))
                {
                    Ok(()) => info!("Upgraded legacy password hash for user {}", user.id),
                    Err(e) => warn!("Legacy hash upgrade failed for user {}: {:#}", user.id, e),
                }
            }
            Verification::Invalid => return Err(ApiError::Unauthorized),
        }

        Ok(user)
    })
    .await?;

    info!("User {} logged in", user.id);

    Ok(Json(AuthResponse {
        user: convert::user(user),
        message: "Login successful".into(),
    }))
}

fn parse_body(raw: &[u8]) -> ApiResult<Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(raw).map_err(|e| ApiError::Validation(format!("Invalid JSON body: {}", e)))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
