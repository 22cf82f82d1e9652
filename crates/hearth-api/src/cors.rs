use axum::{
    extract::Request,
    http::{
        Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
        },
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

const ALLOW_HEADERS: &str = "Content-Type, X-User-Id";
const MAX_AGE_SECS: &str = "86400";

/// Answer every `OPTIONS` request with a bare 200 and the CORS allow-list,
/// whatever the path and without touching any handler.
pub async fn preflight(req: Request, next: Next) -> Response {
    if req.method() != Method::OPTIONS {
        return next.run(req).await;
    }

    (
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (ACCESS_CONTROL_ALLOW_METHODS, allowed_methods(req.uri().path())),
            (ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS),
            (ACCESS_CONTROL_MAX_AGE, MAX_AGE_SECS),
        ],
    )
        .into_response()
}

fn allowed_methods(path: &str) -> &'static str {
    match path.trim_end_matches('/') {
        "/contacts" => "GET, POST, PUT, OPTIONS",
        _ => "GET, POST, OPTIONS",
    }
}
