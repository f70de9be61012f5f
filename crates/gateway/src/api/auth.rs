//! API authentication middleware.
//!
//! Reads the env var named by `config.server.api_key_env` (default
//! `NEXTAI_API_KEY`) once at startup and caches its SHA-256 digest in
//! `AppState` (see `AppState::bootstrap`). A protected request must carry
//! either `X-API-Key: <token>` or `Authorization: Bearer <token>` (spec
//! §6). If the env var is unset or empty, `AppState::authorize` always
//! admits (dev mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::state::AppState;

pub async fn require_api_key(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let presented = presented_key(&req);

    if !state.authorize(presented.as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({"error": {"code": "unauthorized", "message": "invalid or missing API key"}})))
            .into_response();
    }

    next.run(req).await
}

fn presented_key(req: &Request<Body>) -> Option<String> {
    if let Some(v) = req.headers().get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(v.trim().to_string());
    }
    req.headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
}
