//! Health, version, and runtime-config probes (spec §6) — always public,
//! never gated behind `auth::require_api_key`.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::AppState;

pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({"ok": true}))
}

pub async fn version() -> impl IntoResponse {
    Json(serde_json::json!({"version": env!("CARGO_PKG_VERSION")}))
}

pub async fn runtime_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({"features": state.config.feature_flags()}))
}
