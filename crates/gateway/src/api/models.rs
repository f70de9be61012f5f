//! Model/provider configuration (spec §3, §6). `ProviderRegistry` (built
//! once at startup from `LlmConfig`) is the catalog of usable adapters;
//! `SettingsAggregate` holds the operator-editable per-provider runtime
//! settings (api key, base url, model aliases, ...) plus the active slot.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use sa_domain::error::Error;
use sa_store::{ModelSlot, ProviderSetting};

use crate::api::error::ApiError;
use crate::state::AppState;

pub async fn list_models(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let configured = state.store.read_settings(|s| s.providers.clone()).await;
    let registered = state.providers.list_providers();

    let providers: Vec<serde_json::Value> = registered
        .into_iter()
        .map(|id| {
            let setting = configured.get(&id);
            serde_json::json!({
                "provider_id": id,
                "configured": setting.is_some(),
                "enabled": setting.map(|s| s.enabled).unwrap_or(true),
                "model_aliases": setting.map(|s| s.model_aliases.clone()).unwrap_or_default(),
            })
        })
        .collect();

    Ok(Json(serde_json::json!({"providers": providers})))
}

pub async fn models_catalog(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let catalog: Vec<serde_json::Value> = state
        .config
        .llm
        .providers
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id,
                "kind": p.kind,
                "default_model": p.default_model,
                "model_aliases": p.model_aliases,
                "enabled": p.enabled,
            })
        })
        .collect();
    let init_errors: Vec<serde_json::Value> = state
        .providers
        .init_errors()
        .iter()
        .map(|e| serde_json::json!({"provider_id": e.provider_id, "kind": e.kind, "error": e.error}))
        .collect();
    Ok(Json(serde_json::json!({"catalog": catalog, "init_errors": init_errors})))
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfigBody {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub model_aliases: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
    #[serde(default)]
    pub store: bool,
}

fn default_timeout() -> u64 {
    30
}
fn default_enabled() -> bool {
    true
}

pub async fn put_model_config(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<ProviderConfigBody>) -> Result<impl IntoResponse, ApiError> {
    if state.providers.get(&id).is_none() {
        return Err(Error::InvalidProviderId(id).into());
    }
    let setting = ProviderSetting {
        api_key: body.api_key,
        base_url: body.base_url,
        headers: body.headers,
        timeout_seconds: body.timeout_seconds,
        enabled: body.enabled,
        model_aliases: body.model_aliases,
        reasoning_effort: body.reasoning_effort,
        store: body.store,
    };
    state.store.write_settings(|s| s.providers.insert(id, setting)).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn delete_model_config(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    state.store.write_settings(|s| s.providers.remove(&id)).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn get_active_model(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let slot = state.store.read_settings(|s| s.active_model_slot.clone()).await;
    Ok(Json(serde_json::json!({"active": slot})))
}

#[derive(Debug, Deserialize)]
pub struct SetActiveModelBody {
    pub provider_id: String,
    pub model: String,
}

pub async fn put_active_model(State(state): State<AppState>, Json(body): Json<SetActiveModelBody>) -> Result<impl IntoResponse, ApiError> {
    if state.providers.get(&body.provider_id).is_none() {
        return Err(Error::InvalidProviderId(body.provider_id).into());
    }
    let slot = ModelSlot { provider_id: body.provider_id, model: body.model };
    state.store.write_settings(|s| s.active_model_slot = Some(slot)).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}
