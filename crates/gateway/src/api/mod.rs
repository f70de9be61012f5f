pub mod agent;
pub mod auth;
pub mod chats;
pub mod cron;
pub mod error;
pub mod health;
pub mod models;
pub mod qq_inbound;
pub mod runs;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the full API router (spec §6).
///
/// Routes split into **public** (no auth) and **protected** (gated behind
/// [`auth::require_api_key`]). `state` is needed to wire up the auth
/// middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/version", get(health::version))
        .route("/runtime-config", get(health::runtime_config));

    let protected = Router::new()
        // Chats
        .route("/chats", get(chats::list_chats))
        .route("/chats", post(chats::create_chat))
        .route("/chats/batch-delete", post(chats::batch_delete_chats))
        .route("/chats/:id", get(chats::get_chat))
        .route("/chats/:id", put(chats::update_chat))
        .route("/chats/:id", delete(chats::delete_chat))
        // Agent (Turn Engine)
        .route("/agent/process", post(agent::process))
        .route("/agent/system-layers", get(agent::system_layers))
        .route("/agent/runs", get(runs::list_runs))
        .route("/agent/runs/:id", get(runs::get_run))
        .route("/agent/runs/:id/nodes", get(runs::get_run_nodes))
        // QQ inbound webhook
        .route("/channels/qq/inbound", post(qq_inbound::inbound))
        // Cron
        .route("/cron/jobs", get(cron::list_jobs))
        .route("/cron/jobs", post(cron::create_job))
        .route("/cron/jobs/:id", get(cron::get_job))
        .route("/cron/jobs/:id", put(cron::update_job))
        .route("/cron/jobs/:id", delete(cron::delete_job))
        .route("/cron/jobs/:id/pause", post(cron::pause_job))
        .route("/cron/jobs/:id/resume", post(cron::resume_job))
        .route("/cron/jobs/:id/run", post(cron::run_job))
        .route("/cron/jobs/:id/state", get(cron::job_state))
        // Models
        .route("/models", get(models::list_models))
        .route("/models/catalog", get(models::models_catalog))
        .route("/models/:id/config", put(models::put_model_config))
        .route("/models/:id", delete(models::delete_model_config))
        .route("/models/active", get(models::get_active_model))
        .route("/models/active", put(models::put_active_model))
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_key));

    public.merge(protected).layer(tower_http::trace::TraceLayer::new_for_http())
}
