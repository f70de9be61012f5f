//! Run introspection (spec §4.1 [AMBIENT]): read-only queries over the
//! in-memory `RunStore` the Turn Engine populates. No SSE here — live
//! progress is already served by `POST /agent/process`'s own stream.
//!
//! - `GET /agent/runs`          — list recent runs, optionally by session key
//! - `GET /agent/runs/:id`      — a single run with its full node list
//! - `GET /agent/runs/:id/nodes` — just the node list

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use sa_domain::error::Error;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn list_runs(State(state): State<AppState>, Query(q): Query<ListRunsQuery>) -> impl IntoResponse {
    let limit = q.limit.min(200);
    let (runs, total) = state.run_store.list(q.session_key.as_deref(), limit, q.offset);

    let items: Vec<serde_json::Value> = runs
        .iter()
        .map(|r| {
            serde_json::json!({
                "run_id": r.run_id,
                "session_key": r.session_key,
                "session_id": r.session_id,
                "status": r.status,
                "started_at": r.started_at,
                "ended_at": r.ended_at,
                "duration_ms": r.duration_ms,
                "input_preview": r.input_preview,
                "output_preview": r.output_preview,
                "error": r.error,
                "node_count": r.nodes.len(),
            })
        })
        .collect();

    Json(serde_json::json!({"runs": items, "total": total, "limit": limit, "offset": q.offset}))
}

pub async fn get_run(State(state): State<AppState>, Path(run_id): Path<uuid::Uuid>) -> Result<impl IntoResponse, ApiError> {
    let run = state.run_store.get(&run_id).ok_or_else(|| Error::NotFound(format!("run {run_id}")))?;
    Ok(Json(serde_json::json!(run)))
}

pub async fn get_run_nodes(State(state): State<AppState>, Path(run_id): Path<uuid::Uuid>) -> Result<impl IntoResponse, ApiError> {
    let run = state.run_store.get(&run_id).ok_or_else(|| Error::NotFound(format!("run {run_id}")))?;
    Ok(Json(serde_json::json!({"run_id": run.run_id, "nodes": run.nodes, "count": run.nodes.len()})))
}
