//! Agent process API (spec §4.1, §6): `POST /agent/process` — the Turn
//! Engine's only HTTP entry point, JSON or SSE — and `GET
//! /agent/system-layers` — read-only System-Prompt Assembler introspection.

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::Deserialize;

use sa_domain::chat::TurnEvent;
use sa_domain::mode::PromptMode;

use crate::api::error::ApiError;
use crate::runtime::turn::{self, AgentProcessRequest};
use crate::state::AppState;

pub async fn process(State(state): State<AppState>, Json(req): Json<AgentProcessRequest>) -> Result<impl IntoResponse, ApiError> {
    if req.stream.unwrap_or(false) {
        return Ok(stream_process(state, req).await.into_response());
    }

    let outcome = turn::process(&state, req, None).await?;
    Ok(Json(outcome).into_response())
}

async fn stream_process(state: AppState, req: AgentProcessRequest) -> impl IntoResponse {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<TurnEvent>();

    tokio::spawn(async move {
        if let Err(err) = turn::process(&state, req, Some(tx.clone())).await {
            let _ = tx.send(TurnEvent::Error { step: 0, meta: sa_domain::chat::ErrorMeta { code: err.code().to_string(), message: err.to_string() } });
        }
    });

    Sse::new(make_sse_stream(rx)).keep_alive(KeepAlive::default())
}

fn make_sse_stream(mut rx: tokio::sync::mpsc::UnboundedReceiver<TurnEvent>) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let event_type = match &event {
                TurnEvent::StepStarted { .. } => "step_started",
                TurnEvent::AssistantDelta { .. } => "assistant_delta",
                TurnEvent::ToolCall { .. } => "tool_call",
                TurnEvent::ToolResult { .. } => "tool_result",
                TurnEvent::Completed { .. } => "completed",
                TurnEvent::Error { .. } => "error",
            };
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().event(event_type).data(data));
        }
        yield Ok(Event::default().data("[DONE]"));
    }
}

#[derive(Debug, Deserialize)]
pub struct SystemLayersQuery {
    #[serde(default)]
    pub prompt_mode: Option<String>,
    #[serde(default)]
    pub task_command: Option<String>,
    #[serde(default)]
    pub collaboration_mode: Option<String>,
    #[serde(default)]
    pub collaboration_event: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn system_layers(State(state): State<AppState>, Query(q): Query<SystemLayersQuery>) -> Result<impl IntoResponse, ApiError> {
    let mode = q
        .prompt_mode
        .as_deref()
        .and_then(PromptMode::parse)
        .unwrap_or(PromptMode::Default);

    let turn_mode = q
        .collaboration_event
        .as_deref()
        .and_then(sa_domain::mode::CollaborationEvent::parse)
        .map(|e| e.target())
        .or_else(|| q.collaboration_mode.as_deref().and_then(sa_domain::mode::CollaborationMode::parse))
        .unwrap_or(sa_domain::mode::CollaborationMode::Default);

    let (layers, _fallback_reason) = crate::runtime::prompt_sources::assemble_layers(
        &state.config.workspace.root,
        &state.config.prompt,
        mode,
        turn_mode.as_str(),
        true,
        q.task_command.as_deref(),
    )?;

    let report = sa_promptpack::build_report(env!("CARGO_PKG_VERSION"), mode.as_str(), &layers);
    Ok(Json(report))
}
