//! Turn Engine (spec §4.1): the core orchestration loop. One call to
//! [`process`] drives channel resolution, the `/new` reset shortcut,
//! prompt-mode/collaboration-mode resolution, manual tool dispatch or the
//! provider step loop, history persistence, and channel dispatch.
//!
//! Streaming and non-streaming callers share this exact code path: `emit`
//! is `Some(tx)` for an SSE caller and `None` for a plain JSON caller: see
//! `emit_event`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::Instrument;

use sa_domain::chat::{
    Chat, ChatKey, ContentItem, MessageMetadata, MessageRole, RuntimeMessage, ToolCallEnvelope,
    TurnEvent,
};
use sa_domain::error::{Error, Result};
use sa_domain::mode::{CollaborationEvent, CollaborationMode, PromptMode};
use sa_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use sa_domain::trace::TraceEvent;
use sa_providers::registry::DEMO_PROVIDER_ID;
use sa_providers::traits::{Adapter, GenerateConfig, GenerateRequest};
use sa_tools::{ToolRegistry, ToolScope};

use crate::runtime::channel::{self, ChannelOverrides};
use crate::runtime::runs::RunStatus;
use crate::state::AppState;

const N_MAX_STEPS: u32 = 8;
const NEW_CHAT_RESET_REPLY: &str = "Context cleared. Starting fresh.";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
pub struct AgentProcessRequest {
    pub input: Vec<InputMessage>,
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub biz_params: Option<BizParams>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputMessage {
    pub role: String,
    #[serde(rename = "type", default = "default_input_type")]
    pub msg_type: String,
    pub content: Vec<InputContentItem>,
}

fn default_input_type() -> String {
    "message".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContentItem {
    Text { text: String },
    Image { url: String },
}

/// `biz_params`: a dynamic bag (spec §9) with a few named fields the engine
/// interprets directly, plus an `extra` catch-all for forward-compatible
/// pass-through (`active_llm_override`, tool-shortcut keys, `model_slug`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BizParams {
    #[serde(default)]
    pub prompt_mode: Option<String>,
    #[serde(default)]
    pub collaboration_mode: Option<String>,
    #[serde(default)]
    pub collaboration_event: Option<String>,
    #[serde(default)]
    pub tool: Option<serde_json::Value>,
    #[serde(default)]
    pub channel: Option<ChannelOverrides>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub reply: String,
    pub events: Vec<TurnEvent>,
}

pub type EventSink = mpsc::UnboundedSender<TurnEvent>;

fn emit_event(emit: &Option<EventSink>, events: &mut Vec<TurnEvent>, ev: TurnEvent) {
    if let Some(tx) = emit {
        let _ = tx.send(ev.clone());
    }
    events.push(ev);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Wraps [`process_inner`] with a per-run `tracing::info_span` and an
/// in-memory [`crate::runtime::runs::RunStore`] entry, so every turn is
/// correlated by `run_id` for the `/agent/runs` introspection surface.
pub async fn process(state: &AppState, req: AgentProcessRequest, emit: Option<EventSink>) -> Result<ProcessOutcome> {
    let channel_name = resolve_channel_name(req.channel.as_deref());
    let session_key = format!("{}\u{0}{}\u{0}{}", req.session_id, req.user_id, channel_name);
    let input_preview = req
        .input
        .iter()
        .find(|m| m.role == "user")
        .and_then(|m| m.content.iter().find_map(|c| match c {
            InputContentItem::Text { text } => Some(text.as_str()),
            InputContentItem::Image { .. } => None,
        }));
    let run_id = state.run_store.start(session_key.clone(), req.session_id.clone(), input_preview);
    let span = tracing::info_span!("turn", %run_id, session_key = %session_key);

    let result = process_inner(state, req, emit).instrument(span).await;

    match &result {
        Ok(outcome) => state.run_store.finish(&run_id, RunStatus::Completed, Some(outcome.reply.clone()), outcome.events.clone(), None),
        Err(err) => state.run_store.finish(&run_id, RunStatus::Failed, None, Vec::new(), Some(err.to_string())),
    }

    result
}

async fn process_inner(state: &AppState, req: AgentProcessRequest, emit: Option<EventSink>) -> Result<ProcessOutcome> {
    let channel_name = resolve_channel_name(req.channel.as_deref());
    if !state.config.channels.is_known(&channel_name) {
        return Err(Error::ChannelNotSupported(channel_name));
    }
    if state.config.channels.is_disabled(&channel_name) {
        return Err(Error::ChannelDisabled(channel_name));
    }

    let key = ChatKey::new(req.session_id.clone(), req.user_id.clone(), channel_name.clone());
    let session_key = format!("{}\u{0}{}\u{0}{}", key.session_id, key.user_id, key.channel);
    let _permit = state.session_locks.acquire(&session_key).await;

    let chat_id = resolve_or_create_chat(state, &key).await?;
    let biz = req.biz_params.clone().unwrap_or_default();
    let mut events = Vec::new();

    if is_new_command(&req.input) {
        return handle_reset(state, &chat_id, &key, &channel_name, &biz, &mut events, &emit).await;
    }

    let prompt_mode = resolve_prompt_mode(state, &chat_id, biz.prompt_mode.as_deref()).await?;
    let collaboration_mode = resolve_collaboration_mode(
        state,
        &chat_id,
        prompt_mode,
        biz.collaboration_event.as_deref(),
        biz.collaboration_mode.as_deref(),
    )
    .await?;

    if let Some((tool_name, args)) = detect_manual_tool(&biz, &state.tools) {
        return run_manual_tool(state, &chat_id, &key, &channel_name, &req, &biz, tool_name, args, &mut events, &emit).await;
    }

    run_generation(state, &chat_id, &key, &channel_name, &req, &biz, prompt_mode, collaboration_mode, &mut events, &emit).await
}

fn resolve_channel_name(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_lowercase(),
        None => "console".to_string(),
    }
}

async fn resolve_or_create_chat(state: &AppState, key: &ChatKey) -> Result<String> {
    if let Some(id) = state.store.read_session(|s| s.lookup(key).map(str::to_string)).await {
        return Ok(id);
    }
    let chat_id = uuid::Uuid::new_v4().to_string();
    state
        .store
        .write_conversations(|c| {
            c.insert(Chat::new(chat_id.clone(), key.session_id.clone(), key.user_id.clone(), key.channel.clone()));
        })
        .await?;
    state.store.write_session(|s| s.bind(key, chat_id.clone())).await?;
    Ok(chat_id)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step 2: context-reset shortcut
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn is_new_command(input: &[InputMessage]) -> bool {
    if input.len() != 1 || input[0].role != "user" {
        return false;
    }
    match input[0].content.as_slice() {
        [InputContentItem::Text { text }] => text.trim() == "/new",
        _ => false,
    }
}

async fn handle_reset(
    state: &AppState,
    chat_id: &str,
    key: &ChatKey,
    channel_name: &str,
    biz: &BizParams,
    events: &mut Vec<TurnEvent>,
    emit: &Option<EventSink>,
) -> Result<ProcessOutcome> {
    let reply = NEW_CHAT_RESET_REPLY.to_string();

    state
        .store
        .write_conversations(|c| {
            if let Some(chat) = c.get_mut(chat_id) {
                chat.history.clear();
                chat.history.push(RuntimeMessage::assistant_text(reply.clone()));
                chat.updated_at = chrono::Utc::now();
            }
        })
        .await?;

    emit_event(emit, events, TurnEvent::StepStarted { step: 1 });
    emit_event(emit, events, TurnEvent::AssistantDelta { step: 1, text: reply.clone() });
    emit_event(emit, events, TurnEvent::Completed { step: 1, reply: reply.clone() });

    dispatch_reply(state, key, channel_name, &reply, biz.channel.clone().unwrap_or_default()).await?;

    Ok(ProcessOutcome { reply, events: events.clone() })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step 3-4: prompt-mode / collaboration-mode resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn resolve_prompt_mode(state: &AppState, chat_id: &str, explicit: Option<&str>) -> Result<PromptMode> {
    if let Some(raw) = explicit {
        let mode = PromptMode::parse(raw).ok_or_else(|| Error::InvalidRequest(format!("invalid prompt_mode: {raw}")))?;
        state
            .store
            .write_conversations(|c| {
                if let Some(chat) = c.get_mut(chat_id) {
                    chat.set_meta("prompt_mode", serde_json::json!(mode.as_str()));
                }
            })
            .await?;
        return Ok(mode);
    }

    let persisted = state
        .store
        .read_conversations(|c| c.get(chat_id).and_then(|chat| chat.meta_str("prompt_mode")).map(str::to_string))
        .await;
    Ok(persisted.as_deref().and_then(PromptMode::parse).unwrap_or(PromptMode::Default))
}

async fn resolve_collaboration_mode(
    state: &AppState,
    chat_id: &str,
    prompt_mode: PromptMode,
    event: Option<&str>,
    mode: Option<&str>,
) -> Result<CollaborationMode> {
    if (event.is_some() || mode.is_some()) && prompt_mode != PromptMode::Codex {
        return Err(Error::InvalidRequest("collaboration_mode/collaboration_event requires prompt_mode=codex".into()));
    }
    if prompt_mode != PromptMode::Codex {
        return Ok(CollaborationMode::Default);
    }

    let (resolved, last_event) = if let Some(raw) = event {
        let ev = CollaborationEvent::parse(raw).ok_or_else(|| Error::InvalidRequest(format!("invalid collaboration_event: {raw}")))?;
        (ev.target(), Some(raw.to_string()))
    } else if let Some(raw) = mode {
        let m = CollaborationMode::parse(raw).ok_or_else(|| Error::InvalidRequest(format!("invalid collaboration_mode: {raw}")))?;
        (m, None)
    } else {
        let persisted = state
            .store
            .read_conversations(|c| c.get(chat_id).and_then(|chat| chat.meta_str("collaboration_mode")).map(str::to_string))
            .await;
        (persisted.as_deref().and_then(CollaborationMode::parse).unwrap_or(CollaborationMode::Default), None)
    };

    state
        .store
        .write_conversations(|c| {
            if let Some(chat) = c.get_mut(chat_id) {
                chat.set_meta("collaboration_mode", serde_json::json!(resolved.as_str()));
                if let Some(ev) = &last_event {
                    chat.set_meta("collaboration_last_event", serde_json::json!(ev));
                }
            }
        })
        .await?;

    Ok(resolved)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step 5: manual tool dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn detect_manual_tool(biz: &BizParams, tools: &ToolRegistry) -> Option<(String, serde_json::Value)> {
    if let Some(tool_val) = &biz.tool {
        let name = tool_val.get("name").and_then(|v| v.as_str())?;
        return Some((name.to_string(), tool_val.clone()));
    }
    for (key, value) in &biz.extra {
        if tools.get(key).is_some() {
            return Some((key.clone(), value.clone()));
        }
    }
    None
}

#[allow(clippy::too_many_arguments)]
async fn run_manual_tool(
    state: &AppState,
    chat_id: &str,
    key: &ChatKey,
    channel_name: &str,
    req: &AgentProcessRequest,
    biz: &BizParams,
    tool_name: String,
    args: serde_json::Value,
    events: &mut Vec<TurnEvent>,
    emit: &Option<EventSink>,
) -> Result<ProcessOutcome> {
    emit_event(emit, events, TurnEvent::StepStarted { step: 1 });

    let call_id = uuid::Uuid::new_v4().to_string();
    let scope = ToolScope { session_id: key.session_id.clone(), user_id: key.user_id.clone(), channel: key.channel.clone() };

    emit_event(
        emit,
        events,
        TurnEvent::ToolCall { step: 1, call_id: call_id.clone(), tool_name: tool_name.clone(), arguments: args.clone() },
    );

    let started = Instant::now();
    let result = state.tools.invoke(&tool_name, &args, scope).await?;
    TraceEvent::ToolInvoked { tool_name: tool_name.clone(), ok: result.ok, duration_ms: started.elapsed().as_millis() as u64 }.emit();

    let text = tool_result_text(&result.output);
    emit_event(
        emit,
        events,
        TurnEvent::ToolResult { step: 1, call_id: call_id.clone(), tool_name: tool_name.clone(), ok: result.ok, content: text.clone() },
    );

    emit_event(emit, events, TurnEvent::AssistantDelta { step: 1, text: text.clone() });
    emit_event(emit, events, TurnEvent::Completed { step: 1, reply: text.clone() });

    let envelope = ToolCallEnvelope { call_id, tool_name, arguments: args };
    persist_turn(state, chat_id, &req.input, &text, None, vec![envelope]).await?;
    dispatch_reply(state, key, channel_name, &text, biz.channel.clone().unwrap_or_default()).await?;

    Ok(ProcessOutcome { reply: text, events: events.clone() })
}

fn tool_result_text(output: &serde_json::Value) -> String {
    if let Some(s) = output.as_str() {
        return s.trim().to_string();
    }
    if let Some(results) = output.get("results").and_then(|v| v.as_array()) {
        return results
            .iter()
            .filter_map(|r| r.get("output").and_then(|v| v.as_str()).or_else(|| r.get("tail").and_then(|v| v.as_str())))
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");
    }
    for key in ["output", "text", "content"] {
        if let Some(s) = output.get(key).and_then(|v| v.as_str()) {
            return s.trim().to_string();
        }
    }
    output.to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step 6-8: model generation path
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[allow(clippy::too_many_arguments)]
async fn run_generation(
    state: &AppState,
    chat_id: &str,
    key: &ChatKey,
    channel_name: &str,
    req: &AgentProcessRequest,
    biz: &BizParams,
    prompt_mode: PromptMode,
    collaboration_mode: CollaborationMode,
    events: &mut Vec<TurnEvent>,
    emit: &Option<EventSink>,
) -> Result<ProcessOutcome> {
    let stream = req.stream.unwrap_or(false);

    let model_slug = biz.extra.get("model_slug").and_then(|v| v.as_str());
    let (layers, _fallback_reason) = crate::runtime::prompt_sources::assemble_layers(
        &state.config.workspace.root,
        &state.config.prompt,
        prompt_mode,
        collaboration_mode.as_str(),
        true,
        model_slug,
    )?;
    TraceEvent::SystemLayersBuilt {
        prompt_mode: prompt_mode.as_str().to_string(),
        layer_count: layers.len(),
        estimated_tokens_total: layers.iter().map(|l| l.estimated_tokens).sum(),
    }
    .emit();

    let history = state.store.read_conversations(|c| c.get(chat_id).map(|chat| chat.history.clone())).await.unwrap_or_default();

    let mut messages: Vec<Message> = layers.iter().map(|l| Message::system(l.content.clone())).collect();
    messages.extend(history.iter().map(runtime_message_to_wire));
    messages.extend(req.input.iter().map(input_message_to_wire));

    let (provider_id, model, cfg) = resolve_provider_and_model(state, biz, &history, &req.session_id).await?;
    let adapter = state.providers.get(&provider_id).ok_or(Error::ProviderNotConfigured)?;

    let tool_names = state.tools.snapshot_for_turn(prompt_mode.as_str());
    let tool_defs: Vec<ToolDefinition> = tool_names
        .iter()
        .filter_map(|n| state.tools.get(n))
        .map(|t| ToolDefinition { name: t.name().to_string(), description: t.description().to_string(), parameters: t.parameters() })
        .collect();

    let scope = ToolScope { session_id: key.session_id.clone(), user_id: key.user_id.clone(), channel: key.channel.clone() };

    let (reply_text, response_id, tool_envelopes) =
        run_step_loop(adapter, &mut messages, tool_defs, model, cfg, scope, stream, emit, events, &state.tools).await?;

    persist_turn(state, chat_id, &req.input, &reply_text, response_id, tool_envelopes).await?;
    dispatch_reply(state, key, channel_name, &reply_text, biz.channel.clone().unwrap_or_default()).await?;

    Ok(ProcessOutcome { reply: reply_text, events: events.clone() })
}

fn runtime_message_to_wire(msg: &RuntimeMessage) -> Message {
    let role = match msg.role {
        MessageRole::User => Role::User,
        MessageRole::Assistant => Role::Assistant,
        MessageRole::Tool => Role::Tool,
        MessageRole::System => Role::System,
    };
    Message { role, content: MessageContent::Text(msg.text()) }
}

fn input_message_to_wire(msg: &InputMessage) -> Message {
    let role = match msg.role.as_str() {
        "assistant" => Role::Assistant,
        "system" => Role::System,
        "tool" => Role::Tool,
        _ => Role::User,
    };
    let text = msg
        .content
        .iter()
        .filter_map(|c| match c {
            InputContentItem::Text { text } => Some(text.as_str()),
            InputContentItem::Image { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    Message { role, content: MessageContent::Text(text) }
}

#[derive(Deserialize)]
struct ActiveLlmOverride {
    provider_id: String,
    model: String,
}

async fn resolve_provider_and_model(
    state: &AppState,
    biz: &BizParams,
    history: &[RuntimeMessage],
    session_id: &str,
) -> Result<(String, String, GenerateConfig)> {
    let override_slot = biz.extra.get("active_llm_override").and_then(|v| serde_json::from_value::<ActiveLlmOverride>(v.clone()).ok());

    let (provider_id, model) = if let Some(o) = override_slot {
        (o.provider_id, o.model)
    } else if let Some(slot) = state.store.read_settings(|s| s.active_model_slot.clone()).await {
        (slot.provider_id, slot.model)
    } else {
        (DEMO_PROVIDER_ID.to_string(), "demo-chat".to_string())
    };

    let setting = state.store.read_settings(|s| s.providers.get(&provider_id).cloned()).await;

    if let Some(setting) = &setting {
        if !setting.enabled {
            return Err(Error::ProviderDisabled(provider_id));
        }
    }
    if state.providers.get(&provider_id).is_none() {
        return Err(Error::ProviderNotConfigured);
    }

    let resolved_model = setting.as_ref().and_then(|s| s.model_aliases.get(&model).cloned()).unwrap_or(model);

    let previous_response_id =
        history.iter().rev().find_map(|m| m.metadata.as_ref().and_then(|md| md.provider_response_id.clone()));

    let cfg = GenerateConfig {
        api_key: setting.as_ref().and_then(|s| s.api_key.clone()),
        base_url: setting.as_ref().and_then(|s| s.base_url.clone()),
        headers: setting.as_ref().map(|s| s.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect()).unwrap_or_default(),
        timeout_ms: setting.as_ref().map(|s| s.timeout_seconds * 1000).unwrap_or(30_000),
        reasoning_effort: setting.as_ref().and_then(|s| s.reasoning_effort.clone()),
        store: setting.as_ref().map(|s| s.store).unwrap_or(false),
        prompt_cache_key: Some(session_id.to_string()),
        previous_response_id,
    };

    Ok((provider_id, resolved_model, cfg))
}

#[allow(clippy::too_many_arguments)]
async fn run_step_loop(
    adapter: Arc<dyn Adapter>,
    messages: &mut Vec<Message>,
    tool_defs: Vec<ToolDefinition>,
    model: String,
    cfg: GenerateConfig,
    scope: ToolScope,
    stream: bool,
    emit: &Option<EventSink>,
    events: &mut Vec<TurnEvent>,
    tools: &ToolRegistry,
) -> Result<(String, Option<String>, Vec<ToolCallEnvelope>)> {
    let caps = adapter.capabilities();
    let tool_defs = if caps.tool_call { tool_defs } else { Vec::new() };
    let cfg = if caps.reasoning { cfg } else { GenerateConfig { reasoning_effort: None, ..cfg } };

    if !caps.attachments && messages.iter().any(contains_attachment) {
        return Err(Error::ProviderNotSupported("attachments".to_string()));
    }

    let mut last_response_id: Option<String> = None;
    let mut tool_envelopes = Vec::new();
    let mut invalid_arg_retries: HashMap<String, u32> = HashMap::new();

    for step in 1..=N_MAX_STEPS {
        emit_event(emit, events, TurnEvent::StepStarted { step });

        let gen_req = GenerateRequest { messages: messages.clone(), tools: tool_defs.clone(), model: model.clone() };
        let actually_streamed = stream && caps.stream;

        let start = Instant::now();
        let result = if actually_streamed {
            let (delta_tx, mut delta_rx) = mpsc::unbounded_channel::<String>();
            let forward_emit = emit.clone();
            let forward = tokio::spawn(async move {
                while let Some(chunk) = delta_rx.recv().await {
                    if let Some(tx) = &forward_emit {
                        let _ = tx.send(TurnEvent::AssistantDelta { step, text: chunk });
                    }
                }
            });
            let result = adapter.generate_turn_stream(gen_req, &cfg, delta_tx).await;
            let _ = forward.await;
            result?
        } else {
            adapter.generate_turn(gen_req, &cfg).await?
        };

        TraceEvent::ProviderCall {
            provider: adapter.provider_id().to_string(),
            model: model.clone(),
            streaming: actually_streamed,
            duration_ms: start.elapsed().as_millis() as u64,
            prompt_tokens: result.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: result.usage.as_ref().map(|u| u.completion_tokens),
        }
        .emit();

        last_response_id = result.response_id.clone().or(last_response_id);

        if !result.tool_calls.is_empty() {
            messages.push(build_assistant_tool_message(&result.text, &result.tool_calls));

            for tc in &result.tool_calls {
                emit_event(
                    emit,
                    events,
                    TurnEvent::ToolCall { step, call_id: tc.call_id.clone(), tool_name: tc.tool_name.clone(), arguments: tc.arguments.clone() },
                );

                if let Some(raw) = &tc.invalid_arguments {
                    let retries = invalid_arg_retries.entry(tc.tool_name.clone()).or_insert(0);
                    if *retries >= 1 {
                        return Err(Error::ProviderInvalidReply {
                            message: format!(
                                "{}: invalid tool arguments after retry: {raw}",
                                tc.tool_name
                            ),
                            cause: None,
                        });
                    }
                    *retries += 1;

                    let text = format!("invalid arguments, not valid JSON: {raw}");
                    emit_event(
                        emit,
                        events,
                        TurnEvent::ToolResult { step, call_id: tc.call_id.clone(), tool_name: tc.tool_name.clone(), ok: false, content: text.clone() },
                    );
                    messages.push(Message::tool_result(tc.call_id.clone(), text));
                    tool_envelopes.push(ToolCallEnvelope { call_id: tc.call_id.clone(), tool_name: tc.tool_name.clone(), arguments: tc.arguments.clone() });
                    continue;
                }

                let outcome = tools.invoke(&tc.tool_name, &tc.arguments, scope.clone()).await;
                let (ok, text) = match outcome {
                    Ok(r) => (r.ok, tool_result_text(&r.output)),
                    Err(e) => (false, e.to_string()),
                };

                emit_event(
                    emit,
                    events,
                    TurnEvent::ToolResult { step, call_id: tc.call_id.clone(), tool_name: tc.tool_name.clone(), ok, content: text.clone() },
                );

                messages.push(Message::tool_result(tc.call_id.clone(), text));
                tool_envelopes.push(ToolCallEnvelope { call_id: tc.call_id.clone(), tool_name: tc.tool_name.clone(), arguments: tc.arguments.clone() });
            }
            continue;
        }

        if !actually_streamed {
            emit_event(emit, events, TurnEvent::AssistantDelta { step, text: result.text.clone() });
        }
        emit_event(emit, events, TurnEvent::Completed { step, reply: result.text.clone() });
        return Ok((result.text, last_response_id, tool_envelopes));
    }

    Err(Error::ProviderInvalidReply { message: "max steps exceeded".to_string(), cause: None })
}

fn contains_attachment(msg: &Message) -> bool {
    match &msg.content {
        MessageContent::Text(_) => false,
        MessageContent::Parts(parts) => parts.iter().any(|p| matches!(p, ContentPart::Image { .. })),
    }
}

/// Mirrors the teacher's `build_assistant_tool_message` helper: one
/// assistant message carrying the turn's text (if any) plus a `tool_use`
/// part per call, so the next step's request replays the model's own
/// tool-call framing back to it.
fn build_assistant_tool_message(text: &str, tool_calls: &[ToolCall]) -> Message {
    let mut parts = Vec::new();
    if !text.is_empty() {
        parts.push(ContentPart::Text { text: text.to_string() });
    }
    for tc in tool_calls {
        parts.push(ContentPart::ToolUse { id: tc.call_id.clone(), name: tc.tool_name.clone(), input: tc.arguments.clone() });
    }
    Message { role: Role::Assistant, content: MessageContent::Parts(parts) }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step 7: persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn persist_turn(
    state: &AppState,
    chat_id: &str,
    input: &[InputMessage],
    reply_text: &str,
    provider_response_id: Option<String>,
    tool_calls: Vec<ToolCallEnvelope>,
) -> Result<()> {
    let user_messages: Vec<RuntimeMessage> = input.iter().filter(|m| m.role == "user").map(to_runtime_message).collect();
    let reply_text = reply_text.to_string();

    state
        .store
        .write_conversations(|c| {
            let Some(chat) = c.get_mut(chat_id) else { return };
            for m in user_messages {
                chat.history.push(m);
            }

            let metadata = if provider_response_id.is_some() || !tool_calls.is_empty() {
                Some(MessageMetadata { provider_response_id, tool_calls, tool_call_id: None })
            } else {
                None
            };
            chat.history.push(RuntimeMessage {
                role: MessageRole::Assistant,
                msg_type: "message".to_string(),
                content: vec![ContentItem::Text { text: reply_text }],
                metadata,
                created_at: chrono::Utc::now(),
            });
            chat.updated_at = chrono::Utc::now();

            if chat.name == "New Chat" {
                if let Some(first_user_text) = chat.history.iter().find(|m| m.role == MessageRole::User).map(|m| m.text()) {
                    chat.name = truncate_runes(&first_user_text, 20);
                }
            }
        })
        .await?;
    Ok(())
}

fn to_runtime_message(msg: &InputMessage) -> RuntimeMessage {
    RuntimeMessage {
        role: MessageRole::User,
        msg_type: msg.msg_type.clone(),
        content: msg
            .content
            .iter()
            .map(|c| match c {
                InputContentItem::Text { text } => ContentItem::Text { text: text.clone() },
                InputContentItem::Image { url } => ContentItem::Image { url: url.clone() },
            })
            .collect(),
        metadata: None,
        created_at: chrono::Utc::now(),
    }
}

fn truncate_runes(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step 8: channel dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn dispatch_reply(state: &AppState, key: &ChatKey, channel_name: &str, text: &str, overrides: ChannelOverrides) -> Result<()> {
    let resolved = channel::resolve(&state.config.channels, channel_name, overrides)?;
    channel::send(resolved, &key.user_id, &key.session_id, text).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_channel_name_defaults_to_console() {
        assert_eq!(resolve_channel_name(None), "console");
        assert_eq!(resolve_channel_name(Some("  ")), "console");
        assert_eq!(resolve_channel_name(Some(" QQ ")), "qq");
    }

    fn text_input(role: &str, text: &str) -> InputMessage {
        InputMessage { role: role.to_string(), msg_type: "message".to_string(), content: vec![InputContentItem::Text { text: text.to_string() }] }
    }

    #[test]
    fn is_new_command_matches_trimmed_slash_new() {
        assert!(is_new_command(&[text_input("user", "  /new  ")]));
        assert!(!is_new_command(&[text_input("user", "/new please")]));
        assert!(!is_new_command(&[text_input("assistant", "/new")]));
        assert!(!is_new_command(&[text_input("user", "/new"), text_input("user", "/new")]));
    }

    #[test]
    fn tool_result_text_extracts_shell_style_output() {
        let output = serde_json::json!({"results": [{"status": "finished", "output": "ok\n"}]});
        assert_eq!(tool_result_text(&output), "ok");
    }

    #[test]
    fn tool_result_text_falls_back_to_raw_json() {
        let output = serde_json::json!({"unexpected": 1});
        assert_eq!(tool_result_text(&output), output.to_string());
    }

    #[test]
    fn truncate_runes_counts_characters_not_bytes() {
        assert_eq!(truncate_runes("hello world, this sentence is long", 5), "hello");
        assert_eq!(truncate_runes("你好吗今天天气怎么样呢谢谢大家一起来", 3), "你好吗");
    }

    #[test]
    fn detect_manual_tool_prefers_explicit_tool_field() {
        let biz = BizParams { tool: Some(serde_json::json!({"name": "shell", "items": [{"command": "echo ok"}]})), ..Default::default() };
        let registry = ToolRegistry::new(sa_domain::config::ToolsConfig::default());
        let (name, args) = detect_manual_tool(&biz, &registry).unwrap();
        assert_eq!(name, "shell");
        assert_eq!(args["items"][0]["command"], "echo ok");
    }

    #[test]
    fn contains_attachment_detects_image_parts() {
        let text_only = Message::user("hi");
        let with_image = Message { role: Role::User, content: MessageContent::Parts(vec![ContentPart::Image { url: "x".into(), media_type: None }]) };
        assert!(!contains_attachment(&text_only));
        assert!(contains_attachment(&with_image));
    }

    /// Always replies with the same invalid-arguments tool call, so the step
    /// loop's retry-once/escalate path gets exercised deterministically.
    struct InvalidArgsAdapter;

    #[async_trait::async_trait]
    impl Adapter for InvalidArgsAdapter {
        async fn generate_turn(&self, _req: GenerateRequest, _cfg: &GenerateConfig) -> Result<sa_providers::traits::GenerateResult> {
            Ok(sa_providers::traits::GenerateResult {
                text: String::new(),
                tool_calls: vec![ToolCall {
                    call_id: "call_1".into(),
                    tool_name: "shell".into(),
                    arguments: serde_json::json!({}),
                    invalid_arguments: Some("{not json".into()),
                }],
                usage: None,
                model: "mock".into(),
                finish_reason: Some("tool_calls".into()),
                response_id: None,
            })
        }

        async fn generate_turn_stream(
            &self,
            req: GenerateRequest,
            cfg: &GenerateConfig,
            _delta_tx: mpsc::UnboundedSender<String>,
        ) -> Result<sa_providers::traits::GenerateResult> {
            self.generate_turn(req, cfg).await
        }

        fn capabilities(&self) -> sa_domain::capability::Capabilities {
            sa_domain::capability::Capabilities { stream: false, tool_call: true, attachments: true, reasoning: true }
        }

        fn provider_id(&self) -> &str {
            "invalid-args-mock"
        }
    }

    #[tokio::test]
    async fn run_step_loop_retries_invalid_arguments_once_then_escalates() {
        let adapter: Arc<dyn Adapter> = Arc::new(InvalidArgsAdapter);
        let mut messages = vec![Message::user("run a command")];
        let tools = ToolRegistry::new(sa_domain::config::ToolsConfig::default());
        let scope = ToolScope { session_id: "s1".into(), user_id: "u1".into(), channel: "console".into() };
        let mut events = Vec::new();

        let result = run_step_loop(
            adapter,
            &mut messages,
            Vec::new(),
            "mock-model".to_string(),
            GenerateConfig::default(),
            scope,
            false,
            &None,
            &mut events,
            &tools,
        )
        .await;

        match result {
            Err(Error::ProviderInvalidReply { message, .. }) => {
                assert!(message.contains("{not json"), "error should carry the raw argument blob: {message}");
            }
            other => panic!("expected ProviderInvalidReply after one retry, got {other:?}"),
        }

        // One retry means exactly one error tool-result was fed back before
        // escalating, not a silent `{}`-arguments tool invocation.
        let tool_result_count = messages.iter().filter(|m| matches!(m.role, Role::Tool)).count();
        assert_eq!(tool_result_count, 1);
    }
}
