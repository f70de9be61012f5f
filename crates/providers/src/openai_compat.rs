//! OpenAI `/chat/completions` adapter.
//!
//! Two provider kinds share this adapter: [`ProviderKind::OpenaiChat`] (the
//! built-in OpenAI endpoint) and [`ProviderKind::OpenaiCompatible`] (any
//! OpenAI-wire-compatible endpoint — Ollama, vLLM, LM Studio, etc). They
//! differ only in whether `store`/`prompt_cache_key`/`previous_response_id`
//! are forwarded in the request body (spec §8 invariant 8).

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;

use sa_domain::capability::Capabilities;
use sa_domain::config::ProviderConfig;
use sa_domain::error::{Error, Result};
use sa_domain::stream::Usage;
use sa_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};

use crate::auth::AuthRotator;
use crate::sse::consume_sse;
use crate::traits::{Adapter, GenerateConfig, GenerateRequest, GenerateResult};
use crate::util::from_reqwest;

pub struct OpenAiCompatAdapter {
    id: String,
    base_url: String,
    auth: AuthRotator,
    default_model: String,
    client: reqwest::Client,
    /// Whether `store`/`prompt_cache_key`/`previous_response_id` are
    /// forwarded to the upstream.
    forward_extras: bool,
}

impl OpenAiCompatAdapter {
    pub fn from_config(cfg: &ProviderConfig, forward_extras: bool) -> Result<Self> {
        let auth = AuthRotator::from_auth_config(&cfg.auth)?;
        let default_model = cfg.default_model.clone().unwrap_or_else(|| "gpt-4o".into());
        let base_url = cfg
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".into());
        let timeout_ms = cfg.timeout_ms.unwrap_or(120_000);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            default_model,
            client,
            forward_extras,
        })
    }

    fn authed_post(&self, url: &str, cfg: &GenerateConfig) -> reqwest::RequestBuilder {
        let key = cfg
            .api_key
            .clone()
            .unwrap_or_else(|| self.auth.next_key().key);
        let mut builder = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {key}"))
            .header("Content-Type", "application/json");
        for (name, value) in &cfg.headers {
            builder = builder.header(name, value);
        }
        builder
    }

    fn effective_model(&self, req: &GenerateRequest) -> String {
        if req.model.is_empty() {
            self.default_model.clone()
        } else {
            req.model.clone()
        }
    }

    fn build_body(&self, req: &GenerateRequest, cfg: &GenerateConfig, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
            "stream": stream,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(effort) = &cfg.reasoning_effort {
            body["reasoning_effort"] = Value::String(effort.clone());
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        if self.forward_extras {
            body["store"] = Value::Bool(cfg.store);
            if let Some(key) = &cfg.prompt_cache_key {
                body["prompt_cache_key"] = Value::String(key.clone());
            }
            if let Some(prev) = &cfg.previous_response_id {
                body["previous_response_id"] = Value::String(prev.clone());
            }
        }
        body
    }

    fn base_url_for(&self, cfg: &GenerateConfig) -> String {
        cfg.base_url
            .clone()
            .unwrap_or_else(|| self.base_url.clone())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => tool_result_to_openai(msg),
        Role::Assistant => assistant_to_openai(msg),
        _ => {
            let text = msg.content.extract_all_text();
            serde_json::json!({
                "role": role_to_str(msg.role),
                "content": text,
            })
        }
    }
}

fn assistant_to_openai(msg: &Message) -> Value {
    let mut obj = serde_json::json!({"role": "assistant"});
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    match &msg.content {
        MessageContent::Text(t) => text_parts.push(t.clone()),
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => text_parts.push(text.clone()),
                    ContentPart::ToolUse { id, name, input } => {
                        tool_calls.push(serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": { "name": name, "arguments": input.to_string() }
                        }));
                    }
                    _ => {}
                }
            }
        }
    }

    obj["content"] = if text_parts.is_empty() {
        Value::Null
    } else {
        Value::String(text_parts.join("\n"))
    };
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

fn tool_result_to_openai(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Parts(parts) => {
            for part in parts {
                if let ContentPart::ToolResult { tool_use_id, content, .. } = part {
                    return serde_json::json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    });
                }
            }
            serde_json::json!({"role": "tool", "tool_call_id": "", "content": ""})
        }
        MessageContent::Text(t) => serde_json::json!({
            "role": "tool", "tool_call_id": "", "content": t,
        }),
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
    let arr = match message.get("tool_calls").and_then(|v| v.as_array()) {
        Some(a) => a,
        None => return Vec::new(),
    };
    arr.iter()
        .filter_map(|tc| {
            let call_id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let tool_name = func.get("name")?.as_str()?.to_string();
            let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
            let (arguments, invalid_arguments) = match serde_json::from_str(args_str) {
                Ok(v) => (v, None),
                Err(_) => (Value::Object(Default::default()), Some(args_str.to_string())),
            };
            Some(ToolCall { call_id, tool_name, arguments, invalid_arguments })
        })
        .collect()
}

fn parse_non_streaming(provider_id: &str, body: &Value) -> Result<GenerateResult> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::ProviderInvalidReply {
            message: format!("{provider_id}: no choices in response"),
            cause: None,
        })?;
    let message = choice.get("message").ok_or_else(|| Error::ProviderInvalidReply {
        message: format!("{provider_id}: no message in choice"),
        cause: None,
    })?;

    let text = message.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let finish_reason = choice.get("finish_reason").and_then(|v| v.as_str()).map(String::from);
    let model = body.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
    let tool_calls = parse_tool_calls(message);
    let usage = body.get("usage").and_then(parse_usage);
    let response_id = message
        .get("id")
        .and_then(|v| v.as_str())
        .or_else(|| body.get("id").and_then(|v| v.as_str()))
        .map(String::from);

    Ok(GenerateResult { text, tool_calls, usage, model, finish_reason, response_id })
}

/// Mutable accumulator for one streamed turn, filled in by successive
/// `data:` frames (spec §4.1.6: text deltas forwarded live, tool-call
/// arguments aggregated internally and surfaced only in the final result).
#[derive(Default)]
struct StreamAccumulator {
    text: String,
    tool_calls: HashMap<u64, (String, String, String)>, // index -> (call_id, name, args)
    usage: Option<Usage>,
    finish_reason: Option<String>,
    model: Option<String>,
    response_id: Option<String>,
}

fn apply_sse_frame(acc: &mut StreamAccumulator, data: &str, delta_tx: &mpsc::UnboundedSender<String>) {
    if data.trim() == "[DONE]" {
        return;
    }
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return,
    };
    if let Some(model) = v.get("model").and_then(|m| m.as_str()) {
        acc.model = Some(model.to_string());
    }
    if let Some(id) = v.get("id").and_then(|i| i.as_str()) {
        acc.response_id = Some(id.to_string());
    }

    let choice = match v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first()) {
        Some(c) => c,
        None => {
            if let Some(usage) = v.get("usage").and_then(parse_usage) {
                acc.usage = Some(usage);
            }
            return;
        }
    };

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        acc.finish_reason = Some(fr.to_string());
        if let Some(usage) = v.get("usage").and_then(parse_usage) {
            acc.usage = Some(usage);
        }
    }

    let delta = choice.get("delta").unwrap_or(&Value::Null);

    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            let idx = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            let entry = acc.tool_calls.entry(idx).or_insert_with(|| (String::new(), String::new(), String::new()));
            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                entry.0 = id.to_string();
            }
            if let Some(name) = tc.get("function").and_then(|f| f.get("name")).and_then(|v| v.as_str()) {
                entry.1 = name.to_string();
            }
            if let Some(args) = tc.get("function").and_then(|f| f.get("arguments")).and_then(|v| v.as_str()) {
                entry.2.push_str(args);
            }
        }
    }

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            acc.text.push_str(text);
            let _ = delta_tx.send(text.to_string());
        }
    }
}

#[async_trait::async_trait]
impl Adapter for OpenAiCompatAdapter {
    async fn generate_turn(
        &self,
        req: GenerateRequest,
        cfg: &GenerateConfig,
    ) -> Result<GenerateResult> {
        let url = format!("{}/chat/completions", self.base_url_for(cfg));
        let body = self.build_body(&req, cfg, false);

        tracing::debug!(provider = %self.id, %url, "openai_compat chat request");

        let resp = self.authed_post(&url, cfg).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::ProviderRequestFailed(format!(
                "{}: HTTP {} - {}", self.id, status.as_u16(), text
            )));
        }
        let json: Value = serde_json::from_str(&text)?;
        parse_non_streaming(&self.id, &json)
    }

    async fn generate_turn_stream(
        &self,
        req: GenerateRequest,
        cfg: &GenerateConfig,
        delta_tx: mpsc::UnboundedSender<String>,
    ) -> Result<GenerateResult> {
        let url = format!("{}/chat/completions", self.base_url_for(cfg));
        let body = self.build_body(&req, cfg, true);

        tracing::debug!(provider = %self.id, %url, "openai_compat stream request");

        let resp = self.authed_post(&url, cfg).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::ProviderRequestFailed(format!(
                "{}: HTTP {} - {}", self.id, status.as_u16(), err_text
            )));
        }

        let acc = Mutex::new(StreamAccumulator::default());
        consume_sse(resp, |data| {
            let mut acc = acc.lock().expect("accumulator lock poisoned");
            apply_sse_frame(&mut acc, data, &delta_tx);
        })
        .await?;

        let acc = acc.into_inner().expect("accumulator lock poisoned");
        let mut tool_calls: Vec<(u64, ToolCall)> = acc
            .tool_calls
            .into_iter()
            .map(|(idx, (call_id, tool_name, args))| {
                let (arguments, invalid_arguments) = match serde_json::from_str(&args) {
                    Ok(v) => (v, None),
                    Err(_) => (Value::Object(Default::default()), Some(args)),
                };
                (idx, ToolCall { call_id, tool_name, arguments, invalid_arguments })
            })
            .collect();
        tool_calls.sort_by_key(|(idx, _)| *idx);

        Ok(GenerateResult {
            text: acc.text,
            tool_calls: tool_calls.into_iter().map(|(_, tc)| tc).collect(),
            usage: acc.usage,
            model: acc.model.unwrap_or_else(|| self.effective_model(&req)),
            finish_reason: acc.finish_reason,
            response_id: acc.response_id,
        })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { stream: true, tool_call: true, attachments: true, reasoning: true }
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_non_streaming_extracts_text_and_tool_calls() {
        let body = serde_json::json!({
            "model": "gpt-4o",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "function": {"name": "view", "arguments": "{\"path\":\"a.txt\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let result = parse_non_streaming("p1", &body).unwrap();
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].tool_name, "view");
        assert_eq!(result.usage.unwrap().total_tokens, 15);
    }

    #[tokio::test]
    async fn apply_sse_frame_accumulates_text_and_forwards_deltas() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut acc = StreamAccumulator::default();
        apply_sse_frame(&mut acc, r#"{"choices":[{"delta":{"content":"hel"}}]}"#, &tx);
        apply_sse_frame(&mut acc, r#"{"choices":[{"delta":{"content":"lo"}}]}"#, &tx);
        apply_sse_frame(&mut acc, r#"{"choices":[{"finish_reason":"stop","delta":{}}]}"#, &tx);
        assert_eq!(acc.text, "hello");
        assert_eq!(acc.finish_reason.as_deref(), Some("stop"));
        assert_eq!(rx.recv().await, Some("hel".to_string()));
        assert_eq!(rx.recv().await, Some("lo".to_string()));
    }

    #[test]
    fn parse_non_streaming_captures_response_id_for_previous_response_id() {
        let body = serde_json::json!({
            "id": "chatcmpl-abc123",
            "model": "gpt-4o",
            "choices": [{
                "finish_reason": "stop",
                "message": {"content": "hi"}
            }]
        });
        let result = parse_non_streaming("p1", &body).unwrap();
        assert_eq!(result.response_id.as_deref(), Some("chatcmpl-abc123"));
    }

    #[tokio::test]
    async fn apply_sse_frame_captures_top_level_response_id() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut acc = StreamAccumulator::default();
        apply_sse_frame(&mut acc, r#"{"id":"chatcmpl-xyz","choices":[{"delta":{"content":"hi"}}]}"#, &tx);
        assert_eq!(acc.response_id.as_deref(), Some("chatcmpl-xyz"));
    }

    #[test]
    fn parse_tool_calls_marks_unparsable_arguments_instead_of_silently_defaulting() {
        let message = serde_json::json!({
            "tool_calls": [{
                "id": "call_1",
                "function": {"name": "exec", "arguments": "{not json"}
            }]
        });
        let calls = parse_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].invalid_arguments.as_deref(), Some("{not json"));
        assert_eq!(calls[0].arguments, serde_json::json!({}));
    }
}
