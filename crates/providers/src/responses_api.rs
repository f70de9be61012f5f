//! Codex-compatible Responses API adapter (`POST /responses`).
//!
//! Parses the SSE event types the Responses API emits: `response.created`,
//! `response.output_text.delta`, `response.output_item.done` (covering both
//! `message` items, as a text fallback, and `function_call` items), and
//! `response.completed`. Captures `response.id` for use as the next turn's
//! `previous_response_id` (spec §4.2).

use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;

use sa_domain::capability::Capabilities;
use sa_domain::config::ProviderConfig;
use sa_domain::error::{Error, Result};
use sa_domain::stream::Usage;
use sa_domain::tool::{Message, Role, ToolCall, ToolDefinition};

use crate::auth::AuthRotator;
use crate::sse::consume_sse;
use crate::traits::{Adapter, GenerateConfig, GenerateRequest, GenerateResult};
use crate::util::from_reqwest;

pub struct ResponsesApiAdapter {
    id: String,
    base_url: String,
    auth: AuthRotator,
    default_model: String,
    client: reqwest::Client,
}

impl ResponsesApiAdapter {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let auth = AuthRotator::from_auth_config(&cfg.auth)?;
        let default_model = cfg.default_model.clone().unwrap_or_else(|| "gpt-5.2-codex".into());
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
        })
    }

    fn effective_model(&self, req: &GenerateRequest) -> String {
        if req.model.is_empty() {
            self.default_model.clone()
        } else {
            req.model.clone()
        }
    }

    fn build_body(&self, req: &GenerateRequest, cfg: &GenerateConfig) -> Value {
        let input: Vec<Value> = req.messages.iter().map(msg_to_input_item).collect();

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "input": input,
            "stream": true,
            "store": cfg.store,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_function).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(effort) = &cfg.reasoning_effort {
            body["reasoning"] = serde_json::json!({"effort": effort});
        }
        if let Some(key) = &cfg.prompt_cache_key {
            body["prompt_cache_key"] = Value::String(key.clone());
        }
        if let Some(prev) = &cfg.previous_response_id {
            body["previous_response_id"] = Value::String(prev.clone());
        }
        body
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
}

fn msg_to_input_item(msg: &Message) -> Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    serde_json::json!({
        "role": role,
        "content": [{"type": "input_text", "text": msg.content.extract_all_text()}],
    })
}

fn tool_to_function(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "name": tool.name,
        "description": tool.description,
        "parameters": tool.parameters,
    })
}

#[derive(Default)]
struct ResponseAccumulator {
    text: String,
    tool_calls: Vec<ToolCall>,
    usage: Option<Usage>,
    finish_reason: Option<String>,
    response_id: Option<String>,
    model: Option<String>,
}

fn apply_event(acc: &mut ResponseAccumulator, data: &str, delta_tx: &mpsc::UnboundedSender<String>) {
    let event: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(_) => return,
    };
    let event_type = event.get("type").and_then(|t| t.as_str()).unwrap_or("");

    match event_type {
        "response.created" => {
            if let Some(id) = event.pointer("/response/id").and_then(|v| v.as_str()) {
                acc.response_id = Some(id.to_string());
            }
            if let Some(model) = event.pointer("/response/model").and_then(|v| v.as_str()) {
                acc.model = Some(model.to_string());
            }
        }
        "response.output_text.delta" => {
            if let Some(delta) = event.get("delta").and_then(|v| v.as_str()) {
                acc.text.push_str(delta);
                let _ = delta_tx.send(delta.to_string());
            }
        }
        "response.output_item.done" => {
            if let Some(item) = event.get("item") {
                match item.get("type").and_then(|t| t.as_str()) {
                    Some("function_call") => {
                        let call_id = item.get("call_id").and_then(|v| v.as_str()).unwrap_or_default();
                        let tool_name = item.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                        let args_str = item.get("arguments").and_then(|v| v.as_str()).unwrap_or("{}");
                        let (arguments, invalid_arguments) = match serde_json::from_str(args_str) {
                            Ok(v) => (v, None),
                            Err(_) => (Value::Object(Default::default()), Some(args_str.to_string())),
                        };
                        acc.tool_calls.push(ToolCall {
                            call_id: call_id.to_string(),
                            tool_name: tool_name.to_string(),
                            arguments,
                            invalid_arguments,
                        });
                    }
                    Some("message") => {
                        // Fallback path: some deployments omit output_text.delta
                        // and only emit the full message on item completion.
                        if acc.text.is_empty() {
                            if let Some(text) = item
                                .get("content")
                                .and_then(|c| c.as_array())
                                .and_then(|a| a.iter().find_map(|p| p.get("text")).and_then(|t| t.as_str()))
                            {
                                acc.text.push_str(text);
                                let _ = delta_tx.send(text.to_string());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "response.completed" => {
            acc.finish_reason = Some("stop".into());
            if let Some(usage) = event.pointer("/response/usage").and_then(parse_usage) {
                acc.usage = Some(usage);
            }
            if acc.response_id.is_none() {
                if let Some(id) = event.pointer("/response/id").and_then(|v| v.as_str()) {
                    acc.response_id = Some(id.to_string());
                }
            }
        }
        _ => {}
    }
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("input_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("output_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

#[async_trait::async_trait]
impl Adapter for ResponsesApiAdapter {
    async fn generate_turn(
        &self,
        req: GenerateRequest,
        cfg: &GenerateConfig,
    ) -> Result<GenerateResult> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = self.generate_turn_stream(req, cfg, tx).await?;
        while rx.try_recv().is_ok() {}
        Ok(result)
    }

    async fn generate_turn_stream(
        &self,
        req: GenerateRequest,
        cfg: &GenerateConfig,
        delta_tx: mpsc::UnboundedSender<String>,
    ) -> Result<GenerateResult> {
        let base_url = cfg.base_url.clone().unwrap_or_else(|| self.base_url.clone());
        let url = format!("{base_url}/responses");
        let body = self.build_body(&req, cfg);
        let model = self.effective_model(&req);

        tracing::debug!(provider = %self.id, %url, "responses_api request");

        let resp = self.authed_post(&url, cfg).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::ProviderRequestFailed(format!(
                "{}: HTTP {} - {}", self.id, status.as_u16(), err_text
            )));
        }

        let acc = Mutex::new(ResponseAccumulator::default());
        consume_sse(resp, |data| {
            let mut acc = acc.lock().expect("accumulator lock poisoned");
            apply_event(&mut acc, data, &delta_tx);
        })
        .await?;

        let acc = acc.into_inner().expect("accumulator lock poisoned");
        Ok(GenerateResult {
            text: acc.text,
            tool_calls: acc.tool_calls,
            usage: acc.usage,
            model: acc.model.unwrap_or(model),
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

    #[tokio::test]
    async fn apply_event_accumulates_text_deltas_and_response_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut acc = ResponseAccumulator::default();
        apply_event(&mut acc, r#"{"type":"response.created","response":{"id":"resp_1","model":"gpt-5.2-codex"}}"#, &tx);
        apply_event(&mut acc, r#"{"type":"response.output_text.delta","delta":"hel"}"#, &tx);
        apply_event(&mut acc, r#"{"type":"response.output_text.delta","delta":"lo"}"#, &tx);
        apply_event(&mut acc, r#"{"type":"response.completed","response":{"id":"resp_1"}}"#, &tx);

        assert_eq!(acc.text, "hello");
        assert_eq!(acc.response_id.as_deref(), Some("resp_1"));
        assert_eq!(acc.model.as_deref(), Some("gpt-5.2-codex"));
        assert_eq!(rx.recv().await, Some("hel".to_string()));
        assert_eq!(rx.recv().await, Some("lo".to_string()));
    }

    #[tokio::test]
    async fn apply_event_captures_function_call_tool_calls() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut acc = ResponseAccumulator::default();
        apply_event(
            &mut acc,
            r#"{"type":"response.output_item.done","item":{"type":"function_call","call_id":"c1","name":"view","arguments":"{\"path\":\"a.txt\"}"}}"#,
            &tx,
        );
        assert_eq!(acc.tool_calls.len(), 1);
        assert_eq!(acc.tool_calls[0].tool_name, "view");
    }
}
