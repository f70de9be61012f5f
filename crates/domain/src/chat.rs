//! Core conversational data model (spec §3): chats, history, and the
//! system-layer / turn-event records the Turn Engine emits per turn.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The id of the chat that always exists and can never be deleted.
pub const DEFAULT_CHAT_ID: &str = "chat-default";

/// A conversation, uniquely keyed by `(session_id, user_id, channel)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub channel: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Free-form metadata: `prompt_mode`, `collaboration_mode`,
    /// `collaboration_last_event`, `active_llm_override`, cron provenance, ...
    #[serde(default)]
    pub meta: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub history: Vec<RuntimeMessage>,
}

impl Chat {
    pub fn new(id: impl Into<String>, session_id: String, user_id: String, channel: String) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            session_id,
            user_id,
            channel,
            name: "New Chat".to_string(),
            created_at: now,
            updated_at: now,
            meta: HashMap::new(),
            history: Vec::new(),
        }
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(|v| v.as_str())
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.meta.insert(key.into(), value);
    }
}

/// Key identifying a chat before it is created: `(session_id, user_id, channel)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatKey {
    pub session_id: String,
    pub user_id: String,
    pub channel: String,
}

impl ChatKey {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            channel: channel.into(),
        }
    }
}

/// One message in a chat's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeMessage {
    pub role: MessageRole,
    #[serde(rename = "type", default = "default_message_type")]
    pub msg_type: String,
    pub content: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    pub created_at: DateTime<Utc>,
}

fn default_message_type() -> String {
    "message".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text { text: String },
    Image { url: String },
}

/// Optional metadata carried by a history message: provider response id,
/// tool-call envelopes, or tool-result linkage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallEnvelope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallEnvelope {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

impl RuntimeMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            msg_type: default_message_type(),
            content: vec![ContentItem::Text { text: text.into() }],
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            msg_type: default_message_type(),
            content: vec![ContentItem::Text { text: text.into() }],
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ContentItem::Text { text } => Some(text.as_str()),
                ContentItem::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A system-role prompt segment contributing to model input (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemLayer {
    pub name: String,
    pub role: &'static str,
    pub source: String,
    pub content: String,
    pub layer_hash: String,
    pub estimated_tokens: u32,
}

impl SystemLayer {
    pub fn new(name: impl Into<String>, source: impl Into<String>, content: String) -> Self {
        let layer_hash = layer_hash(&content);
        let estimated_tokens = estimate_tokens(&content);
        Self {
            name: name.into(),
            role: "system",
            source: source.into(),
            content,
            layer_hash,
            estimated_tokens,
        }
    }
}

/// `layer_hash` is a pure function of the layer's normalized content
/// (spec §8 invariant 6): SHA-256, first 16 hex chars, over content with
/// CRLF normalized to LF and trailing whitespace trimmed.
pub fn layer_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let normalized = content.replace("\r\n", "\n");
    let trimmed = normalized.trim_end();
    let digest = Sha256::digest(trimmed.as_bytes());
    hex::encode(&digest[..8])
}

/// Upper-bound token estimate via a mixed-script heuristic: CJK runes count
/// 1 token each, all other text is counted by whitespace-separated words.
pub fn estimate_tokens(content: &str) -> u32 {
    let mut count: u32 = 0;
    let mut in_word = false;
    for ch in content.chars() {
        if is_cjk(ch) {
            count += 1;
            in_word = false;
        } else if ch.is_whitespace() {
            in_word = false;
        } else if !in_word {
            count += 1;
            in_word = true;
        }
    }
    count
}

pub fn is_cjk(ch: char) -> bool {
    matches!(ch as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x3040..=0x30FF | 0xAC00..=0xD7AF)
}

/// A turn-level event emitted by the Turn Engine (spec §3, §4.1).
/// Carries no timestamp; `step` is 1-indexed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    #[serde(rename = "step_started")]
    StepStarted { step: u32 },
    #[serde(rename = "assistant_delta")]
    AssistantDelta { step: u32, text: String },
    #[serde(rename = "tool_call")]
    ToolCall {
        step: u32,
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        step: u32,
        call_id: String,
        tool_name: String,
        ok: bool,
        content: String,
    },
    #[serde(rename = "completed")]
    Completed { step: u32, reply: String },
    #[serde(rename = "error")]
    Error { step: u32, meta: ErrorMeta },
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMeta {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_hash_ignores_crlf_vs_lf() {
        let a = layer_hash("line one\nline two");
        let b = layer_hash("line one\r\nline two");
        assert_eq!(a, b);
    }

    #[test]
    fn layer_hash_is_pure_function_of_content() {
        assert_eq!(layer_hash("same"), layer_hash("same"));
        assert_ne!(layer_hash("same"), layer_hash("different"));
    }

    #[test]
    fn estimate_tokens_counts_ascii_words() {
        assert_eq!(estimate_tokens("hello world"), 2);
    }

    #[test]
    fn estimate_tokens_counts_cjk_runes_individually() {
        // three CJK characters -> three "tokens"
        assert_eq!(estimate_tokens("你好吗"), 3);
    }

    #[test]
    fn estimate_tokens_mixed_script() {
        assert_eq!(estimate_tokens("hello 你好"), 1 + 2);
    }

    #[test]
    fn chat_new_has_default_name() {
        let c = Chat::new(DEFAULT_CHAT_ID, "s1".into(), "u1".into(), "console".into());
        assert_eq!(c.name, "New Chat");
        assert!(c.history.is_empty());
    }
}
