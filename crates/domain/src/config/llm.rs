use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub default_timeout_ms: u64,
    /// Registered adapters (data-driven: adding one = adding a config entry).
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// `(provider_id, model)` — the global active slot (spec §3).
    #[serde(default)]
    pub active_slot: Option<ActiveSlot>,
    /// Per-model pricing for cost estimation (key = model name).
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSlot {
    pub provider_id: String,
    pub model: String,
}

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
}

impl ModelPricing {
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_1m + output_tokens as f64 * self.output_per_1m)
            / 1_000_000.0
    }
}

/// One provider adapter instance, as configured by the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Demo adapters ignore this entirely.
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
    /// alias -> canonical model name.
    #[serde(default)]
    pub model_aliases: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
    #[serde(default)]
    pub store: bool,
}

fn d_true() -> bool {
    true
}

/// How a provider's API key is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Plaintext key, inline in config. Discouraged; logged with a warning.
    #[serde(default)]
    pub key: Option<String>,
    /// Name of an env var holding the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Names of env vars, each resolved eagerly, for round-robin rotation.
    /// Takes precedence over `key`/`env` when non-empty.
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub mode: AuthMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    Direct,
    Rotating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `Demo` echoes `"Echo: " + lastUserText`.
    Demo,
    /// Built-in OpenAI `/chat/completions` — never forwards
    /// `store`/`prompt_cache_key`/`previous_response_id` (spec §4.2).
    OpenaiChat,
    /// OpenAI-compatible `/chat/completions` — same wire shape as
    /// `OpenaiChat` but forwards `store`/`prompt_cache_key`/
    /// `previous_response_id` (spec §8 invariant 8).
    OpenaiCompatible,
    /// Codex-compatible Responses API (`/responses`).
    OpenaiResponses,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_pricing_estimate_cost() {
        let pricing = ModelPricing {
            input_per_1m: 2.50,
            output_per_1m: 10.00,
        };
        let cost = pricing.estimate_cost(1000, 500);
        assert!((cost - 0.0075).abs() < 1e-10);
    }

    #[test]
    fn provider_config_defaults_enabled_true() {
        let json = r#"{"id":"p1","kind":"demo"}"#;
        let cfg: ProviderConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.enabled);
    }
}
