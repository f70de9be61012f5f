use sa_domain::capability::Capabilities;
use sa_domain::error::Result;
use sa_domain::stream::Usage;
use sa_domain::tool::{Message, ToolCall, ToolDefinition};
use tokio::sync::mpsc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic turn request (one model call, spec §4.1.6.a).
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub model: String,
}

/// Per-call overrides resolved by the engine, never by the adapter
/// (spec §4.1.6.c: api key, base url, headers, timeout, reasoning effort,
/// store flag, prompt cache key, previous response id).
#[derive(Debug, Clone, Default)]
pub struct GenerateConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub headers: Vec<(String, String)>,
    pub timeout_ms: u64,
    pub reasoning_effort: Option<String>,
    pub store: bool,
    pub prompt_cache_key: Option<String>,
    pub previous_response_id: Option<String>,
}

/// The final result of one turn — text deltas (if streamed) arrive over the
/// caller-supplied channel; this is the aggregated result the engine acts
/// on afterwards. Tool-call aggregation happens inside the adapter; the
/// engine never sees a typed tool-call-started/delta/finished event stream.
#[derive(Debug, Clone, Default)]
pub struct GenerateResult {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    pub model: String,
    pub finish_reason: Option<String>,
    /// Provider-assigned id for this response, when the provider exposes one
    /// (used as `previous_response_id` on the next turn).
    pub response_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core adapter trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every provider adapter implements. Capability negotiation
/// (stream/tool_call/attachments/reasoning) is the engine's job, not the
/// adapter's — an adapter just declares what it can do via
/// [`Adapter::capabilities`] and the engine decides whether to call
/// `generate_turn` or `generate_turn_stream`, and whether to strip tools
/// from the request before calling in.
#[async_trait::async_trait]
pub trait Adapter: Send + Sync {
    /// Run one turn to completion, no incremental output.
    async fn generate_turn(
        &self,
        req: GenerateRequest,
        cfg: &GenerateConfig,
    ) -> Result<GenerateResult>;

    /// Run one turn, forwarding text deltas over `delta_tx` as they arrive.
    /// `delta_tx` may be dropped by the receiver at any time; adapters must
    /// tolerate a closed channel and keep running to completion.
    async fn generate_turn_stream(
        &self,
        req: GenerateRequest,
        cfg: &GenerateConfig,
        delta_tx: mpsc::UnboundedSender<String>,
    ) -> Result<GenerateResult>;

    /// The advertised capabilities of this adapter.
    fn capabilities(&self) -> Capabilities;

    /// A unique identifier for this adapter instance (the configured
    /// provider id, not a constant per provider kind).
    fn provider_id(&self) -> &str;
}
