use serde::Serialize;

/// Structured trace events emitted across the gateway workspace.
///
/// Each variant is logged as a single `tracing::info!` line carrying the
/// serialized event as a `trace_event` field. This is independent of
/// whatever OTel span is active; it's a cheap, always-on audit trail that
/// the `/v1/runs` introspection surface reconstructs its view from when
/// OTLP export isn't configured.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SystemLayersBuilt {
        prompt_mode: String,
        layer_count: usize,
        estimated_tokens_total: u32,
    },
    ProviderCall {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    ToolInvoked {
        tool_name: String,
        ok: bool,
        duration_ms: u64,
    },
    ChannelDispatched {
        channel: String,
        chars: usize,
        ok: bool,
    },
    CronTick {
        due_jobs: usize,
        acquired: usize,
        skipped: usize,
    },
    LeaseAcquired {
        job_id: String,
        slot: u32,
    },
    LeaseReleased {
        job_id: String,
        slot: u32,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "gateway_event");
    }
}
