use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability [AMBIENT]
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Logging/tracing knobs. Never part of the operator-facing JSON config —
/// always resolved straight from env so a deploy can tweak it without a
/// config-file edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "d_log_filter")]
    pub log_filter: String,
    /// `NEXTAI_OTEL_ENDPOINT` — when unset, no OTLP exporter is built and
    /// tracing-subscriber runs alone.
    #[serde(default)]
    pub otel_endpoint: Option<String>,
    #[serde(default = "d_service_name")]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: d_log_filter(),
            otel_endpoint: None,
            service_name: d_service_name(),
        }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("NEXTAI_LOG").unwrap_or_else(|_| d_log_filter()),
            otel_endpoint: std::env::var("NEXTAI_OTEL_ENDPOINT").ok().filter(|s| !s.is_empty()),
            service_name: d_service_name(),
        }
    }

    pub fn otel_enabled(&self) -> bool {
        self.otel_endpoint.is_some()
    }
}

fn d_log_filter() -> String {
    "info".into()
}
fn d_service_name() -> String {
    "nextai-gateway".into()
}
