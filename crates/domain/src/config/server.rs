use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// Env var holding the API bearer token. Unset/empty -> dev mode (no auth).
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub read_header_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub read_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub write_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub idle_timeout_seconds: Option<u64>,
    #[serde(default = "d_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
    #[serde(default)]
    pub disable_qq_inbound_supervisor: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            api_key_env: d_api_key_env(),
            read_header_timeout_seconds: None,
            read_timeout_seconds: None,
            write_timeout_seconds: None,
            idle_timeout_seconds: None,
            shutdown_timeout_seconds: d_shutdown_timeout(),
            disable_qq_inbound_supervisor: false,
        }
    }
}

impl ServerConfig {
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("NEXTAI_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("NEXTAI_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(v) = std::env::var("NEXTAI_HTTP_READ_HEADER_TIMEOUT_SECONDS") {
            self.read_header_timeout_seconds = v.parse().ok();
        }
        if let Ok(v) = std::env::var("NEXTAI_HTTP_READ_TIMEOUT_SECONDS") {
            self.read_timeout_seconds = v.parse().ok();
        }
        if let Ok(v) = std::env::var("NEXTAI_HTTP_WRITE_TIMEOUT_SECONDS") {
            self.write_timeout_seconds = v.parse().ok();
        }
        if let Ok(v) = std::env::var("NEXTAI_HTTP_IDLE_TIMEOUT_SECONDS") {
            self.idle_timeout_seconds = v.parse().ok();
        }
        if let Ok(v) = std::env::var("NEXTAI_HTTP_SHUTDOWN_TIMEOUT_SECONDS") {
            if let Ok(v) = v.parse() {
                self.shutdown_timeout_seconds = v;
            }
        }
        self.disable_qq_inbound_supervisor = env_bool("NEXTAI_DISABLE_QQ_INBOUND_SUPERVISOR");
    }
}

fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_port() -> u16 {
    8080
}
fn d_api_key_env() -> String {
    "NEXTAI_API_KEY".into()
}
fn d_shutdown_timeout() -> u64 {
    10
}

/// Feature flags (spec §6 `/runtime-config`), each read straight from env.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct FeatureFlags {
    pub prompt_templates: bool,
    pub prompt_context_introspect: bool,
    pub codex_mode_v2: bool,
}

impl FeatureFlags {
    pub fn from_env() -> Self {
        Self {
            prompt_templates: env_bool("NEXTAI_ENABLE_PROMPT_TEMPLATES"),
            prompt_context_introspect: env_bool("NEXTAI_ENABLE_PROMPT_CONTEXT_INTROSPECT"),
            codex_mode_v2: env_bool("NEXTAI_ENABLE_CODEX_MODE_V2"),
        }
    }
}

fn env_bool(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
