mod channels;
mod llm;
mod observability;
mod prompt;
mod server;
mod tools;
mod workspace;

pub use channels::{ChannelsConfig, QqChannelConfig, WebhookChannelConfig};
pub use llm::{ActiveSlot, AuthConfig, AuthMode, LlmConfig, ModelPricing, ProviderConfig, ProviderKind};
pub use observability::ObservabilityConfig;
pub use prompt::PromptConfig;
pub use server::{FeatureFlags, ServerConfig};
pub use tools::{ExecConfig, ExecSecurityConfig, ToolsConfig};
pub use workspace::WorkspaceConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config aggregate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Layered config: built-in default < config file < environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load from (in increasing precedence): built-in defaults, the TOML
    /// file at `NEXTAI_CONFIG` (or `<data_dir>/config.toml` once the
    /// workspace default is known), then environment variables.
    pub fn load() -> Result<Self, crate::error::Error> {
        let mut config = Self::default();

        let config_path = std::env::var("NEXTAI_CONFIG")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|_| config.workspace.data_dir.join("config.toml"));
        if config_path.exists() {
            config = Self::from_file(&config_path)?;
        }

        config.server.apply_env();
        config.workspace.apply_env();
        config.tools.apply_env();
        config.prompt.apply_env();
        // Observability is always resolved from env, never the config file —
        // see ObservabilityConfig's doc comment.
        config.observability = ObservabilityConfig::from_env();

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, crate::error::Error> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| crate::error::Error::InvalidProviderConfig(format!("{}: {e}", path.display())))
    }

    pub fn feature_flags(&self) -> FeatureFlags {
        FeatureFlags::from_env()
    }

    /// Surface-level sanity checks for `doctor`/`config validate` (not
    /// enforced at load time — a misconfigured server still starts so an
    /// operator can fix it via the API).
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.llm.providers.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "no LLM providers configured; the demo adapter will be used".to_string(),
            });
        }

        for provider in &self.llm.providers {
            if provider.auth.key.is_some() {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Warning,
                    message: format!("provider '{}' has a plaintext api key inline in config", provider.id),
                });
            }
            if matches!(provider.kind, ProviderKind::OpenaiChat | ProviderKind::OpenaiCompatible | ProviderKind::OpenaiResponses)
                && provider.base_url.is_none()
            {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    message: format!("provider '{}' requires a base_url", provider.id),
                });
            }
        }

        if !self.workspace.root.exists() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message: format!("workspace root {} does not exist", self.workspace.root.display()),
            });
        }

        issues
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Warning => "warning",
            ConfigSeverity::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
    }
}
