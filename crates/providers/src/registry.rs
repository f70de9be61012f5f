//! Provider registry.
//!
//! Constructs and holds all configured adapter instances. At startup the
//! registry reads the [`LlmConfig`], resolves authentication (env vars,
//! direct keys), and instantiates the appropriate adapter for each
//! configured provider. Providers that fail to initialize are logged and
//! skipped rather than aborting startup — the demo adapter is always
//! present so the gateway is never left with zero usable providers.

use std::collections::HashMap;
use std::sync::Arc;

use sa_domain::config::{LlmConfig, ProviderKind};
use sa_domain::error::Result;

use crate::demo::DemoAdapter;
use crate::openai_compat::OpenAiCompatAdapter;
use crate::responses_api::ResponsesApiAdapter;
use crate::traits::Adapter;

pub const DEMO_PROVIDER_ID: &str = "demo";

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Adapter>>,
    init_errors: Vec<ProviderInitError>,
}

/// Records a provider that failed to initialize.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub kind: String,
    /// Error message with any potential secrets masked.
    pub error: String,
}

/// Mask substrings that look like API keys or bearer tokens in an error
/// message before it's logged or surfaced through a readiness endpoint.
pub fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`]. The demo
    /// adapter is always registered under [`DEMO_PROVIDER_ID`], even if the
    /// config never names it — spec §4.1.6.b: "if no provider is configured
    /// at all, route to demo adapter".
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut providers: HashMap<String, Arc<dyn Adapter>> = HashMap::new();
        let mut init_errors: Vec<ProviderInitError> = Vec::new();

        providers.insert(
            DEMO_PROVIDER_ID.to_string(),
            Arc::new(DemoAdapter::new(DEMO_PROVIDER_ID)),
        );

        for pc in &config.providers {
            if !pc.enabled {
                continue;
            }
            let result: Result<Arc<dyn Adapter>> = match pc.kind {
                ProviderKind::Demo => Ok(Arc::new(DemoAdapter::new(pc.id.clone()))),
                ProviderKind::OpenaiChat => OpenAiCompatAdapter::from_config(pc, false)
                    .map(|a| Arc::new(a) as Arc<dyn Adapter>),
                ProviderKind::OpenaiCompatible => OpenAiCompatAdapter::from_config(pc, true)
                    .map(|a| Arc::new(a) as Arc<dyn Adapter>),
                ProviderKind::OpenaiResponses => ResponsesApiAdapter::from_config(pc)
                    .map(|a| Arc::new(a) as Arc<dyn Adapter>),
            };

            match result {
                Ok(adapter) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered provider adapter");
                    providers.insert(pc.id.clone(), adapter);
                }
                Err(e) => {
                    let safe_error = mask_secrets(&e.to_string());
                    tracing::warn!(
                        provider_id = %pc.id, kind = ?pc.kind, error = %safe_error,
                        "failed to initialize provider adapter, skipping"
                    );
                    init_errors.push(ProviderInitError {
                        provider_id: pc.id.clone(),
                        kind: format!("{:?}", pc.kind),
                        error: safe_error,
                    });
                }
            }
        }

        Self { providers, init_errors }
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn Adapter>> {
        self.providers.get(provider_id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn Adapter>)> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Provider initialization errors (empty if all succeeded).
    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_provider_always_registered() {
        let registry = ProviderRegistry::from_config(&LlmConfig::default());
        assert!(registry.get(DEMO_PROVIDER_ID).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn mask_secrets_redacts_long_token_like_substrings() {
        let masked = mask_secrets("failed with key sk-abcdefghijklmnopqrstuvwxyz12345");
        assert!(!masked.contains("abcdefghijklmnopqrstuvwxyz"));
    }
}
