//! Settings aggregate (spec §3): per-provider configuration plus the
//! global active model slot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsAggregate {
    #[serde(default)]
    pub providers: HashMap<String, ProviderSetting>,
    #[serde(default)]
    pub active_model_slot: Option<ModelSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSetting {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub timeout_seconds: u64,
    pub enabled: bool,
    /// alias → canonical model name.
    #[serde(default)]
    pub model_aliases: HashMap<String, String>,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
    #[serde(default)]
    pub store: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSlot {
    pub provider_id: String,
    pub model: String,
}
