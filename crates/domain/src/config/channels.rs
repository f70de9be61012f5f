use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Channel dispatch (spec §4.7)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-channel plugin configuration. `console` is always known and always
/// enabled unless explicitly disabled; `webhook`/`qq` are known once
/// configured here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub disabled_channels: HashSet<String>,
    #[serde(default)]
    pub webhook: Option<WebhookChannelConfig>,
    #[serde(default)]
    pub qq: Option<QqChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookChannelConfig {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QqChannelConfig {
    pub bot_prefix: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ChannelsConfig {
    /// Known channel ids this process has a plugin for (spec §4.1.1:
    /// unknown channel -> `channel_not_supported`).
    pub fn is_known(&self, channel: &str) -> bool {
        match channel {
            "console" => true,
            "webhook" => self.webhook.is_some(),
            "qq" => self.qq.is_some(),
            _ => false,
        }
    }

    pub fn is_disabled(&self, channel: &str) -> bool {
        self.disabled_channels.contains(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_is_always_known() {
        assert!(ChannelsConfig::default().is_known("console"));
    }

    #[test]
    fn webhook_unknown_until_configured() {
        assert!(!ChannelsConfig::default().is_known("webhook"));
        let cfg = ChannelsConfig { webhook: Some(WebhookChannelConfig { url: "http://x".into(), headers: HashMap::new() }), ..Default::default() };
        assert!(cfg.is_known("webhook"));
    }
}
