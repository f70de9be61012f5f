//! QQ bot gateway inbound webhook (spec §4.1, §6): parses C2C/group/guild
//! message-create events and forwards them into the Turn Engine with
//! `channel` forced to `qq`. The concrete QQ wire format is out of scope for
//! the core (spec.md §1 non-goals) — this accepts the generic envelope shape
//! the bot gateway actually sends and derives the handful of fields the
//! engine needs.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use sa_domain::error::Error;

use crate::api::error::ApiError;
use crate::runtime::channel::ChannelOverrides;
use crate::runtime::turn::{self, AgentProcessRequest, InputContentItem, InputMessage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QqInboundEvent {
    #[serde(rename = "t")]
    pub event_type: String,
    #[serde(rename = "d")]
    pub data: QqEventData,
}

#[derive(Debug, Deserialize)]
pub struct QqEventData {
    pub id: String,
    pub content: String,
    pub author: QqAuthor,
    #[serde(default)]
    pub group_openid: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QqAuthor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub member_openid: Option<String>,
    #[serde(default)]
    pub user_openid: Option<String>,
}

struct Derived {
    user_id: String,
    target_type: String,
    target_id: String,
}

fn derive(event: &QqInboundEvent) -> Result<Derived, Error> {
    let d = &event.data;
    match event.event_type.as_str() {
        "C2C_MESSAGE_CREATE" => {
            let user_id = d.author.user_openid.clone().ok_or_else(|| Error::InvalidRequest("missing author.user_openid".into()))?;
            Ok(Derived { user_id: user_id.clone(), target_type: "c2c".to_string(), target_id: user_id })
        }
        "GROUP_AT_MESSAGE_CREATE" => {
            let user_id = d.author.member_openid.clone().ok_or_else(|| Error::InvalidRequest("missing author.member_openid".into()))?;
            let group = d.group_openid.clone().ok_or_else(|| Error::InvalidRequest("missing group_openid".into()))?;
            Ok(Derived { user_id, target_type: "group".to_string(), target_id: group })
        }
        "AT_MESSAGE_CREATE" => {
            let user_id = d.author.id.clone().ok_or_else(|| Error::InvalidRequest("missing author.id".into()))?;
            let channel_id = d.channel_id.clone().ok_or_else(|| Error::InvalidRequest("missing channel_id".into()))?;
            Ok(Derived { user_id, target_type: "guild_channel".to_string(), target_id: channel_id })
        }
        "DIRECT_MESSAGE_CREATE" => {
            let user_id = d.author.id.clone().ok_or_else(|| Error::InvalidRequest("missing author.id".into()))?;
            let guild_id = d.guild_id.clone().ok_or_else(|| Error::InvalidRequest("missing guild_id".into()))?;
            Ok(Derived { user_id, target_type: "direct".to_string(), target_id: guild_id })
        }
        other => Err(Error::InvalidRequest(format!("unsupported qq event type: {other}"))),
    }
}

pub async fn inbound(State(state): State<AppState>, Json(event): Json<QqInboundEvent>) -> Result<impl IntoResponse, ApiError> {
    let derived = derive(&event)?;
    let session_id = format!("qq-{}-{}", derived.target_type, derived.target_id);

    let req = AgentProcessRequest {
        input: vec![InputMessage {
            role: "user".to_string(),
            msg_type: "message".to_string(),
            content: vec![InputContentItem::Text { text: event.data.content.trim().to_string() }],
        }],
        session_id,
        user_id: derived.user_id,
        channel: Some("qq".to_string()),
        stream: Some(false),
        biz_params: Some(crate::runtime::turn::BizParams {
            channel: Some(ChannelOverrides {
                target_type: Some(derived.target_type),
                target_id: Some(derived.target_id),
                msg_id: Some(event.data.id.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }),
    };

    let outcome = turn::process(&state, req, None).await?;
    Ok(Json(serde_json::json!({"ok": true, "reply": outcome.reply})))
}
