//! Chat CRUD (spec §6): list/create/delete against the Conversations
//! aggregate. `chat-default` can never be deleted (spec §3) — the store
//! layer enforces this and the handler here just forwards the error.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use sa_domain::chat::Chat;
use sa_domain::error::Error;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListChatsQuery {
    pub user_id: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatSummary {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub channel: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub message_count: usize,
}

impl From<&Chat> for ChatSummary {
    fn from(c: &Chat) -> Self {
        Self {
            id: c.id.clone(),
            session_id: c.session_id.clone(),
            user_id: c.user_id.clone(),
            channel: c.channel.clone(),
            name: c.name.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
            message_count: c.history.len(),
        }
    }
}

pub async fn list_chats(State(state): State<AppState>, Query(q): Query<ListChatsQuery>) -> Result<impl IntoResponse, ApiError> {
    let mut chats: Vec<ChatSummary> = state
        .store
        .read_conversations(|c| {
            c.chats
                .values()
                .filter(|chat| q.user_id.as_deref().map_or(true, |u| chat.user_id == u))
                .filter(|chat| q.channel.as_deref().map_or(true, |ch| chat.channel == ch))
                .map(ChatSummary::from)
                .collect::<Vec<_>>()
        })
        .await;
    chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(Json(serde_json::json!({"chats": chats})))
}

#[derive(Debug, Deserialize)]
pub struct CreateChatBody {
    pub session_id: String,
    pub user_id: String,
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "console".to_string()
}

pub async fn create_chat(State(state): State<AppState>, Json(body): Json<CreateChatBody>) -> Result<impl IntoResponse, ApiError> {
    let id = uuid::Uuid::new_v4().to_string();
    let chat = Chat::new(id.clone(), body.session_id.clone(), body.user_id.clone(), body.channel.clone());
    state.store.write_conversations(|c| c.insert(chat)).await?;

    let key = sa_domain::chat::ChatKey::new(body.session_id, body.user_id, body.channel);
    state.store.write_session(|s| s.bind(&key, id.clone())).await?;

    Ok(Json(serde_json::json!({"id": id})))
}

pub async fn get_chat(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let chat = state
        .store
        .read_conversations(|c| c.get(&id).cloned())
        .await
        .ok_or_else(|| Error::NotFound(id.clone()))?;
    Ok(Json(serde_json::json!({"id": chat.id, "name": chat.name, "messages": chat.history})))
}

#[derive(Debug, Deserialize)]
pub struct UpdateChatBody {
    pub id: String,
    pub name: String,
}

pub async fn update_chat(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<UpdateChatBody>) -> Result<impl IntoResponse, ApiError> {
    if body.id != id {
        return Err(Error::ChatIdMismatch.into());
    }
    state
        .store
        .write_conversations(|c| {
            if let Some(chat) = c.get_mut(&id) {
                chat.name = body.name.clone();
                chat.updated_at = chrono::Utc::now();
            }
        })
        .await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn delete_chat(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    state.store.write_conversations(|c| c.delete(&id)).await??;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct BatchDeleteBody {
    pub ids: Vec<String>,
}

pub async fn batch_delete_chats(State(state): State<AppState>, Json(body): Json<BatchDeleteBody>) -> Result<impl IntoResponse, ApiError> {
    let results = state
        .store
        .write_conversations(|c| {
            body.ids
                .iter()
                .map(|id| (id.clone(), c.delete(id).map(|_| ()).map_err(|e| e.to_string())))
                .collect::<Vec<_>>()
        })
        .await?;
    Ok(Json(serde_json::json!({"results": results.into_iter().map(|(id, r)| serde_json::json!({"id": id, "ok": r.is_ok(), "error": r.err()})).collect::<Vec<_>>()})))
}
