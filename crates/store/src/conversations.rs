//! Conversations aggregate (spec §3): chat documents keyed by chat id.
//! `chat-default` is seeded on first load and can never be removed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use sa_domain::chat::{Chat, DEFAULT_CHAT_ID};
use sa_domain::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationsAggregate {
    #[serde(default)]
    pub chats: HashMap<String, Chat>,
}

impl ConversationsAggregate {
    /// Ensure `chat-default` exists; called once after load.
    pub fn ensure_default_chat(&mut self) {
        self.chats
            .entry(DEFAULT_CHAT_ID.to_string())
            .or_insert_with(|| Chat::new(DEFAULT_CHAT_ID, String::new(), String::new(), "console".to_string()));
    }

    pub fn get(&self, id: &str) -> Option<&Chat> {
        self.chats.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Chat> {
        self.chats.get_mut(id)
    }

    pub fn insert(&mut self, chat: Chat) {
        self.chats.insert(chat.id.clone(), chat);
    }

    /// Delete a chat by id. Refuses to remove `chat-default`.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        if id == DEFAULT_CHAT_ID {
            return Err(Error::DefaultChatProtected);
        }
        Ok(self.chats.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_default_chat_is_idempotent() {
        let mut agg = ConversationsAggregate::default();
        agg.ensure_default_chat();
        agg.get_mut(DEFAULT_CHAT_ID).unwrap().name = "renamed".to_string();
        agg.ensure_default_chat();
        assert_eq!(agg.get(DEFAULT_CHAT_ID).unwrap().name, "renamed");
    }

    #[test]
    fn delete_refuses_default_chat() {
        let mut agg = ConversationsAggregate::default();
        agg.ensure_default_chat();
        assert!(matches!(agg.delete(DEFAULT_CHAT_ID), Err(Error::DefaultChatProtected)));
    }
}
