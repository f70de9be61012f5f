//! Session aggregate (spec §3): the `(session_id, user_id, channel)` →
//! chat id index backing lazy chat creation on first turn for a new
//! triple. Kept separate from the Conversations aggregate so a read that
//! only needs chat-key resolution never blocks on a concurrent history
//! append.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use sa_domain::chat::ChatKey;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionAggregate {
    #[serde(default)]
    chat_index: HashMap<String, String>,
}

impl SessionAggregate {
    fn key(k: &ChatKey) -> String {
        format!("{}\u{0}{}\u{0}{}", k.session_id, k.user_id, k.channel)
    }

    pub fn lookup(&self, key: &ChatKey) -> Option<&str> {
        self.chat_index.get(&Self::key(key)).map(String::as_str)
    }

    pub fn bind(&mut self, key: &ChatKey, chat_id: impl Into<String>) {
        self.chat_index.insert(Self::key(key), chat_id.into());
    }

    pub fn unbind(&mut self, key: &ChatKey) {
        self.chat_index.remove(&Self::key(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_then_lookup_round_trips() {
        let mut agg = SessionAggregate::default();
        let key = ChatKey::new("s1", "u1", "console");
        agg.bind(&key, "chat-123");
        assert_eq!(agg.lookup(&key), Some("chat-123"));
    }

    #[test]
    fn distinct_channels_do_not_collide() {
        let mut agg = SessionAggregate::default();
        agg.bind(&ChatKey::new("s1", "u1", "console"), "chat-a");
        agg.bind(&ChatKey::new("s1", "u1", "qq"), "chat-b");
        assert_eq!(agg.lookup(&ChatKey::new("s1", "u1", "console")), Some("chat-a"));
        assert_eq!(agg.lookup(&ChatKey::new("s1", "u1", "qq")), Some("chat-b"));
    }
}
