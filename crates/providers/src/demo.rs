//! The built-in demo adapter: always available, requires no credentials,
//! echoes the last user message back prefixed with `"Echo: "` (spec §3 A).

use sa_domain::capability::Capabilities;
use sa_domain::error::Result;
use sa_domain::tool::{Message, MessageContent, Role};
use tokio::sync::mpsc;

use crate::traits::{Adapter, GenerateConfig, GenerateRequest, GenerateResult};

pub const DEMO_MODEL: &str = "demo-chat";

pub struct DemoAdapter {
    id: String,
}

impl DemoAdapter {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    fn reply_for(&self, req: &GenerateRequest) -> GenerateResult {
        let last_user_text = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.content.text())
            .unwrap_or_default();

        GenerateResult {
            text: format!("Echo: {last_user_text}"),
            tool_calls: Vec::new(),
            usage: None,
            model: DEMO_MODEL.to_string(),
            finish_reason: Some("stop".into()),
            response_id: None,
        }
    }
}

#[async_trait::async_trait]
impl Adapter for DemoAdapter {
    async fn generate_turn(
        &self,
        req: GenerateRequest,
        _cfg: &GenerateConfig,
    ) -> Result<GenerateResult> {
        Ok(self.reply_for(&req))
    }

    async fn generate_turn_stream(
        &self,
        req: GenerateRequest,
        _cfg: &GenerateConfig,
        delta_tx: mpsc::UnboundedSender<String>,
    ) -> Result<GenerateResult> {
        let result = self.reply_for(&req);
        let _ = delta_tx.send(result.text.clone());
        Ok(result)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            stream: true,
            tool_call: false,
            attachments: false,
            reasoning: false,
        }
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(text: &str) -> GenerateRequest {
        GenerateRequest {
            messages: vec![Message::user(text)],
            tools: Vec::new(),
            model: DEMO_MODEL.into(),
        }
    }

    #[tokio::test]
    async fn echoes_last_user_text() {
        let adapter = DemoAdapter::new("demo");
        let result = adapter
            .generate_turn(req("hello"), &GenerateConfig::default())
            .await
            .unwrap();
        assert_eq!(result.text, "Echo: hello");
    }

    #[tokio::test]
    async fn stream_variant_forwards_full_text_as_one_delta() {
        let adapter = DemoAdapter::new("demo");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = adapter
            .generate_turn_stream(req("hi"), &GenerateConfig::default(), tx)
            .await
            .unwrap();
        assert_eq!(result.text, "Echo: hi");
        assert_eq!(rx.recv().await, Some("Echo: hi".to_string()));
    }
}
