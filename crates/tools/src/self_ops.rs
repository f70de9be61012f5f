//! `self_ops` tool — the model's introspection handle onto its own turn
//! scope. Always present in the per-turn snapshot unless explicitly
//! disabled (spec §4.3); auto-receives `(session_id, user_id, channel)`
//! rather than taking them as model-supplied arguments.

use async_trait::async_trait;
use serde_json::Value;

use sa_domain::capability::ToolCapabilities;
use sa_domain::error::{Error, Result};

use crate::registry::{Tool, ToolCommand, ToolResult};

pub struct SelfOpsTool;

#[async_trait]
impl Tool for SelfOpsTool {
    fn name(&self) -> &str {
        "self_ops"
    }

    fn description(&self) -> &str {
        "Inspect the current session scope (session_id, user_id, channel)."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {"enum": ["get_scope"]},
            },
            "required": ["action"],
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::default()
    }

    async fn invoke(&self, cmd: ToolCommand) -> Result<ToolResult> {
        let mut outputs = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            let action = item.get("action").and_then(|v| v.as_str()).unwrap_or("get_scope");
            match action {
                "get_scope" => outputs.push(serde_json::json!({
                    "session_id": cmd.scope.session_id,
                    "user_id": cmd.scope.user_id,
                    "channel": cmd.scope.channel,
                })),
                other => return Err(Error::InvalidToolInput(format!("unknown self_ops action '{other}'"))),
            }
        }
        Ok(ToolResult { ok: true, output: serde_json::json!({ "results": outputs }) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolScope;

    #[tokio::test]
    async fn self_ops_returns_injected_scope() {
        let tool = SelfOpsTool;
        let cmd = ToolCommand {
            items: vec![serde_json::json!({"action": "get_scope"})],
            scope: ToolScope { session_id: "s1".into(), user_id: "u1".into(), channel: "console".into() },
        };
        let result = tool.invoke(cmd).await.unwrap();
        assert_eq!(result.output["results"][0]["session_id"], "s1");
    }
}
