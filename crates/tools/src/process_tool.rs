//! `process` tool — manage background sessions spawned by [`crate::shell`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use sa_domain::capability::ToolCapabilities;
use sa_domain::error::{Error, Result};

use crate::manager::ProcessManager;
use crate::process::{handle_process, ProcessRequest};
use crate::registry::{Tool, ToolCommand, ToolResult};

pub struct ProcessTool {
    manager: Arc<ProcessManager>,
}

impl ProcessTool {
    pub fn new(manager: Arc<ProcessManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for ProcessTool {
    fn name(&self) -> &str {
        "process"
    }

    fn description(&self) -> &str {
        "List, poll, read, write, kill, or clear background shell sessions."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {"enum": ["list", "poll", "log", "write", "kill", "clear", "remove"]},
                "session_id": {"type": "string"},
            },
            "required": ["action"],
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities { execute: true, ..Default::default() }
    }

    async fn invoke(&self, cmd: ToolCommand) -> Result<ToolResult> {
        let mut outputs = Vec::with_capacity(cmd.items.len());
        let mut all_ok = true;
        for item in &cmd.items {
            let req: ProcessRequest = serde_json::from_value(item.clone())
                .map_err(|e| Error::InvalidToolInput(format!("invalid process item: {e}")))?;
            let response = handle_process(&self.manager, req).await;
            all_ok &= response.success;
            outputs.push(serde_json::to_value(&response).unwrap_or_default());
        }
        Ok(ToolResult { ok: all_ok, output: serde_json::json!({ "results": outputs }) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::ExecConfig;

    use crate::registry::ToolScope;

    #[tokio::test]
    async fn process_tool_lists_empty_sessions() {
        let manager = Arc::new(ProcessManager::new(ExecConfig::default()));
        let tool = ProcessTool::new(manager);
        let cmd = ToolCommand {
            items: vec![serde_json::json!({"action": "list"})],
            scope: ToolScope { session_id: "s".into(), user_id: "u".into(), channel: "console".into() },
        };
        let result = tool.invoke(cmd).await.unwrap();
        assert!(result.ok);
    }
}
