//! `shell` tool — foreground/auto-backgrounded command execution.
//!
//! Wraps [`crate::exec::exec`] as a registry [`Tool`]. Each item in the
//! normalized command is one command invocation; multiple items run
//! sequentially so output ordering matches request order.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use sa_domain::capability::ToolCapabilities;
use sa_domain::error::{Error, Result};

use crate::exec::{exec, ExecRequest};
use crate::manager::ProcessManager;
use crate::registry::{Tool, ToolCommand, ToolResult};

pub struct ShellTool {
    manager: Arc<ProcessManager>,
}

impl ShellTool {
    pub fn new(manager: Arc<ProcessManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run a shell command, foreground or auto-backgrounded after a yield window."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "background": {"type": "boolean"},
                "yield_seconds": {"type": "integer"},
                "timeout_sec": {"type": "integer"},
                "cwd": {"type": "string"},
                "env": {"type": "object"},
            },
            "required": ["command"],
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities { execute: true, network: true, ..Default::default() }
    }

    async fn invoke(&self, cmd: ToolCommand) -> Result<ToolResult> {
        let mut outputs = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            let req = item_to_request(item)?;
            let response = exec(&self.manager, req).await;
            outputs.push(serde_json::to_value(&response).unwrap_or_default());
        }

        let ok = outputs
            .iter()
            .all(|o| matches!(o.get("status").and_then(|s| s.as_str()), Some("finished") | Some("running")));

        Ok(ToolResult { ok, output: serde_json::json!({ "results": outputs }) })
    }
}

fn item_to_request(item: &Value) -> Result<ExecRequest> {
    let obj = item
        .as_object()
        .ok_or_else(|| Error::InvalidToolInput("shell item must be an object".into()))?;

    let command = obj
        .get("command")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidToolInput("shell item missing 'command'".into()))?
        .to_string();

    let background = obj.get("background").and_then(|v| v.as_bool()).unwrap_or(false);
    let yield_ms = obj
        .get("yield_seconds")
        .and_then(|v| v.as_u64())
        .map(|secs| secs * 1000);
    let timeout_sec = obj.get("timeout_sec").and_then(|v| v.as_u64());
    let workdir = obj.get("cwd").and_then(|v| v.as_str()).map(str::to_string);
    let env = obj.get("env").and_then(|v| v.as_object()).map(|m| {
        m.iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()
    });

    Ok(ExecRequest { command, background, yield_ms, timeout_sec, workdir, env })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::ExecConfig;

    use crate::registry::ToolScope;

    fn scope() -> ToolScope {
        ToolScope { session_id: "s".into(), user_id: "u".into(), channel: "console".into() }
    }

    #[tokio::test]
    async fn shell_tool_runs_foreground_command() {
        let manager = Arc::new(ProcessManager::new(ExecConfig::default()));
        let tool = ShellTool::new(manager);
        let cmd = ToolCommand { items: vec![serde_json::json!({"command": "echo hi"})], scope: scope() };
        let result = tool.invoke(cmd).await.unwrap();
        assert!(result.ok);
    }
}
