//! `write` tool — create/overwrite/append/move/delete files within the
//! workspace root.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use sa_domain::capability::ToolCapabilities;
use sa_domain::error::{Error, Result};

use crate::file_ops::{
    file_append, file_delete, file_move, file_write, FileAppendRequest, FileDeleteRequest,
    FileMoveRequest, FileWriteRequest,
};
use crate::path_guard::validate_path;
use crate::registry::{Tool, ToolCommand, ToolResult};

pub struct WriteTool {
    workspace_root: PathBuf,
}

impl WriteTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "write"
    }

    fn description(&self) -> &str {
        "Create, overwrite, append to, move, or delete a file within the workspace."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {"enum": ["write", "append", "move", "delete"]},
                "path": {"type": "string"},
                "content": {"type": "string"},
                "destination": {"type": "string"},
            },
            "required": ["action"],
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities { write: true, ..Default::default() }
    }

    async fn invoke(&self, cmd: ToolCommand) -> Result<ToolResult> {
        let mut outputs = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            outputs.push(self.apply(item).await?);
        }
        Ok(ToolResult { ok: true, output: serde_json::json!({ "results": outputs }) })
    }
}

impl WriteTool {
    async fn apply(&self, item: &Value) -> Result<Value> {
        let obj = item
            .as_object()
            .ok_or_else(|| Error::InvalidToolInput("write item must be an object".into()))?;
        let action = obj.get("action").and_then(|v| v.as_str()).unwrap_or("write");

        let path_of = |key: &str| -> Result<String> {
            obj.get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidToolInput(format!("write item missing '{key}'")))
        };

        match action {
            "write" => {
                let path = path_of("path")?;
                validate_path(&self.workspace_root, &path).map_err(Error::ToolForbiddenPath)?;
                let content = obj.get("content").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                file_write(&self.workspace_root, FileWriteRequest { path, content }).await.map_err(Error::ToolError)
            }
            "append" => {
                let path = path_of("path")?;
                validate_path(&self.workspace_root, &path).map_err(Error::ToolForbiddenPath)?;
                let content = obj.get("content").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                file_append(&self.workspace_root, FileAppendRequest { path, content }).await.map_err(Error::ToolError)
            }
            "move" => {
                let source = path_of("path")?;
                let destination = path_of("destination")?;
                validate_path(&self.workspace_root, &source).map_err(Error::ToolForbiddenPath)?;
                validate_path(&self.workspace_root, &destination).map_err(Error::ToolForbiddenPath)?;
                file_move(&self.workspace_root, FileMoveRequest { source, destination }).await.map_err(Error::ToolError)
            }
            "delete" => {
                let path = path_of("path")?;
                validate_path(&self.workspace_root, &path).map_err(Error::ToolForbiddenPath)?;
                file_delete(&self.workspace_root, FileDeleteRequest { path }).await.map_err(Error::ToolError)
            }
            other => Err(Error::InvalidToolInput(format!("unknown write action '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolScope;

    fn scope() -> ToolScope {
        ToolScope { session_id: "s".into(), user_id: "u".into(), channel: "console".into() }
    }

    #[tokio::test]
    async fn write_tool_creates_file() {
        let ws = tempfile::TempDir::new().unwrap();
        let tool = WriteTool::new(ws.path().to_path_buf());
        let cmd = ToolCommand {
            items: vec![serde_json::json!({"action": "write", "path": "out.txt", "content": "hi"})],
            scope: scope(),
        };
        let result = tool.invoke(cmd).await.unwrap();
        assert!(result.ok);
        assert!(ws.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn write_tool_rejects_absolute_destination() {
        let ws = tempfile::TempDir::new().unwrap();
        let tool = WriteTool::new(ws.path().to_path_buf());
        let cmd = ToolCommand {
            items: vec![serde_json::json!({"action": "write", "path": "/etc/passwd", "content": "x"})],
            scope: scope(),
        };
        let result = tool.invoke(cmd).await;
        assert!(matches!(result, Err(Error::ToolForbiddenPath(_))));
    }
}
