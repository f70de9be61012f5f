//! `view` tool — read-only file access constrained to the workspace root.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use sa_domain::capability::ToolCapabilities;
use sa_domain::error::{Error, Result};

use crate::file_ops::{file_list, file_read, FileListRequest, FileReadRequest};
use crate::path_guard::validate_path;
use crate::registry::{Tool, ToolCommand, ToolResult};

pub struct ViewTool {
    workspace_root: PathBuf,
}

impl ViewTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait]
impl Tool for ViewTool {
    fn name(&self) -> &str {
        "view"
    }

    fn description(&self) -> &str {
        "Read file contents or list a directory within the workspace."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "start": {"type": "integer"},
                "limit": {"type": "integer"},
                "list": {"type": "boolean"},
            },
            "required": ["path"],
        })
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities { open_local: true, read: true, ..Default::default() }
    }

    async fn invoke(&self, cmd: ToolCommand) -> Result<ToolResult> {
        let mut outputs = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            let obj = item
                .as_object()
                .ok_or_else(|| Error::InvalidToolInput("view item must be an object".into()))?;
            let path = obj
                .get("path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::InvalidToolInput("view item missing 'path'".into()))?
                .to_string();

            // Validate up front so traversal/blacklist rejections map to
            // `tool_forbidden_path` rather than the generic `tool_error`
            // that a downstream I/O failure would produce.
            validate_path(&self.workspace_root, &path).map_err(Error::ToolForbiddenPath)?;

            let is_list = obj.get("list").and_then(|v| v.as_bool()).unwrap_or(false);
            let result = if is_list {
                file_list(&self.workspace_root, FileListRequest { path })
            } else {
                let offset = obj.get("start").and_then(|v| v.as_u64()).map(|v| v as usize);
                let limit = obj.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);
                file_read(&self.workspace_root, FileReadRequest { path, offset, limit })
            }
            .await
            .map_err(Error::ToolError)?;

            outputs.push(result);
        }
        Ok(ToolResult { ok: true, output: serde_json::json!({ "results": outputs }) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn view_reads_file_within_workspace() {
        let ws = tempfile::TempDir::new().unwrap();
        std::fs::write(ws.path().join("a.txt"), "hello").unwrap();
        let tool = ViewTool::new(ws.path().to_path_buf());
        let cmd = ToolCommand {
            items: vec![serde_json::json!({"path": "a.txt"})],
            scope: crate::registry::ToolScope { session_id: "s".into(), user_id: "u".into(), channel: "console".into() },
        };
        let result = tool.invoke(cmd).await.unwrap();
        assert!(result.ok);
        assert_eq!(result.output["results"][0]["content"], "hello");
    }

    #[tokio::test]
    async fn view_rejects_traversal_as_forbidden_path() {
        let ws = tempfile::TempDir::new().unwrap();
        let tool = ViewTool::new(ws.path().to_path_buf());
        let cmd = ToolCommand {
            items: vec![serde_json::json!({"path": "../etc/passwd"})],
            scope: crate::registry::ToolScope { session_id: "s".into(), user_id: "u".into(), channel: "console".into() },
        };
        let result = tool.invoke(cmd).await;
        assert!(matches!(result, Err(Error::ToolForbiddenPath(_))));
    }
}
