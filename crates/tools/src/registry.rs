//! Tool plugin registry (spec §4.3).
//!
//! Tools register under a lowercase canonical name and declare the
//! [`ToolCapabilities`] flags that drive the per-turn derived-name
//! computation (`open`, `click`, `screenshot`, `self_ops`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use sa_domain::capability::ToolCapabilities;
use sa_domain::config::ToolsConfig;
use sa_domain::error::{Error, Result};

/// The scope a turn is executing under, auto-injected into tools that
/// need it (currently only `self_ops`).
#[derive(Debug, Clone)]
pub struct ToolScope {
    pub session_id: String,
    pub user_id: String,
    pub channel: String,
}

/// Normalized invocation handed to a tool: always `{items: [...]}` after
/// [`crate::normalize::normalize_args`].
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub items: Vec<Value>,
    pub scope: ToolScope,
}

/// Structured result of a tool invocation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolResult {
    pub ok: bool,
    pub output: Value,
}

impl ToolResult {
    pub fn ok(output: Value) -> Self {
        Self { ok: true, output }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Canonical lowercase name this tool is registered under.
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for a single item's parameters.
    fn parameters(&self) -> Value;
    fn capabilities(&self) -> ToolCapabilities;
    async fn invoke(&self, cmd: ToolCommand) -> Result<ToolResult>;
}

/// Fixed set of tool names presented verbatim when `prompt_mode=claude`.
const CLAUDE_COMPAT_NAMES: &[&str] = &["read", "write", "bash", "glob", "grep"];

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    config: ToolsConfig,
}

impl ToolRegistry {
    pub fn new(config: ToolsConfig) -> Self {
        Self { tools: HashMap::new(), config }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let canonical = crate::normalize::normalize_name(name);
        self.tools.get(&canonical).cloned()
    }

    /// Invoke a tool by (possibly aliased) name with raw, unnormalized
    /// arguments.
    pub async fn invoke(&self, name: &str, raw_args: &Value, scope: ToolScope) -> Result<ToolResult> {
        let canonical = crate::normalize::normalize_name(name);
        if self.config.is_disabled(&canonical) {
            return Err(Error::ToolDisabled(canonical));
        }
        let tool = self
            .tools
            .get(&canonical)
            .ok_or_else(|| Error::ToolNotFound(canonical.clone()))?;

        let normalized = crate::normalize::normalize_args(raw_args);
        let items = normalized
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .ok_or_else(|| Error::InvalidToolInput("normalized arguments missing 'items'".into()))?;

        tool.invoke(ToolCommand { items, scope }).await
    }

    /// The snapshot of tool names the model may see this turn: registered
    /// names minus disabled ones, plus derived names, plus the
    /// Claude-compat set when `prompt_mode == "claude"`.
    pub fn snapshot_for_turn(&self, prompt_mode: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .keys()
            .filter(|name| !self.config.is_disabled(name))
            .cloned()
            .collect();

        let has_flag = |pred: fn(&ToolCapabilities) -> bool| {
            self.tools
                .values()
                .any(|t| !self.config.is_disabled(t.name()) && pred(&t.capabilities()))
        };

        if has_flag(|c| c.open_local || c.open_url) {
            names.push("open".to_string());
        }
        if has_flag(|c| c.approx_click) {
            names.push("click".to_string());
        }
        if has_flag(|c| c.approx_screenshot) {
            names.push("screenshot".to_string());
        }
        if !self.config.is_disabled("self_ops") {
            names.push("self_ops".to_string());
        }

        if prompt_mode == "claude" {
            names.extend(CLAUDE_COMPAT_NAMES.iter().map(|s| s.to_string()));
        }

        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubTool {
        name: String,
        caps: ToolCapabilities,
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn parameters(&self) -> Value {
            serde_json::json!({})
        }
        fn capabilities(&self) -> ToolCapabilities {
            self.caps
        }
        async fn invoke(&self, _cmd: ToolCommand) -> Result<ToolResult> {
            Ok(ToolResult::ok(serde_json::json!({})))
        }
    }

    fn scope() -> ToolScope {
        ToolScope { session_id: "s".into(), user_id: "u".into(), channel: "console".into() }
    }

    #[test]
    fn snapshot_includes_derived_open_when_any_tool_declares_open_local() {
        let mut registry = ToolRegistry::new(ToolsConfig::default());
        registry.register(Arc::new(StubTool {
            name: "view".into(),
            caps: ToolCapabilities { open_local: true, ..Default::default() },
        }));
        let snapshot = registry.snapshot_for_turn("default");
        assert!(snapshot.contains(&"open".to_string()));
        assert!(snapshot.contains(&"self_ops".to_string()));
    }

    #[test]
    fn snapshot_excludes_disabled_tools() {
        let mut config = ToolsConfig::default();
        config.disabled_tools.insert("shell".into());
        let mut registry = ToolRegistry::new(config);
        registry.register(Arc::new(StubTool { name: "shell".into(), caps: ToolCapabilities::default() }));
        let snapshot = registry.snapshot_for_turn("default");
        assert!(!snapshot.contains(&"shell".to_string()));
    }

    #[test]
    fn snapshot_adds_claude_compat_set_when_prompt_mode_claude() {
        let registry = ToolRegistry::new(ToolsConfig::default());
        let snapshot = registry.snapshot_for_turn("claude");
        assert!(snapshot.contains(&"bash".to_string()));
    }

    #[tokio::test]
    async fn invoke_rejects_unknown_tool() {
        let registry = ToolRegistry::new(ToolsConfig::default());
        let result = registry.invoke("nonexistent", &serde_json::json!({}), scope()).await;
        assert!(matches!(result, Err(Error::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn invoke_rejects_disabled_tool() {
        let mut config = ToolsConfig::default();
        config.disabled_tools.insert("shell".into());
        let mut registry = ToolRegistry::new(config);
        registry.register(Arc::new(StubTool { name: "shell".into(), caps: ToolCapabilities::default() }));
        let result = registry.invoke("shell", &serde_json::json!({}), scope()).await;
        assert!(matches!(result, Err(Error::ToolDisabled(_))));
    }

    #[tokio::test]
    async fn invoke_normalizes_aliased_name() {
        let mut registry = ToolRegistry::new(ToolsConfig::default());
        registry.register(Arc::new(StubTool { name: "shell".into(), caps: ToolCapabilities::default() }));
        let result = registry.invoke("exec_command", &serde_json::json!({"command": "echo hi"}), scope()).await;
        assert!(result.is_ok());
    }
}
