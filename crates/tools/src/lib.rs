//! Tool Runtime (spec §4.3): a plugin registry of built-in tools plus the
//! shared path-containment and argument-normalization machinery every
//! tool invocation passes through before it reaches a plugin.

pub mod exec;
pub mod file_ops;
pub mod manager;
pub mod normalize;
pub mod path_guard;
pub mod process;
pub mod process_tool;
pub mod registry;
pub mod self_ops;
pub mod shell;
pub mod view;
pub mod write_tool;

pub use manager::ProcessManager;
pub use registry::{Tool, ToolCommand, ToolRegistry, ToolResult, ToolScope};

use std::path::PathBuf;
use std::sync::Arc;

use sa_domain::config::ToolsConfig;

/// Build the registry with the standard built-in tool set, honoring
/// `config.enable_browser_tool`/`enable_search_tool` (both unimplemented —
/// spec.md's Non-goals exclude external browser/search integrations; the
/// flags exist so a future adapter can gate on them without a config
/// schema change).
pub fn build_registry(config: ToolsConfig, workspace_root: PathBuf, manager: Arc<ProcessManager>) -> ToolRegistry {
    let mut registry = ToolRegistry::new(config);
    registry.register(Arc::new(shell::ShellTool::new(manager.clone())));
    registry.register(Arc::new(process_tool::ProcessTool::new(manager)));
    registry.register(Arc::new(view::ViewTool::new(workspace_root.clone())));
    registry.register(Arc::new(write_tool::WriteTool::new(workspace_root)));
    registry.register(Arc::new(self_ops::SelfOpsTool));
    registry
}
