use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace & data directory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Repo-relative root the system-prompt assembler resolves candidate
    /// base-system files against (e.g. `docs/AI/AGENTS.md`).
    #[serde(default = "d_root")]
    pub root: PathBuf,
    /// `<data_dir>`: aggregate JSON state, cron lease files, web dir.
    #[serde(default = "d_data_dir")]
    pub data_dir: PathBuf,
    /// Served static web assets — contracts only for the core; the core
    /// never reads files from here itself.
    #[serde(default)]
    pub web_dir: Option<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: d_root(),
            data_dir: d_data_dir(),
            web_dir: None,
        }
    }
}

fn d_root() -> PathBuf {
    PathBuf::from(".")
}
fn d_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl WorkspaceConfig {
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("NEXTAI_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("NEXTAI_WEB_DIR") {
            self.web_dir = Some(PathBuf::from(v));
        }
    }
}
