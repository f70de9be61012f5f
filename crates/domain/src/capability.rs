use serde::{Deserialize, Serialize};

/// Capabilities advertised by a provider adapter.
///
/// The Turn Engine filters a request against these *before* dispatch — the
/// adapter itself never has to guard on its own limitations (spec §4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Capabilities {
    pub stream: bool,
    pub tool_call: bool,
    pub attachments: bool,
    pub reasoning: bool,
}

/// Capability flags declared by a tool plugin (spec §4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ToolCapabilities {
    #[serde(default)]
    pub open_local: bool,
    #[serde(default)]
    pub open_url: bool,
    #[serde(default)]
    pub approx_click: bool,
    #[serde(default)]
    pub approx_screenshot: bool,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub execute: bool,
    #[serde(default)]
    pub network: bool,
}
