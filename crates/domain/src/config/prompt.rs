use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// System-prompt assembler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptConfig {
    /// `NEXTAI_CODEX_PROMPT_SOURCE` — which base-system file candidate wins
    /// for `codex` layers; unset falls back to the assembler's own search
    /// order.
    #[serde(default)]
    pub codex_prompt_source: Option<String>,
    /// `NEXTAI_CODEX_PROMPT_SHADOW_COMPARE` — when set, the assembler builds
    /// both the resolved and the fallback codex layer and logs a diff
    /// instead of acting on it; never changes the returned layer.
    #[serde(default)]
    pub codex_prompt_shadow_compare: bool,
}

impl PromptConfig {
    pub fn apply_env(&mut self) {
        if let Ok(source) = std::env::var("NEXTAI_CODEX_PROMPT_SOURCE") {
            self.codex_prompt_source = Some(source);
        }
        if std::env::var("NEXTAI_CODEX_PROMPT_SHADOW_COMPARE").is_ok() {
            self.codex_prompt_shadow_compare = env_bool("NEXTAI_CODEX_PROMPT_SHADOW_COMPARE");
        }
    }
}

fn env_bool(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
