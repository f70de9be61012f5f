//! Resolves candidate system-prompt files from disk and hands them to
//! `sa_promptpack::assemble` (spec §4.4). The assembler itself is pure over
//! already-read content; this module owns the repo-relative path search.

use std::path::{Path, PathBuf};

use sa_domain::config::PromptConfig;
use sa_domain::mode::PromptMode;
use sa_promptpack::codex::PromptSourceMode;
use sa_promptpack::{AssembleSources, ClaudeModeSources, CodexModeSources, DefaultModeSources};

const MAX_LAYER_CHARS: usize = 24_000;

fn read(root: &Path, rel: &str) -> Option<String> {
    std::fs::read_to_string(root.join(rel)).ok()
}

const CODEX_KNOWN_MODES: &[&str] = &["default", "plan", "execute", "pair_programming"];

/// Build the prompt sources for `mode` and assemble the layer list. Caller
/// already knows `mode`/`collaboration_mode` by the time this runs (Turn
/// Engine steps 3-4).
pub fn assemble_layers(
    root: &Path,
    prompt_config: &PromptConfig,
    mode: PromptMode,
    turn_mode: &str,
    request_user_input_available: bool,
    requested_model_slug: Option<&str>,
) -> sa_domain::error::Result<(Vec<sa_domain::chat::SystemLayer>, Option<String>)> {
    match mode {
        PromptMode::Default => {
            let candidates: Vec<Option<String>> = sa_promptpack::default_mode::BASE_SYSTEM_CANDIDATES
                .iter()
                .map(|p| read(root, p))
                .collect();
            let tool_guide = read(root, "docs/AI/tool-guide.md");
            let workspace_policy = read(root, "docs/AI/workspace-policy.md");
            let session_policy = read(root, "docs/AI/session-policy.md");
            let sources = DefaultModeSources {
                base_system_candidates: &candidates,
                tool_guide_system: tool_guide.as_deref(),
                workspace_policy_system: workspace_policy.as_deref(),
                session_policy_system: session_policy.as_deref(),
                max_layer_chars: MAX_LAYER_CHARS,
            };
            sa_promptpack::assemble(AssembleSources::Default(sources))
        }
        PromptMode::Codex => {
            let base = read(root, "docs/AI/codex-base.md");
            let source_mode = match prompt_config.codex_prompt_source.as_deref() {
                Some("catalog") => PromptSourceMode::Catalog,
                _ => PromptSourceMode::File,
            };
            let template = read(root, "docs/AI/codex-personality.tmpl");
            let catalog_raw = read(root, "docs/AI/codex-catalog.json");
            let catalog_json: Option<serde_json::Value> = catalog_raw.and_then(|s| serde_json::from_str(&s).ok());
            let orchestrator = read(root, "docs/AI/codex-orchestrator.md");
            let collaboration = read(root, "docs/AI/codex-collaboration.md");
            let local_policy = read(root, "docs/AI/codex-local-policy.md");
            let tool_guide = read(root, "docs/AI/tool-guide.md");

            let sources = CodexModeSources {
                codex_base_system: base.as_deref(),
                prompt_source: source_mode,
                model_instructions_template: template.as_deref(),
                personality: None,
                catalog: catalog_json.as_ref(),
                model_slug: requested_model_slug,
                turn_mode,
                known_mode_names: CODEX_KNOWN_MODES,
                request_user_input_available,
                orchestrator_system: orchestrator.as_deref(),
                collaboration_system: collaboration.as_deref(),
                local_policy_system: local_policy.as_deref(),
                tool_guide_system: tool_guide.as_deref(),
                max_layer_chars: MAX_LAYER_CHARS,
            };
            sa_promptpack::assemble(AssembleSources::Codex(sources))
        }
        PromptMode::Claude => {
            let identity = read(root, "docs/AI/claude-identity.md");
            let workflow = read(root, "docs/AI/claude-workflow.md");
            let reminder_start = read(root, "docs/AI/claude-reminder-start.md");
            let reminder_end = read(root, "docs/AI/claude-reminder-end.md");
            let tool_adapter = read(root, "docs/AI/claude-tool-adapter.md");
            let sources = ClaudeModeSources {
                identity: identity.as_deref(),
                workflow: workflow.as_deref(),
                reminder_start: reminder_start.as_deref(),
                reminder_end: reminder_end.as_deref(),
                tool_adapter: tool_adapter.as_deref(),
                max_layer_chars: MAX_LAYER_CHARS,
            };
            sa_promptpack::assemble(AssembleSources::Claude(sources))
        }
    }
}

pub fn workspace_root(root: &Path) -> PathBuf {
    root.to_path_buf()
}
