//! `codex` prompt mode (spec §4.4): required `codex_base_system`,
//! personality-rendered `codex_model_instructions_system` (file or
//! catalog source), then fixed-order optional layers, then a dedup pass.

pub mod catalog;
pub mod dedup;
pub mod template;

use sa_domain::chat::SystemLayer;
use sa_domain::error::{Error, Result};

use crate::truncation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSourceMode {
    File,
    Catalog,
}

pub struct CodexModeSources<'a> {
    pub codex_base_system: Option<&'a str>,
    pub prompt_source: PromptSourceMode,
    /// Personality template file content (used when `prompt_source=File`).
    pub model_instructions_template: Option<&'a str>,
    /// Personality requested directly (file mode only).
    pub personality: Option<&'a str>,
    /// Parsed catalog JSON (used when `prompt_source=Catalog`).
    pub catalog: Option<&'a serde_json::Value>,
    pub model_slug: Option<&'a str>,
    pub turn_mode: &'a str,
    pub known_mode_names: &'a [&'a str],
    pub request_user_input_available: bool,
    pub orchestrator_system: Option<&'a str>,
    pub collaboration_system: Option<&'a str>,
    pub local_policy_system: Option<&'a str>,
    pub tool_guide_system: Option<&'a str>,
    pub max_layer_chars: usize,
}

pub struct CodexBuildOutcome {
    pub layers: Vec<SystemLayer>,
    /// Set when the personality/model-instructions layer fell back to
    /// `base_instructions` content — the reason code a caller may surface.
    pub fallback_reason: Option<String>,
}

fn base_instructions_fallback(reason: &'static str, base_content: &str, max_layer_chars: usize) -> SystemLayer {
    SystemLayer::new(
        "codex_model_instructions_system",
        format!("base_instructions_fallback:{reason}"),
        truncation::cap(base_content, max_layer_chars),
    )
}

pub fn build(sources: &CodexModeSources) -> Result<CodexBuildOutcome> {
    let base_content = sources
        .codex_base_system
        .ok_or_else(|| Error::CodexPromptUnavailable("codex_base_system missing".into()))?;

    let mut layers = vec![SystemLayer::new(
        "codex_base_system",
        "codex_base_system",
        truncation::cap(base_content, sources.max_layer_chars),
    )];

    let mut fallback_reason = None;

    match sources.prompt_source {
        PromptSourceMode::File => match sources.model_instructions_template {
            None => {
                fallback_reason = Some("missing_personality_template".to_string());
                layers.push(base_instructions_fallback("missing_personality_template", base_content, sources.max_layer_chars));
            }
            Some(template_str) => {
                let (personality, downgraded) = catalog::normalize_personality(sources.personality);
                let ctx = template::TemplateContext {
                    personality: &personality,
                    turn_mode: sources.turn_mode,
                    known_mode_names: sources.known_mode_names,
                    request_user_input_available: sources.request_user_input_available,
                };
                match template::render(template_str, &ctx) {
                    Some(rendered) => {
                        let source = if downgraded {
                            "codex_model_instructions_system:personality_downgraded"
                        } else {
                            "codex_model_instructions_system"
                        };
                        layers.push(SystemLayer::new(
                            "codex_model_instructions_system",
                            source,
                            truncation::cap(&rendered, sources.max_layer_chars),
                        ));
                    }
                    None => {
                        fallback_reason = Some("unresolved_placeholder".to_string());
                        layers.push(base_instructions_fallback("unresolved_placeholder", base_content, sources.max_layer_chars));
                    }
                }
            }
        },
        PromptSourceMode::Catalog => {
            let catalog = sources.catalog.ok_or_else(|| Error::CodexPromptUnavailable("catalog missing".into()))?;
            let (resolved_slug, entry) = catalog::resolve(catalog, sources.model_slug);

            if entry.template.is_empty() {
                fallback_reason = Some("missing_personality_template".to_string());
                layers.push(base_instructions_fallback("missing_personality_template", base_content, sources.max_layer_chars));
            } else {
                let ctx = template::TemplateContext {
                    personality: &entry.personality,
                    turn_mode: sources.turn_mode,
                    known_mode_names: sources.known_mode_names,
                    request_user_input_available: sources.request_user_input_available,
                };
                match template::render(&entry.template, &ctx) {
                    Some(rendered) => {
                        let source = if entry.personality_downgraded {
                            format!("catalog:{resolved_slug}:personality_downgraded")
                        } else {
                            format!("catalog:{resolved_slug}")
                        };
                        layers.push(SystemLayer::new(
                            "codex_model_instructions_system",
                            source,
                            truncation::cap(&rendered, sources.max_layer_chars),
                        ));
                    }
                    None => {
                        fallback_reason = Some("unresolved_placeholder".to_string());
                        layers.push(base_instructions_fallback("unresolved_placeholder", base_content, sources.max_layer_chars));
                    }
                }
            }
        }
    }

    if let Some(c) = sources.orchestrator_system {
        layers.push(SystemLayer::new("orchestrator_system", "orchestrator_system", truncation::cap(c, sources.max_layer_chars)));
    }
    if let Some(c) = sources.collaboration_system {
        layers.push(SystemLayer::new("collaboration_system", "collaboration_system", truncation::cap(c, sources.max_layer_chars)));
    }
    if let Some(c) = sources.local_policy_system {
        layers.push(SystemLayer::new("local_policy_system", "local_policy_system", truncation::cap(c, sources.max_layer_chars)));
    }
    if let Some(c) = sources.tool_guide_system {
        layers.push(SystemLayer::new("tool_guide_system", "tool_guide_system", truncation::cap(c, sources.max_layer_chars)));
    }

    dedup::dedup_paragraphs(&mut layers);

    Ok(CodexBuildOutcome { layers, fallback_reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_sources<'a>() -> CodexModeSources<'a> {
        CodexModeSources {
            codex_base_system: Some("base instructions"),
            prompt_source: PromptSourceMode::File,
            model_instructions_template: Some("{{ personality }} doing {{ TURN_MODE }}"),
            personality: Some("pragmatic"),
            catalog: None,
            model_slug: None,
            turn_mode: "execute",
            known_mode_names: &["plan", "execute"],
            request_user_input_available: true,
            orchestrator_system: None,
            collaboration_system: None,
            local_policy_system: None,
            tool_guide_system: None,
            max_layer_chars: 10_000,
        }
    }

    #[test]
    fn missing_base_system_is_unavailable() {
        let mut sources = base_sources();
        sources.codex_base_system = None;
        let err = build(&sources).unwrap_err();
        assert_eq!(err.code(), "codex_prompt_unavailable");
    }

    #[test]
    fn renders_personality_template_in_file_mode() {
        let sources = base_sources();
        let outcome = build(&sources).unwrap();
        assert!(outcome.fallback_reason.is_none());
        let instructions = outcome.layers.iter().find(|l| l.name == "codex_model_instructions_system").unwrap();
        assert_eq!(instructions.content, "pragmatic doing execute");
    }

    #[test]
    fn unresolved_placeholder_falls_back_to_base_instructions() {
        let mut sources = base_sources();
        sources.model_instructions_template = Some("{{ unknown_placeholder }}");
        let outcome = build(&sources).unwrap();
        assert_eq!(outcome.fallback_reason.as_deref(), Some("unresolved_placeholder"));
        let instructions = outcome.layers.iter().find(|l| l.name == "codex_model_instructions_system").unwrap();
        assert_eq!(instructions.content, "base instructions");
    }

    #[test]
    fn catalog_mode_resolves_slug_and_renders() {
        let mut sources = base_sources();
        sources.prompt_source = PromptSourceMode::Catalog;
        sources.model_instructions_template = None;
        let catalog = serde_json::json!({"gpt-5.2-codex": {"template": "{{ personality }}!", "personality": "concise"}});
        sources.catalog = Some(&catalog);
        sources.model_slug = Some("missing-slug");
        let outcome = build(&sources).unwrap();
        let instructions = outcome.layers.iter().find(|l| l.name == "codex_model_instructions_system").unwrap();
        assert_eq!(instructions.content, "concise!");
        assert!(instructions.source.starts_with("catalog:gpt-5.2-codex"));
    }
}
