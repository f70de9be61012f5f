//! `default` prompt mode (spec §4.4): `base_system`, `tool_guide_system`,
//! `workspace_policy_system`, `session_policy_system`, in that order.
//!
//! The assembler is a pure function over already-loaded file contents —
//! the Turn Engine's HTTP layer resolves candidate paths and reads them
//! from disk before calling in.

use sa_domain::chat::SystemLayer;
use sa_domain::error::{Error, Result};

use crate::truncation;

/// Candidate repo-relative paths searched in order for the required
/// `base_system` layer; the first with content wins.
pub const BASE_SYSTEM_CANDIDATES: &[&str] = &["docs/AI/AGENTS.md", "docs/AI/ai-tools.md"];

/// Pre-read source content for the `default` mode, one slot per
/// candidate path plus the three other required layers.
pub struct DefaultModeSources<'a> {
    /// One entry per `BASE_SYSTEM_CANDIDATES`, same order, `None` if absent.
    pub base_system_candidates: &'a [Option<String>],
    pub tool_guide_system: Option<&'a str>,
    pub workspace_policy_system: Option<&'a str>,
    pub session_policy_system: Option<&'a str>,
    pub max_layer_chars: usize,
}

pub fn build(sources: &DefaultModeSources) -> Result<Vec<SystemLayer>> {
    let (idx, base_content) = sources
        .base_system_candidates
        .iter()
        .enumerate()
        .find_map(|(i, c)| c.as_deref().map(|c| (i, c)))
        .ok_or_else(|| Error::AiToolGuideUnavailable("no base_system candidate file found".into()))?;
    let base_source = BASE_SYSTEM_CANDIDATES.get(idx).copied().unwrap_or("base_system");

    let tool_guide = sources
        .tool_guide_system
        .ok_or_else(|| Error::AiToolGuideUnavailable("tool_guide_system missing".into()))?;
    let workspace_policy = sources
        .workspace_policy_system
        .ok_or_else(|| Error::AiToolGuideUnavailable("workspace_policy_system missing".into()))?;
    let session_policy = sources
        .session_policy_system
        .ok_or_else(|| Error::AiToolGuideUnavailable("session_policy_system missing".into()))?;

    Ok(vec![
        SystemLayer::new("base_system", base_source, truncation::cap(base_content, sources.max_layer_chars)),
        SystemLayer::new("tool_guide_system", "tool_guide_system", truncation::cap(tool_guide, sources.max_layer_chars)),
        SystemLayer::new(
            "workspace_policy_system",
            "workspace_policy_system",
            truncation::cap(workspace_policy, sources.max_layer_chars),
        ),
        SystemLayer::new(
            "session_policy_system",
            "session_policy_system",
            truncation::cap(session_policy, sources.max_layer_chars),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources<'a>(candidates: &'a [Option<String>]) -> DefaultModeSources<'a> {
        DefaultModeSources {
            base_system_candidates: candidates,
            tool_guide_system: Some("guide"),
            workspace_policy_system: Some("workspace policy"),
            session_policy_system: Some("session policy"),
            max_layer_chars: 10_000,
        }
    }

    #[test]
    fn uses_first_candidate_with_content() {
        let candidates = vec![None, Some("second candidate content".to_string())];
        let layers = build(&sources(&candidates)).unwrap();
        assert_eq!(layers[0].source, "docs/AI/ai-tools.md");
        assert_eq!(layers[0].content, "second candidate content");
        assert_eq!(layers.len(), 4);
    }

    #[test]
    fn missing_base_system_is_unavailable() {
        let candidates = vec![None, None];
        let err = build(&sources(&candidates)).unwrap_err();
        assert_eq!(err.code(), "ai_tool_guide_unavailable");
    }

    #[test]
    fn missing_tool_guide_is_unavailable() {
        let candidates = vec![Some("base".to_string())];
        let mut s = sources(&candidates);
        s.tool_guide_system = None;
        let err = build(&s).unwrap_err();
        assert_eq!(err.code(), "ai_tool_guide_unavailable");
    }
}
