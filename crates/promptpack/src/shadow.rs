//! Shadow-compare mode (spec §4.4): when `NEXTAI_CODEX_PROMPT_SHADOW_COMPARE`
//! is enabled, the assembler builds both the resolved (file-mode) and the
//! catalog-derived layer and logs a normalized-content diff. Never alters
//! the response — this is an observability-only comparison.

use sa_domain::chat::SystemLayer;

pub fn log_diff(resolved: &SystemLayer, alternative: &SystemLayer) {
    if resolved.layer_hash == alternative.layer_hash {
        tracing::debug!(layer = %resolved.name, "shadow-compare: catalog result matches file result");
        return;
    }
    tracing::warn!(
        layer = %resolved.name,
        resolved_hash = %resolved.layer_hash,
        catalog_hash = %alternative.layer_hash,
        "shadow-compare: catalog result diverges from file result"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_does_not_panic() {
        let a = SystemLayer::new("codex_model_instructions_system", "file", "same".to_string());
        let b = SystemLayer::new("codex_model_instructions_system", "catalog", "same".to_string());
        log_diff(&a, &b);
    }
}
