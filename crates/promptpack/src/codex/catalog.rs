//! Catalog-mode model-slug resolution and personality normalization
//! (spec §4.4, `prompt_source=catalog`).

use serde_json::Value;

pub const DEFAULT_MODEL_SLUG: &str = "gpt-5.2-codex";
pub const DEFAULT_PERSONALITY: &str = "pragmatic";

/// Personalities the catalog may legally name. Unknown values downgrade
/// to `DEFAULT_PERSONALITY`, marked.
const KNOWN_PERSONALITIES: &[&str] = &["pragmatic", "concise", "collaborative"];

pub struct CatalogEntry {
    pub template: String,
    pub personality: String,
    /// True if the catalog's own personality value was invalid and had
    /// to be downgraded to `DEFAULT_PERSONALITY`.
    pub personality_downgraded: bool,
}

/// Resolve `model_slug` against `catalog` (a JSON object keyed by slug),
/// falling back to `DEFAULT_MODEL_SLUG` when the slug is absent or not a
/// catalog key. Returns the slug actually used plus its entry.
pub fn resolve(catalog: &Value, model_slug: Option<&str>) -> (String, CatalogEntry) {
    let slug = model_slug
        .filter(|s| catalog.get(*s).is_some())
        .unwrap_or(DEFAULT_MODEL_SLUG)
        .to_string();

    let entry = catalog.get(&slug).cloned().unwrap_or(Value::Null);
    let template = entry.get("template").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let raw_personality = entry.get("personality").and_then(|v| v.as_str());

    let (personality, downgraded) = normalize_personality(raw_personality);

    (
        slug,
        CatalogEntry {
            template,
            personality,
            personality_downgraded: downgraded,
        },
    )
}

/// Normalize a requested personality against the known set. Returns
/// `(personality, downgraded)` — `downgraded` is true only when a
/// non-empty, unrecognized personality was supplied.
pub fn normalize_personality(personality: Option<&str>) -> (String, bool) {
    match personality {
        Some(p) if KNOWN_PERSONALITIES.contains(&p) => (p.to_string(), false),
        Some(_) => (DEFAULT_PERSONALITY.to_string(), true),
        None => (DEFAULT_PERSONALITY.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_slug_when_absent() {
        let catalog = serde_json::json!({"gpt-5.2-codex": {"template": "t", "personality": "concise"}});
        let (slug, entry) = resolve(&catalog, Some("missing-slug"));
        assert_eq!(slug, DEFAULT_MODEL_SLUG);
        assert_eq!(entry.personality, "concise");
    }

    #[test]
    fn invalid_personality_downgrades_to_pragmatic() {
        let catalog = serde_json::json!({"m": {"template": "t", "personality": "mysterious"}});
        let (_, entry) = resolve(&catalog, Some("m"));
        assert_eq!(entry.personality, DEFAULT_PERSONALITY);
        assert!(entry.personality_downgraded);
    }

    #[test]
    fn missing_personality_defaults_without_downgrade_flag() {
        let catalog = serde_json::json!({"m": {"template": "t"}});
        let (_, entry) = resolve(&catalog, Some("m"));
        assert_eq!(entry.personality, DEFAULT_PERSONALITY);
        assert!(!entry.personality_downgraded);
    }
}
