//! Final dedup pass for codex-mode layers (spec §4.4): removes paragraphs
//! duplicated across layers, giving priority codex core > local policy >
//! tool guide. Layers outside that priority set (orchestrator,
//! collaboration) are left untouched.

use std::collections::HashSet;

use sa_domain::chat::SystemLayer;

fn priority_tier(name: &str) -> Option<u8> {
    match name {
        "codex_base_system" | "codex_model_instructions_system" => Some(0),
        "local_policy_system" => Some(1),
        "tool_guide_system" => Some(2),
        _ => None,
    }
}

pub fn dedup_paragraphs(layers: &mut [SystemLayer]) {
    let mut indices: Vec<usize> = (0..layers.len()).filter(|&i| priority_tier(&layers[i].name).is_some()).collect();
    indices.sort_by_key(|&i| priority_tier(&layers[i].name).unwrap());

    let mut seen: HashSet<String> = HashSet::new();
    for &i in &indices {
        let paragraphs: Vec<&str> = layers[i].content.split("\n\n").collect();
        let mut kept = Vec::with_capacity(paragraphs.len());
        for p in paragraphs {
            let key = p.trim();
            if key.is_empty() || seen.insert(key.to_string()) {
                kept.push(p);
            }
        }
        layers[i].content = kept.join("\n\n");
    }

    for &i in &indices {
        let refreshed = SystemLayer::new(layers[i].name.clone(), layers[i].source.clone(), layers[i].content.clone());
        layers[i].layer_hash = refreshed.layer_hash;
        layers[i].estimated_tokens = refreshed.estimated_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_paragraph_duplicated_in_lower_priority_layer() {
        let mut layers = vec![
            SystemLayer::new("codex_base_system", "a", "shared para\n\nunique core".to_string()),
            SystemLayer::new("tool_guide_system", "b", "shared para\n\nunique guide".to_string()),
        ];
        dedup_paragraphs(&mut layers);
        assert!(layers[0].content.contains("shared para"));
        assert!(!layers[1].content.contains("shared para"));
        assert!(layers[1].content.contains("unique guide"));
    }

    #[test]
    fn leaves_non_priority_layers_untouched() {
        let mut layers = vec![
            SystemLayer::new("codex_base_system", "a", "shared para".to_string()),
            SystemLayer::new("orchestrator_system", "b", "shared para".to_string()),
        ];
        dedup_paragraphs(&mut layers);
        assert!(layers[1].content.contains("shared para"));
    }
}
