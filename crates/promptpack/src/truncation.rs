//! Per-layer and total content capping, grounded on the teacher's
//! context-pack per-file truncation (`contextpack/src/truncation.rs`),
//! generalized from "workspace files" to "system layers".

use sa_domain::chat::SystemLayer;

/// Truncate `content` to at most `max_chars` (at a UTF-8 boundary),
/// appending a `[TRUNCATED]` marker when it does.
pub fn cap(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        return content.to_string();
    }
    let boundary = content.floor_char_boundary(max_chars);
    let mut result = content[..boundary].to_string();
    result.push_str("\n\n[TRUNCATED]\n");
    result
}

/// Apply a total character budget across already-built layers, in order.
/// Layers past the budget are dropped entirely rather than emitted empty.
pub fn apply_total_cap(layers: &mut Vec<SystemLayer>, total_max_chars: usize) {
    let mut accumulated = 0usize;
    let mut kept = Vec::with_capacity(layers.len());

    for mut layer in layers.drain(..) {
        let len = layer.content.len();
        if accumulated + len <= total_max_chars {
            accumulated += len;
            kept.push(layer);
        } else if accumulated < total_max_chars {
            let remaining = total_max_chars - accumulated;
            let boundary = layer.content.floor_char_boundary(remaining);
            layer.content = format!("{}\n\n[TRUNCATED_TOTAL_CAP]\n", &layer.content[..boundary]);
            let refreshed = SystemLayer::new(layer.name.clone(), layer.source.clone(), layer.content.clone());
            layer.layer_hash = refreshed.layer_hash;
            layer.estimated_tokens = refreshed.estimated_tokens;
            accumulated = total_max_chars;
            kept.push(layer);
        }
        // else: budget already exhausted, layer dropped.
    }

    *layers = kept;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_truncation_when_under_limit() {
        assert_eq!(cap("hello world", 100), "hello world");
    }

    #[test]
    fn truncates_at_limit() {
        let result = cap("abcdefghij", 5);
        assert!(result.starts_with("abcde"));
        assert!(result.contains("[TRUNCATED]"));
    }

    #[test]
    fn total_cap_drops_layers_past_budget() {
        let mut layers = vec![
            SystemLayer::new("a", "a", "aaaa".to_string()),
            SystemLayer::new("b", "b", "bbbbbb".to_string()),
            SystemLayer::new("c", "c", "cccc".to_string()),
        ];
        apply_total_cap(&mut layers, 8);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].content, "aaaa");
        assert!(layers[1].content.contains("[TRUNCATED_TOTAL_CAP]"));
    }
}
