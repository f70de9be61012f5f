//! Machine-readable assembly report, the shape `GET /agent/system-layers`
//! returns (spec §6): `{version, mode_variant, layers:[...], estimated_tokens_total}`.

use serde::Serialize;

use sa_domain::chat::SystemLayer;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct LayerPreview {
    pub name: String,
    pub role: &'static str,
    pub source: String,
    pub content_preview: String,
    pub layer_hash: String,
    pub estimated_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub version: String,
    pub mode_variant: String,
    pub layers: Vec<LayerPreview>,
    pub estimated_tokens_total: u32,
}

pub fn build_report(version: &str, mode_variant: &str, layers: &[SystemLayer]) -> AssemblyReport {
    let previews = layers
        .iter()
        .map(|l| LayerPreview {
            name: l.name.clone(),
            role: l.role,
            source: l.source.clone(),
            content_preview: preview(&l.content),
            layer_hash: l.layer_hash.clone(),
            estimated_tokens: l.estimated_tokens,
        })
        .collect();
    let total = layers.iter().map(|l| l.estimated_tokens).sum();
    AssemblyReport {
        version: version.to_string(),
        mode_variant: mode_variant.to_string(),
        layers: previews,
        estimated_tokens_total: total,
    }
}

fn preview(content: &str) -> String {
    if content.len() <= PREVIEW_CHARS {
        content.to_string()
    } else {
        let boundary = content.floor_char_boundary(PREVIEW_CHARS);
        format!("{}…", &content[..boundary])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_estimated_tokens_across_layers() {
        let layers = vec![
            SystemLayer::new("a", "a", "hello world".to_string()),
            SystemLayer::new("b", "b", "one two three".to_string()),
        ];
        let report = build_report("1.0", "default", &layers);
        assert_eq!(report.estimated_tokens_total, 2 + 3);
        assert_eq!(report.layers.len(), 2);
    }

    #[test]
    fn truncates_long_preview() {
        let long = "x".repeat(500);
        let layers = vec![SystemLayer::new("a", "a", long)];
        let report = build_report("1.0", "default", &layers);
        assert!(report.layers[0].content_preview.ends_with('…'));
        assert!(report.layers[0].content_preview.len() < 500);
    }
}
