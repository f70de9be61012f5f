//! `claude` prompt mode (spec §4.4): four required layers (identity,
//! workflow, reminder-start, reminder-end) plus an optional NextAI tool
//! adapter layer that sits between the reminders.

use sa_domain::chat::SystemLayer;
use sa_domain::error::{Error, Result};

use crate::truncation;

pub struct ClaudeModeSources<'a> {
    pub identity: Option<&'a str>,
    pub workflow: Option<&'a str>,
    pub reminder_start: Option<&'a str>,
    pub reminder_end: Option<&'a str>,
    pub tool_adapter: Option<&'a str>,
    pub max_layer_chars: usize,
}

pub fn build(sources: &ClaudeModeSources) -> Result<Vec<SystemLayer>> {
    let identity = sources.identity.ok_or_else(|| Error::ClaudePromptUnavailable("identity layer missing".into()))?;
    let workflow = sources.workflow.ok_or_else(|| Error::ClaudePromptUnavailable("workflow layer missing".into()))?;
    let reminder_start = sources
        .reminder_start
        .ok_or_else(|| Error::ClaudePromptUnavailable("reminder_start layer missing".into()))?;
    let reminder_end = sources
        .reminder_end
        .ok_or_else(|| Error::ClaudePromptUnavailable("reminder_end layer missing".into()))?;

    let mut layers = vec![
        SystemLayer::new("identity", "identity", truncation::cap(identity, sources.max_layer_chars)),
        SystemLayer::new("workflow", "workflow", truncation::cap(workflow, sources.max_layer_chars)),
        SystemLayer::new("reminder_start", "reminder_start", truncation::cap(reminder_start, sources.max_layer_chars)),
    ];

    if let Some(adapter) = sources.tool_adapter {
        layers.push(SystemLayer::new(
            "nextai_tool_adapter",
            "nextai_tool_adapter",
            truncation::cap(adapter, sources.max_layer_chars),
        ));
    }

    layers.push(SystemLayer::new("reminder_end", "reminder_end", truncation::cap(reminder_end, sources.max_layer_chars)));

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(tool_adapter: Option<&str>) -> ClaudeModeSources<'_> {
        ClaudeModeSources {
            identity: Some("identity"),
            workflow: Some("workflow"),
            reminder_start: Some("start"),
            reminder_end: Some("end"),
            tool_adapter,
            max_layer_chars: 10_000,
        }
    }

    #[test]
    fn omits_tool_adapter_when_absent() {
        let layers = build(&sources(None)).unwrap();
        assert_eq!(layers.len(), 4);
        assert_eq!(layers.last().unwrap().name, "reminder_end");
    }

    #[test]
    fn places_tool_adapter_between_reminders() {
        let layers = build(&sources(Some("adapter"))).unwrap();
        assert_eq!(layers.len(), 5);
        assert_eq!(layers[3].name, "nextai_tool_adapter");
        assert_eq!(layers[4].name, "reminder_end");
    }

    #[test]
    fn missing_required_layer_is_unavailable() {
        let mut s = sources(None);
        s.identity = None;
        let err = build(&s).unwrap_err();
        assert_eq!(err.code(), "claude_prompt_unavailable");
    }
}
