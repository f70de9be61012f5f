//! Prompt-mode and codex collaboration-mode enums shared between the
//! System-Prompt Assembler (§4.4) and the Turn Engine (§4.1).

use serde::{Deserialize, Serialize};

/// Which family of system layers the assembler builds for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    Default,
    Codex,
    Claude,
}

impl PromptMode {
    /// Parse a `biz_params.prompt_mode`/`chat.meta.prompt_mode` value.
    /// Returns `None` for anything but the three legal values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "codex" => Some(Self::Codex),
            "claude" => Some(Self::Claude),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Codex => "codex",
            Self::Claude => "claude",
        }
    }
}

/// Codex-only collaboration state (spec §4.1 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationMode {
    Default,
    Plan,
    Execute,
    PairProgramming,
}

impl CollaborationMode {
    /// Parse a `biz_params.collaboration_mode`/`chat.meta.collaboration_mode`
    /// value given directly as a mode name (as opposed to an event name via
    /// `CollaborationEvent::parse`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "plan" => Some(Self::Plan),
            "execute" => Some(Self::Execute),
            "pair_programming" => Some(Self::PairProgramming),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Plan => "plan",
            Self::Execute => "execute",
            Self::PairProgramming => "pair_programming",
        }
    }
}

/// An event that transitions `CollaborationMode`. Any state may transition
/// to any other state via the matching event — there is no state machine
/// beyond "the event names its target state".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaborationEvent {
    SetDefault,
    SetPlan,
    SetExecute,
    SetPairProgramming,
}

impl CollaborationEvent {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "set_default" => Some(Self::SetDefault),
            "set_plan" => Some(Self::SetPlan),
            "set_execute" => Some(Self::SetExecute),
            "set_pair_programming" => Some(Self::SetPairProgramming),
            _ => None,
        }
    }

    pub fn target(&self) -> CollaborationMode {
        match self {
            Self::SetDefault => CollaborationMode::Default,
            Self::SetPlan => CollaborationMode::Plan,
            Self::SetExecute => CollaborationMode::Execute,
            Self::SetPairProgramming => CollaborationMode::PairProgramming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mode_rejects_unknown_value() {
        assert!(PromptMode::parse("bogus").is_none());
        assert_eq!(PromptMode::parse("codex"), Some(PromptMode::Codex));
    }

    #[test]
    fn collaboration_event_targets_matching_mode() {
        assert_eq!(CollaborationEvent::SetPlan.target(), CollaborationMode::Plan);
        assert_eq!(CollaborationEvent::parse("set_pair_programming").unwrap().target(), CollaborationMode::PairProgramming);
    }

    #[test]
    fn collaboration_mode_parses_direct_name() {
        assert_eq!(CollaborationMode::parse("pair_programming"), Some(CollaborationMode::PairProgramming));
        assert!(CollaborationMode::parse("bogus").is_none());
    }
}
