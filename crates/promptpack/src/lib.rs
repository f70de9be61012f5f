//! System-Prompt Assembler (spec §4.4): produces an ordered list of
//! `SystemLayer`s per prompt mode (`default`/`codex`/`claude`). Pure over
//! pre-read file contents — callers (the Turn Engine's HTTP layer) own
//! resolving candidate paths and reading them from disk.

pub mod claude_mode;
pub mod codex;
pub mod default_mode;
pub mod report;
pub mod shadow;
pub mod truncation;

pub use claude_mode::ClaudeModeSources;
pub use codex::{catalog, dedup, template, CodexBuildOutcome, CodexModeSources, PromptSourceMode};
pub use default_mode::DefaultModeSources;
pub use report::{build_report, AssemblyReport, LayerPreview};

use sa_domain::chat::SystemLayer;
use sa_domain::error::Result;

/// Pre-read sources for whichever mode is being assembled this turn.
pub enum AssembleSources<'a> {
    Default(DefaultModeSources<'a>),
    Codex(CodexModeSources<'a>),
    Claude(ClaudeModeSources<'a>),
}

/// Build the ordered layer list for one turn, plus an optional fallback
/// reason code (codex-mode personality/template fallback only).
pub fn assemble(sources: AssembleSources<'_>) -> Result<(Vec<SystemLayer>, Option<String>)> {
    match sources {
        AssembleSources::Default(s) => Ok((default_mode::build(&s)?, None)),
        AssembleSources::Codex(s) => {
            let outcome = codex::build(&s)?;
            Ok((outcome.layers, outcome.fallback_reason))
        }
        AssembleSources::Claude(s) => Ok((claude_mode::build(&s)?, None)),
    }
}
