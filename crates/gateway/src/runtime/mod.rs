//! Runtime: the Turn Engine, System-Prompt Assembler sources, Channel
//! Dispatch, per-session locking, and the Cron Scheduler.

pub mod channel;
pub mod prompt_sources;
pub mod runs;
pub mod schedule_runner;
pub mod schedules;
pub mod session_lock;
pub mod turn;

pub use turn::{process, AgentProcessRequest, ProcessOutcome};
