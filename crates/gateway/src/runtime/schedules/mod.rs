//! Cron Scheduler (spec §4.5): evaluator, lease admission control, the
//! tick loop, and the workflow DAG executor.

pub mod cron;
pub mod lease;
pub mod workflow;

pub use cron::{cron_matches, cron_next_tz, interval_next, parse_tz};
pub use lease::{lease_ttl_seconds, release, try_acquire_slot, Lease, LeaseGuard};
pub use workflow::{plan_linear_traversal, WorkflowPlanError};
