//! Cron aggregate (spec §3): Cron Jobs plus their Cron State. `cron-default`
//! is seeded on first load and can never be removed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sa_domain::error::{Error, Result};

pub const DEFAULT_CRON_JOB_ID: &str = "cron-default";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronAggregate {
    #[serde(default)]
    pub jobs: HashMap<String, CronJob>,
}

impl CronAggregate {
    /// Ensure `cron-default` exists; called once after load.
    pub fn ensure_default_job(&mut self) {
        self.jobs.entry(DEFAULT_CRON_JOB_ID.to_string()).or_insert_with(|| CronJob {
            id: DEFAULT_CRON_JOB_ID.to_string(),
            enabled: false,
            schedule: CronSchedule::Interval { seconds: 86_400 },
            task_type: TaskType::Text,
            text: None,
            workflow: None,
            dispatch: DispatchTarget {
                channel: "console".to_string(),
                user_id: String::new(),
                session_id: String::new(),
            },
            policy: RuntimePolicy {
                max_concurrency: 1,
                timeout_seconds: 300,
                misfire_grace_seconds: 60,
            },
            state: CronState::default(),
        });
    }

    pub fn get(&self, id: &str) -> Option<&CronJob> {
        self.jobs.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CronJob> {
        self.jobs.get_mut(id)
    }

    pub fn insert(&mut self, job: CronJob) {
        self.jobs.insert(job.id.clone(), job);
    }

    /// Delete a job by id. Refuses to remove `cron-default`.
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        if id == DEFAULT_CRON_JOB_ID {
            return Err(Error::DefaultCronProtected);
        }
        Ok(self.jobs.remove(id).is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub id: String,
    pub enabled: bool,
    pub schedule: CronSchedule,
    pub task_type: TaskType,
    /// The message text for a `TaskType::Text` job.
    #[serde(default)]
    pub text: Option<String>,
    /// Workflow DAG (spec §3); opaque at the store layer — the Cron
    /// Scheduler owns traversal semantics.
    #[serde(default)]
    pub workflow: Option<serde_json::Value>,
    pub dispatch: DispatchTarget,
    pub policy: RuntimePolicy,
    #[serde(default)]
    pub state: CronState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CronSchedule {
    Interval { seconds: u64 },
    Cron { expression: String, timezone: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Text,
    Workflow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchTarget {
    pub channel: String,
    pub user_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimePolicy {
    pub max_concurrency: u32,
    pub timeout_seconds: u64,
    pub misfire_grace_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronState {
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_status: Option<CronRunStatus>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub paused: bool,
    /// Per-node trace of the most recent execution; opaque at the store
    /// layer (the Cron Scheduler/Workflow runner own its shape).
    #[serde(default)]
    pub last_execution: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CronRunStatus {
    Running,
    Succeeded,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_default_job_is_idempotent() {
        let mut agg = CronAggregate::default();
        agg.ensure_default_job();
        agg.get_mut(DEFAULT_CRON_JOB_ID).unwrap().enabled = true;
        agg.ensure_default_job();
        assert!(agg.get(DEFAULT_CRON_JOB_ID).unwrap().enabled);
    }

    #[test]
    fn delete_refuses_default_job() {
        let mut agg = CronAggregate::default();
        agg.ensure_default_job();
        assert!(matches!(agg.delete(DEFAULT_CRON_JOB_ID), Err(Error::DefaultCronProtected)));
    }
}
