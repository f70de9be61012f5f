//! Cron Scheduler tick loop (spec §4.5 steps 1-6): a single process-wide
//! ticker that snapshots due jobs, attempts lease acquisition, and spawns
//! bounded execution tasks. None of this blocks the tick thread itself —
//! only snapshot, persist, and dispatch happen inline (spec §5).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use sa_domain::error::Result;
use sa_domain::trace::TraceEvent;
use sa_store::cron::{CronJob, CronRunStatus, CronSchedule, DispatchTarget, RuntimePolicy, TaskType};

use crate::runtime::schedules::workflow::{plan_linear_traversal, IfOp, NodeKind, WorkflowDag};
use crate::runtime::schedules::{cron_next_tz, interval_next, parse_tz, release, try_acquire_slot, LeaseGuard};
use crate::runtime::turn::{self, AgentProcessRequest, InputContentItem, InputMessage};
use crate::state::AppState;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub async fn run(state: AppState) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    loop {
        ticker.tick().await;
        if let Err(err) = tick(&state).await {
            tracing::warn!(error = %err, "cron tick failed");
        }
    }
}

struct DueJob {
    task_type: TaskType,
    text: Option<String>,
    workflow: Option<serde_json::Value>,
    dispatch: DispatchTarget,
    policy: RuntimePolicy,
}

async fn tick(state: &AppState) -> Result<()> {
    let now = Utc::now();

    let due: Vec<(String, DueJob)> = state
        .store
        .write_cron(|cron| {
            let mut due = Vec::new();
            for job in cron.jobs.values_mut() {
                if !job.enabled || job.state.paused {
                    continue;
                }

                let next = compute_next(job, now);
                job.state.next_run_at = Some(next);
                if next > now {
                    continue;
                }

                let lateness = (now - next).num_seconds();
                if lateness > job.policy.misfire_grace_seconds as i64 {
                    job.state.last_status = Some(CronRunStatus::Failed);
                    job.state.last_error = Some(format!("misfire skipped: due at {next}, now {now}"));
                    job.state.last_run_at = Some(now);
                    continue;
                }

                due.push((
                    job.id.clone(),
                    DueJob {
                        task_type: job.task_type,
                        text: job.text.clone(),
                        workflow: job.workflow.clone(),
                        dispatch: job.dispatch.clone(),
                        policy: job.policy.clone(),
                    },
                ));
            }
            due
        })
        .await?;

    let mut acquired = 0usize;
    let mut skipped = 0usize;
    let due_count = due.len();

    for (job_id, job) in due {
        let lease = try_acquire_slot(&state.config.workspace.data_dir, &job_id, &runner_owner(), job.policy.max_concurrency, job.policy.timeout_seconds)?;
        match lease {
            Some(lease) => {
                acquired += 1;
                TraceEvent::LeaseAcquired { job_id: job_id.clone(), slot: lease.lease().slot }.emit();
                let state = state.clone();
                tokio::spawn(async move { execute_job(state, job_id, job, lease).await });
            }
            None => skipped += 1,
        }
    }

    TraceEvent::CronTick { due_jobs: due_count, acquired, skipped }.emit();
    Ok(())
}

fn compute_next(job: &mut CronJob, now: DateTime<Utc>) -> DateTime<Utc> {
    match &job.schedule {
        CronSchedule::Interval { seconds } => interval_next(*seconds, job.state.next_run_at, job.state.last_run_at, now),
        CronSchedule::Cron { expression, timezone } => {
            let tz = parse_tz(timezone);
            let after = job.state.next_run_at.unwrap_or(now) - chrono::Duration::seconds(1);
            cron_next_tz(expression, &after, tz).unwrap_or(now + chrono::Duration::seconds(60))
        }
    }
}

fn runner_owner() -> String {
    format!("pid-{}", std::process::id())
}

/// Manual run (spec §6 `POST /cron/jobs/{id}/run`): acquires a slot exactly
/// like a ticked run, but runs in the caller's task rather than spawned, and
/// surfaces `CronBusy` instead of silently skipping when every slot is held.
pub async fn run_now(state: &AppState, job_id: &str) -> Result<()> {
    let job = state
        .store
        .read_cron(|cron| {
            cron.get(job_id).map(|j| DueJob {
                task_type: j.task_type,
                text: j.text.clone(),
                workflow: j.workflow.clone(),
                dispatch: j.dispatch.clone(),
                policy: j.policy.clone(),
            })
        })
        .await
        .ok_or_else(|| sa_domain::error::Error::NotFound(job_id.to_string()))?;

    let lease = try_acquire_slot(&state.config.workspace.data_dir, job_id, &runner_owner(), job.policy.max_concurrency, job.policy.timeout_seconds)?
        .ok_or_else(|| sa_domain::error::Error::CronBusy(job_id.to_string()))?;

    TraceEvent::LeaseAcquired { job_id: job_id.to_string(), slot: lease.lease().slot }.emit();
    execute_job(state.clone(), job_id.to_string(), job, lease).await;
    Ok(())
}

async fn execute_job(state: AppState, job_id: String, job: DueJob, lease: LeaseGuard) {
    let slot = lease.lease().slot;

    match job.task_type {
        TaskType::Text => {
            let result = dispatch_text(&state, &job.dispatch, job.text.as_deref().unwrap_or("")).await;
            finish_text_job(&state, &job_id, result).await;
        }
        TaskType::Workflow => {
            let trace = run_workflow(&state, &job_id, &job).await;
            finish_workflow_job(&state, &job_id, trace).await;
        }
    }

    release(lease);
    TraceEvent::LeaseReleased { job_id, slot }.emit();
}

async fn finish_text_job(state: &AppState, job_id: &str, result: Result<()>) {
    let now = Utc::now();
    let _ = state
        .store
        .write_cron(|cron| {
            if let Some(j) = cron.get_mut(job_id) {
                j.state.last_run_at = Some(now);
                match result {
                    Ok(()) => {
                        j.state.last_status = Some(CronRunStatus::Succeeded);
                        j.state.last_error = None;
                    }
                    Err(e) => {
                        j.state.last_status = Some(CronRunStatus::Failed);
                        j.state.last_error = Some(e.to_string());
                    }
                }
            }
        })
        .await;
}

async fn finish_workflow_job(state: &AppState, job_id: &str, trace: RunTrace) {
    let now = Utc::now();
    let had_failures = trace.had_failures;
    let serialized = serde_json::to_value(&trace).unwrap_or(serde_json::Value::Null);
    let _ = state
        .store
        .write_cron(|cron| {
            if let Some(j) = cron.get_mut(job_id) {
                j.state.last_run_at = Some(now);
                j.state.last_status = Some(if had_failures { CronRunStatus::Failed } else { CronRunStatus::Succeeded });
                j.state.last_error = None;
                j.state.last_execution = vec![serialized];
            }
        })
        .await;
}

/// Construct an `AgentProcessRequest` from `dispatch` and `text`, then
/// invoke the Turn Engine non-streaming (spec §4.5 "Execution of a text job").
async fn dispatch_text(state: &AppState, dispatch: &DispatchTarget, text: &str) -> Result<()> {
    let req = AgentProcessRequest {
        input: vec![InputMessage {
            role: "user".to_string(),
            msg_type: "message".to_string(),
            content: vec![InputContentItem::Text { text: text.to_string() }],
        }],
        session_id: dispatch.session_id.clone(),
        user_id: dispatch.user_id.clone(),
        channel: Some(dispatch.channel.clone()),
        stream: Some(false),
        biz_params: None,
    };
    turn::process(state, req, None).await.map(|_| ())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workflow execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
struct RunTrace {
    run_id: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    had_failures: bool,
    nodes: Vec<NodeTrace>,
}

#[derive(Debug, Clone, Serialize)]
struct NodeTrace {
    node_id: String,
    node_type: &'static str,
    status: &'static str,
    continue_on_error: bool,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

async fn run_workflow(state: &AppState, job_id: &str, job: &DueJob) -> RunTrace {
    let started_at = Utc::now();
    let run_id = uuid::Uuid::new_v4().to_string();
    let mut nodes = Vec::new();
    let mut had_failures = false;

    let dag: Option<WorkflowDag> = job.workflow.as_ref().and_then(|v| serde_json::from_value(v.clone()).ok());
    let Some(dag) = dag else {
        return RunTrace { run_id, started_at, finished_at: Some(Utc::now()), had_failures: true, nodes };
    };

    let plan = match plan_linear_traversal(&dag) {
        Ok(plan) => plan,
        Err(err) => {
            return RunTrace {
                run_id,
                started_at,
                finished_at: Some(Utc::now()),
                had_failures: true,
                nodes: vec![NodeTrace {
                    node_id: "start".to_string(),
                    node_type: "start",
                    status: "failed",
                    continue_on_error: false,
                    started_at,
                    finished_at: Some(Utc::now()),
                    error: Some(err.to_string()),
                }],
            };
        }
    };

    for node_id in plan {
        let Some(node) = dag.nodes.get(&node_id) else { continue };
        let node_started = Utc::now();

        let outcome = match node {
            NodeKind::Start => Ok(true),
            NodeKind::TextEvent { text } => dispatch_text(state, &job.dispatch, text).await.map(|()| true).map_err(|e| e.to_string()),
            NodeKind::Delay { delay_seconds } => {
                tokio::time::sleep(Duration::from_secs(*delay_seconds)).await;
                Ok(true)
            }
            NodeKind::IfEvent { field, op, literal } => Ok(evaluate_if_event(job_id, &job.dispatch, field, *op, literal)),
        };

        let node_type = match node {
            NodeKind::Start => "start",
            NodeKind::TextEvent { .. } => "text_event",
            NodeKind::Delay { .. } => "delay",
            NodeKind::IfEvent { .. } => "if_event",
        };

        match outcome {
            Ok(true) => {
                nodes.push(NodeTrace {
                    node_id,
                    node_type,
                    status: "succeeded",
                    continue_on_error: false,
                    started_at: node_started,
                    finished_at: Some(Utc::now()),
                    error: None,
                });
            }
            Ok(false) => {
                nodes.push(NodeTrace {
                    node_id,
                    node_type,
                    status: "skipped",
                    continue_on_error: false,
                    started_at: node_started,
                    finished_at: Some(Utc::now()),
                    error: None,
                });
                break;
            }
            Err(error) => {
                had_failures = true;
                nodes.push(NodeTrace {
                    node_id,
                    node_type,
                    status: "failed",
                    continue_on_error: false,
                    started_at: node_started,
                    finished_at: Some(Utc::now()),
                    error: Some(error),
                });
                break;
            }
        }
    }

    RunTrace { run_id, started_at, finished_at: Some(Utc::now()), had_failures, nodes }
}

/// `if_event`'s restricted equality expression over the job/dispatch
/// context. `job_name` has no dedicated field on `CronJob`; the job id
/// stands in for it.
fn evaluate_if_event(job_id: &str, dispatch: &DispatchTarget, field: &str, op: IfOp, literal: &str) -> bool {
    let actual = match field {
        "job_id" => job_id,
        "job_name" => job_id,
        "channel" => dispatch.channel.as_str(),
        "user_id" => dispatch.user_id.as_str(),
        "session_id" => dispatch.session_id.as_str(),
        "task_type" => "workflow",
        _ => return false,
    };
    match op {
        IfOp::Eq => actual == literal,
        IfOp::Ne => actual != literal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_event_eq_matches_channel() {
        let dispatch = DispatchTarget { channel: "console".to_string(), user_id: "u1".to_string(), session_id: "s1".to_string() };
        assert!(evaluate_if_event("job-1", &dispatch, "channel", IfOp::Eq, "console"));
        assert!(!evaluate_if_event("job-1", &dispatch, "channel", IfOp::Eq, "qq"));
        assert!(evaluate_if_event("job-1", &dispatch, "channel", IfOp::Ne, "qq"));
    }

    #[test]
    fn if_event_unknown_field_never_matches() {
        let dispatch = DispatchTarget { channel: "console".to_string(), user_id: "u1".to_string(), session_id: "s1".to_string() };
        assert!(!evaluate_if_event("job-1", &dispatch, "bogus", IfOp::Eq, "anything"));
    }
}
