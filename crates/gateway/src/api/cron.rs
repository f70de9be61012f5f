//! Cron job CRUD and control (spec §4.5, §6). `cron-default` can never be
//! deleted; a manual `/run` on a job already at `max_concurrency` surfaces
//! `cron_busy` (409) rather than silently no-op'ing.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use sa_domain::error::Error;
use sa_store::cron::{CronJob, CronSchedule, DispatchTarget, RuntimePolicy, TaskType};

use crate::api::error::ApiError;
use crate::runtime::schedule_runner;
use crate::state::AppState;

pub async fn list_jobs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let mut jobs: Vec<CronJob> = state.store.read_cron(|c| c.jobs.values().cloned().collect()).await;
    jobs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Json(serde_json::json!({"jobs": jobs})))
}

#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    pub schedule: CronSchedule,
    pub task_type: TaskType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub workflow: Option<serde_json::Value>,
    pub dispatch: DispatchTarget,
    pub policy: RuntimePolicy,
}

pub async fn create_job(State(state): State<AppState>, Json(body): Json<CreateJobBody>) -> Result<impl IntoResponse, ApiError> {
    if body.task_type == TaskType::Workflow {
        let Some(workflow) = &body.workflow else {
            return Err(Error::InvalidCronWorkflow("workflow job requires a workflow field".into()).into());
        };
        let dag: crate::runtime::schedules::workflow::WorkflowDag =
            serde_json::from_value(workflow.clone()).map_err(|e| Error::InvalidCronWorkflow(e.to_string()))?;
        dag.validate().map_err(|e| Error::InvalidCronWorkflow(e.to_string()))?;
    }

    let id = body.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let job = CronJob {
        id: id.clone(),
        enabled: body.enabled,
        schedule: body.schedule,
        task_type: body.task_type,
        text: body.text,
        workflow: body.workflow,
        dispatch: body.dispatch,
        policy: body.policy,
        state: Default::default(),
    };
    state.store.write_cron(|c| c.insert(job)).await?;
    Ok(Json(serde_json::json!({"id": id})))
}

pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let job = state.store.read_cron(|c| c.get(&id).cloned()).await.ok_or_else(|| Error::NotFound(id.clone()))?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobBody {
    pub id: String,
    pub enabled: bool,
    pub schedule: CronSchedule,
    pub task_type: TaskType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub workflow: Option<serde_json::Value>,
    pub dispatch: DispatchTarget,
    pub policy: RuntimePolicy,
}

pub async fn update_job(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<UpdateJobBody>) -> Result<impl IntoResponse, ApiError> {
    if body.id != id {
        return Err(Error::JobIdMismatch.into());
    }
    if body.task_type == TaskType::Workflow {
        let Some(workflow) = &body.workflow else {
            return Err(Error::InvalidCronWorkflow("workflow job requires a workflow field".into()).into());
        };
        let dag: crate::runtime::schedules::workflow::WorkflowDag =
            serde_json::from_value(workflow.clone()).map_err(|e| Error::InvalidCronWorkflow(e.to_string()))?;
        dag.validate().map_err(|e| Error::InvalidCronWorkflow(e.to_string()))?;
    }

    state
        .store
        .write_cron(|c| {
            if let Some(job) = c.get_mut(&id) {
                job.enabled = body.enabled;
                job.schedule = body.schedule.clone();
                job.task_type = body.task_type;
                job.text = body.text.clone();
                job.workflow = body.workflow.clone();
                job.dispatch = body.dispatch.clone();
                job.policy = body.policy.clone();
            }
        })
        .await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn delete_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    state.store.write_cron(|c| c.delete(&id)).await??;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn pause_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    set_paused(&state, &id, true).await
}

pub async fn resume_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    set_paused(&state, &id, false).await
}

async fn set_paused(state: &AppState, id: &str, paused: bool) -> Result<impl IntoResponse, ApiError> {
    let found = state
        .store
        .write_cron(|c| {
            c.get_mut(id).map(|job| {
                job.state.paused = paused;
            })
        })
        .await?
        .is_some();
    if !found {
        return Err(Error::NotFound(id.to_string()).into());
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn run_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    schedule_runner::run_now(&state, &id).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn job_state(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let state_snapshot = state.store.read_cron(|c| c.get(&id).map(|j| j.state.clone())).await.ok_or_else(|| Error::NotFound(id.clone()))?;
    Ok(Json(state_snapshot))
}
