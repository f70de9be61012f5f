//! Run tracking (spec §4.1 [AMBIENT]): an in-memory, bounded record of
//! recent agent turns for the `/agent/runs` introspection surface. Each
//! call to [`turn::process`] gets a `Run` correlated by `run_id` with the
//! `tracing::info_span!("turn", ...)` that wraps it; nodes are the turn's
//! own `TurnEvent` stream, so this doesn't duplicate step/tool bookkeeping
//! that already exists for the SSE path.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use sa_domain::chat::TurnEvent;

const MAX_RUNS_IN_MEMORY: usize = 500;
const PREVIEW_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub run_id: Uuid,
    pub session_key: String,
    pub session_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub nodes: Vec<TurnEvent>,
}

impl Run {
    fn new(run_id: Uuid, session_key: String, session_id: String, input_preview: Option<String>) -> Self {
        Self {
            run_id,
            session_key,
            session_id,
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            input_preview,
            output_preview: None,
            error: None,
            nodes: Vec::new(),
        }
    }
}

pub fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    format!("{}...", s.chars().take(max).collect::<String>())
}

struct RunStoreInner {
    runs: VecDeque<Run>,
    index: HashMap<Uuid, usize>,
    base_seq: usize,
}

impl RunStoreInner {
    fn new() -> Self {
        Self { runs: VecDeque::new(), index: HashMap::new(), base_seq: 0 }
    }

    fn deque_idx(&self, seq: usize) -> usize {
        seq - self.base_seq
    }

    fn get(&self, run_id: &Uuid) -> Option<&Run> {
        let seq = *self.index.get(run_id)?;
        self.runs.get(self.deque_idx(seq))
    }

    fn get_mut(&mut self, run_id: &Uuid) -> Option<&mut Run> {
        let seq = *self.index.get(run_id)?;
        self.runs.get_mut(self.deque_idx(seq))
    }

    fn push_back(&mut self, run: Run) {
        let seq = self.base_seq + self.runs.len();
        self.index.insert(run.run_id, seq);
        self.runs.push_back(run);
    }

    fn pop_front(&mut self) {
        if let Some(run) = self.runs.pop_front() {
            self.index.remove(&run.run_id);
            self.base_seq += 1;
        }
    }
}

pub struct RunStore {
    inner: RwLock<RunStoreInner>,
}

impl Default for RunStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStore {
    pub fn new() -> Self {
        Self { inner: RwLock::new(RunStoreInner::new()) }
    }

    pub fn start(&self, session_key: String, session_id: String, input_preview: Option<&str>) -> Uuid {
        let run_id = Uuid::new_v4();
        let run = Run::new(run_id, session_key, session_id, input_preview.map(|s| truncate_str(s, PREVIEW_LEN)));
        let mut inner = self.inner.write();
        inner.push_back(run);
        if inner.runs.len() > MAX_RUNS_IN_MEMORY {
            inner.pop_front();
        }
        run_id
    }

    pub fn finish(&self, run_id: &Uuid, status: RunStatus, output_preview: Option<String>, nodes: Vec<TurnEvent>, error: Option<String>) {
        let mut inner = self.inner.write();
        if let Some(run) = inner.get_mut(run_id) {
            run.status = status;
            run.ended_at = Some(Utc::now());
            run.duration_ms = Some((Utc::now() - run.started_at).num_milliseconds().max(0) as u64);
            run.output_preview = output_preview.map(|s| truncate_str(&s, PREVIEW_LEN));
            run.nodes = nodes;
            run.error = error;
        }
    }

    pub fn get(&self, run_id: &Uuid) -> Option<Run> {
        self.inner.read().get(run_id).cloned()
    }

    pub fn list(&self, session_key: Option<&str>, limit: usize, offset: usize) -> (Vec<Run>, usize) {
        let inner = self.inner.read();
        let filter = |r: &&Run| session_key.map_or(true, |sk| r.session_key == sk);
        let total = inner.runs.iter().rev().filter(filter).count();
        let page = inner.runs.iter().rev().filter(filter).skip(offset).take(limit).cloned().collect();
        (page, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_finish_lifecycle() {
        let store = RunStore::new();
        let run_id = store.start("sk".into(), "sid".into(), Some("hello"));
        let run = store.get(&run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.input_preview.as_deref(), Some("hello"));

        store.finish(&run_id, RunStatus::Completed, Some("world".into()), Vec::new(), None);
        let run = store.get(&run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.ended_at.is_some());
        assert_eq!(run.output_preview.as_deref(), Some("world"));
    }

    #[test]
    fn bounded_ring_evicts_oldest() {
        let store = RunStore::new();
        for i in 0..(MAX_RUNS_IN_MEMORY + 10) {
            store.start(format!("sk{i}"), "sid".into(), None);
        }
        let (_, total) = store.list(None, MAX_RUNS_IN_MEMORY + 100, 0);
        assert_eq!(total, MAX_RUNS_IN_MEMORY);
    }

    #[test]
    fn list_filters_by_session_key() {
        let store = RunStore::new();
        store.start("alpha".into(), "sid".into(), None);
        store.start("beta".into(), "sid".into(), None);
        store.start("alpha".into(), "sid".into(), None);

        let (hits, total) = store.list(Some("alpha"), 10, 0);
        assert_eq!(total, 2);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn truncate_str_is_char_safe() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 5), "hello...");
        assert_eq!(truncate_str("你好吗今天", 2), "你好...");
    }
}
