//! Workflow DAG model and linear-traversal planner (spec §3, §4.5).
//!
//! A workflow is validated once at save time (exactly one `start`, acyclic,
//! every node reachable) and re-planned at execution time by following the
//! *first* outgoing edge of each node in saved order — additional edges are
//! kept for visibility but never branched (spec §9 open question: fan-out
//! semantics are undefined in the source and deferred).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDag {
    pub nodes: HashMap<String, NodeKind>,
    pub edges: Vec<WorkflowEdge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    TextEvent { text: String },
    Delay { delay_seconds: u64 },
    IfEvent { field: String, op: IfOp, literal: String },
}

impl NodeKind {
    fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::TextEvent { .. } => "text_event",
            NodeKind::Delay { .. } => "delay",
            NodeKind::IfEvent { .. } => "if_event",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IfOp {
    Eq,
    Ne,
}

/// Fields `if_event` may compare against (spec §4.5: a restricted equality
/// expression over the job/dispatch context).
pub const IF_EVENT_FIELDS: &[&str] = &["job_id", "job_name", "channel", "user_id", "session_id", "task_type"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowPlanError {
    #[error("workflow must contain exactly one start node, found {0}")]
    NotExactlyOneStart(usize),
    #[error("workflow contains a cycle")]
    Cyclic,
    #[error("node {0} is unreachable from start")]
    Unreachable(String),
    #[error("if_event field {0:?} is not one of the known fields")]
    UnsupportedIfEventField(String),
    #[error("edge references unknown node {0:?}")]
    DanglingEdge(String),
}

fn find_start(dag: &WorkflowDag) -> Result<String, WorkflowPlanError> {
    let starts: Vec<&String> = dag
        .nodes
        .iter()
        .filter(|(_, k)| matches!(k, NodeKind::Start))
        .map(|(id, _)| id)
        .collect();
    if starts.len() != 1 {
        return Err(WorkflowPlanError::NotExactlyOneStart(starts.len()));
    }
    Ok(starts[0].clone())
}

/// Validate the DAG's static invariants (spec §3): exactly one `start`,
/// acyclic, every non-start node reachable from `start`. Rejected at save
/// time, not at execution time.
pub fn validate(dag: &WorkflowDag) -> Result<(), WorkflowPlanError> {
    let start = find_start(dag)?;

    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &dag.edges {
        if !dag.nodes.contains_key(&edge.from) {
            return Err(WorkflowPlanError::DanglingEdge(edge.from.clone()));
        }
        if !dag.nodes.contains_key(&edge.to) {
            return Err(WorkflowPlanError::DanglingEdge(edge.to.clone()));
        }
        adj.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
    }

    for node in dag.nodes.values() {
        if let NodeKind::IfEvent { field, .. } = node {
            if !IF_EVENT_FIELDS.contains(&field.as_str()) {
                return Err(WorkflowPlanError::UnsupportedIfEventField(field.clone()));
            }
        }
    }

    if has_cycle(&adj, &start) {
        return Err(WorkflowPlanError::Cyclic);
    }

    let reachable = reachable_from(&adj, &start);
    for id in dag.nodes.keys() {
        if id != &start && !reachable.contains(id.as_str()) {
            return Err(WorkflowPlanError::Unreachable(id.clone()));
        }
    }

    Ok(())
}

fn has_cycle(adj: &HashMap<&str, Vec<&str>>, start: &str) -> bool {
    #[derive(PartialEq)]
    enum State {
        Visiting,
        Done,
    }
    fn dfs<'a>(node: &'a str, adj: &HashMap<&'a str, Vec<&'a str>>, state: &mut HashMap<&'a str, State>) -> bool {
        match state.get(node) {
            Some(State::Visiting) => return true,
            Some(State::Done) => return false,
            None => {}
        }
        state.insert(node, State::Visiting);
        if let Some(children) = adj.get(node) {
            for &child in children {
                if dfs(child, adj, state) {
                    return true;
                }
            }
        }
        state.insert(node, State::Done);
        false
    }
    let mut state = HashMap::new();
    dfs(start, adj, &mut state)
}

fn reachable_from<'a>(adj: &HashMap<&'a str, Vec<&'a str>>, start: &'a str) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        if let Some(children) = adj.get(node) {
            for &child in children {
                stack.push(child);
            }
        }
    }
    seen
}

/// Build the deterministic linear execution plan: from `start`, repeatedly
/// follow each node's first outgoing edge (in saved order) until a node has
/// none. `start` itself is excluded from the returned plan — it carries no
/// handler.
pub fn plan_linear_traversal(dag: &WorkflowDag) -> Result<Vec<String>, WorkflowPlanError> {
    validate(dag)?;
    let start = find_start(dag)?;

    let mut plan = Vec::new();
    let mut current = start;
    let mut visited = HashSet::new();
    loop {
        let next = dag.edges.iter().find(|e| e.from == current).map(|e| e.to.clone());
        match next {
            Some(next_id) if visited.insert(next_id.clone()) => {
                plan.push(next_id.clone());
                current = next_id;
            }
            _ => break,
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dag_from(nodes: &[(&str, NodeKind)], edges: &[(&str, &str)]) -> WorkflowDag {
        WorkflowDag {
            nodes: nodes.iter().map(|(id, k)| (id.to_string(), k.clone())).collect(),
            edges: edges.iter().map(|(f, t)| WorkflowEdge { from: f.to_string(), to: t.to_string() }).collect(),
        }
    }

    #[test]
    fn linear_plan_follows_first_edge_per_node() {
        let dag = dag_from(
            &[
                ("start", NodeKind::Start),
                ("a", NodeKind::TextEvent { text: "hi".into() }),
                ("b", NodeKind::Delay { delay_seconds: 5 }),
            ],
            &[("start", "a"), ("a", "b")],
        );
        let plan = plan_linear_traversal(&dag).unwrap();
        assert_eq!(plan, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn rejects_cycle() {
        let dag = dag_from(
            &[("start", NodeKind::Start), ("a", NodeKind::TextEvent { text: "x".into() }), ("b", NodeKind::TextEvent { text: "y".into() })],
            &[("start", "a"), ("a", "b"), ("b", "a")],
        );
        assert!(matches!(validate(&dag), Err(WorkflowPlanError::Cyclic)));
    }

    #[test]
    fn rejects_more_than_one_start() {
        let dag = dag_from(&[("s1", NodeKind::Start), ("s2", NodeKind::Start)], &[]);
        assert!(matches!(validate(&dag), Err(WorkflowPlanError::NotExactlyOneStart(2))));
    }

    #[test]
    fn rejects_unreachable_node() {
        let dag = dag_from(
            &[("start", NodeKind::Start), ("a", NodeKind::TextEvent { text: "x".into() }), ("orphan", NodeKind::TextEvent { text: "y".into() })],
            &[("start", "a")],
        );
        assert!(matches!(validate(&dag), Err(WorkflowPlanError::Unreachable(ref id)) if id == "orphan"));
    }

    #[test]
    fn rejects_unknown_if_event_field() {
        let dag = dag_from(
            &[("start", NodeKind::Start), ("cond", NodeKind::IfEvent { field: "bogus".into(), op: IfOp::Eq, literal: "x".into() })],
            &[("start", "cond")],
        );
        assert!(matches!(validate(&dag), Err(WorkflowPlanError::UnsupportedIfEventField(ref f)) if f == "bogus"));
    }

    #[test]
    fn additional_edges_beyond_first_are_not_branched() {
        let dag = dag_from(
            &[
                ("start", NodeKind::Start),
                ("a", NodeKind::TextEvent { text: "x".into() }),
                ("b", NodeKind::TextEvent { text: "y".into() }),
                ("c", NodeKind::TextEvent { text: "z".into() }),
            ],
            &[("start", "a"), ("a", "b"), ("a", "c")],
        );
        let plan = plan_linear_traversal(&dag).unwrap();
        assert_eq!(plan, vec!["a".to_string(), "b".to_string()]);
    }
}
