use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Analyze,
    Implement,
    Verify,
    Refine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeState {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Skipped,
    Canceled,
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Succeeded | NodeState::Failed | NodeState::Skipped | NodeState::Canceled)
    }
}

/// One unit of work in a decomposed task. `depends_on` edges must form a
/// DAG; a node becomes `Ready` only once every dependency has reached
/// `Succeeded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskflowNode {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub state: NodeState,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Instruction text sent to the AI facade when this node runs; grows a
    /// corrective suffix on each retry.
    pub prompt: String,
}

impl TaskflowNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, prompt: impl Into<String>, depends_on: Vec<String>) -> Self {
        TaskflowNode { id: id.into(), kind, depends_on, state: NodeState::Pending, attempts: 0, artifacts: Vec::new(), prompt: prompt.into() }
    }
}

/// The plan shape requested from the AI facade during decomposition: a flat
/// node list the engine validates as a DAG before scheduling it.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskflowPlan {
    pub nodes: Vec<PlanNodeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanNodeSpec {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub prompt: String,
}

/// Preset SLA tiers, analogous to the teacher's own lite/standard/strict
/// policy presets elsewhere in the stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SLAPolicy {
    pub max_tokens: u64,
    pub per_node_timeout: Duration,
    pub global_timeout: Duration,
    pub max_retries: u32,
    pub quality_gates: Vec<String>,
    pub max_concurrent_tasks: usize,
    pub queue_high_water_mark: usize,
}

impl SLAPolicy {
    pub fn lite() -> Self {
        SLAPolicy {
            max_tokens: 50_000,
            per_node_timeout: Duration::from_secs(90),
            global_timeout: Duration::from_secs(600),
            max_retries: 1,
            quality_gates: vec!["build".into()],
            max_concurrent_tasks: 2,
            queue_high_water_mark: 8,
        }
    }

    pub fn standard() -> Self {
        SLAPolicy {
            max_tokens: 200_000,
            per_node_timeout: Duration::from_secs(180),
            global_timeout: Duration::from_secs(1800),
            max_retries: 3,
            quality_gates: vec!["build".into(), "test".into()],
            max_concurrent_tasks: 4,
            queue_high_water_mark: 32,
        }
    }

    pub fn strict() -> Self {
        SLAPolicy {
            max_tokens: 600_000,
            per_node_timeout: Duration::from_secs(300),
            global_timeout: Duration::from_secs(3600),
            max_retries: 5,
            quality_gates: vec!["build".into(), "test".into(), "security".into()],
            max_concurrent_tasks: 6,
            queue_high_water_mark: 64,
        }
    }

    pub fn from_preset(name: &str) -> Option<Self> {
        match name {
            "lite" => Some(Self::lite()),
            "standard" => Some(Self::standard()),
            "strict" => Some(Self::strict()),
            _ => None,
        }
    }
}

/// Result of a full `Run`: the overall terminal state, the highest attempt
/// count any node reached, and the final node list for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub state: NodeState,
    pub attempts: u32,
    pub nodes: Vec<TaskflowNode>,
}

impl TaskResult {
    pub fn from_nodes(nodes: Vec<TaskflowNode>, canceled: bool) -> Self {
        let attempts = nodes.iter().map(|n| n.attempts).max().unwrap_or(0);
        let state = if canceled {
            NodeState::Canceled
        } else if nodes.iter().any(|n| n.state == NodeState::Failed) {
            NodeState::Failed
        } else if nodes.iter().all(|n| n.state == NodeState::Succeeded || n.state == NodeState::Skipped) {
            NodeState::Succeeded
        } else {
            NodeState::Failed
        };
        TaskResult { state, attempts, nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_scale_retries_with_strictness() {
        assert!(SLAPolicy::lite().max_retries < SLAPolicy::standard().max_retries);
        assert!(SLAPolicy::standard().max_retries < SLAPolicy::strict().max_retries);
    }

    #[test]
    fn result_succeeds_only_when_no_node_failed() {
        let nodes = vec![
            TaskflowNode { state: NodeState::Succeeded, ..TaskflowNode::new("a", NodeKind::Analyze, "p", vec![]) },
            TaskflowNode { state: NodeState::Skipped, ..TaskflowNode::new("b", NodeKind::Verify, "p", vec!["a".into()]) },
        ];
        let result = TaskResult::from_nodes(nodes, false);
        assert_eq!(result.state, NodeState::Succeeded);
    }
}
