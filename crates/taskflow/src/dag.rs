use std::collections::{HashMap, HashSet};

use crate::model::{NodeState, TaskflowNode};

#[derive(Debug, thiserror::Error)]
pub enum DagError {
    #[error("taskflow plan contains a cycle reachable from node '{0}'")]
    Cycle(String),
    #[error("node '{0}' depends on unknown node '{1}'")]
    UnknownDependency(String, String),
}

/// Validates that `nodes` forms a DAG: every `depends_on` id exists, and no
/// cycle is reachable from any node.
pub fn validate(nodes: &[TaskflowNode]) -> Result<(), DagError> {
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    for node in nodes {
        for dep in &node.depends_on {
            if !ids.contains(dep.as_str()) {
                return Err(DagError::UnknownDependency(node.id.clone(), dep.clone()));
            }
        }
    }

    let by_id: HashMap<&str, &TaskflowNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut color: HashMap<&str, u8> = HashMap::new();
    for node in nodes {
        visit(&node.id, &by_id, &mut color)?;
    }
    Ok(())
}

/// 0 = unvisited, 1 = on the current path, 2 = fully explored.
fn visit<'a>(id: &'a str, by_id: &HashMap<&'a str, &'a TaskflowNode>, color: &mut HashMap<&'a str, u8>) -> Result<(), DagError> {
    match color.get(id) {
        Some(1) => return Err(DagError::Cycle(id.to_string())),
        Some(2) => return Ok(()),
        _ => {}
    }
    color.insert(id, 1);
    if let Some(node) = by_id.get(id) {
        for dep in &node.depends_on {
            visit(dep, by_id, color)?;
        }
    }
    color.insert(id, 2);
    Ok(())
}

/// Ids of every `Pending` node whose dependencies have all `Succeeded`.
pub fn ready_ids(nodes: &[TaskflowNode]) -> Vec<String> {
    let succeeded: HashSet<&str> = nodes.iter().filter(|n| n.state == NodeState::Succeeded).map(|n| n.id.as_str()).collect();
    nodes
        .iter()
        .filter(|n| n.state == NodeState::Pending && n.depends_on.iter().all(|d| succeeded.contains(d.as_str())))
        .map(|n| n.id.clone())
        .collect()
}

/// Ids of descendants of `failed_id` (transitively) that have not yet
/// reached a terminal state — these become `Skipped` when a node exhausts
/// its retries.
pub fn descendants(nodes: &[TaskflowNode], failed_id: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut frontier = vec![failed_id.to_string()];
    let mut seen: HashSet<String> = HashSet::new();
    while let Some(current) = frontier.pop() {
        for node in nodes {
            if node.depends_on.contains(&current) && seen.insert(node.id.clone()) {
                result.push(node.id.clone());
                frontier.push(node.id.clone());
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    fn node(id: &str, deps: &[&str]) -> TaskflowNode {
        TaskflowNode::new(id, NodeKind::Implement, "do it", deps.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn accepts_a_valid_dag() {
        let nodes = vec![node("a", &[]), node("b", &["a"]), node("c", &["a", "b"])];
        assert!(validate(&nodes).is_ok());
    }

    #[test]
    fn rejects_a_cycle() {
        let nodes = vec![node("a", &["b"]), node("b", &["a"])];
        assert!(matches!(validate(&nodes), Err(DagError::Cycle(_))));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let nodes = vec![node("a", &["ghost"])];
        assert!(matches!(validate(&nodes), Err(DagError::UnknownDependency(_, _))));
    }

    #[test]
    fn ready_ids_requires_all_deps_succeeded() {
        let mut nodes = vec![node("a", &[]), node("b", &["a"])];
        assert_eq!(ready_ids(&nodes), vec!["a".to_string()]);
        nodes[0].state = NodeState::Succeeded;
        assert_eq!(ready_ids(&nodes), vec!["b".to_string()]);
    }

    #[test]
    fn descendants_are_transitive() {
        let nodes = vec![node("a", &[]), node("b", &["a"]), node("c", &["b"])];
        let mut d = descendants(&nodes, "a");
        d.sort();
        assert_eq!(d, vec!["b".to_string(), "c".to_string()]);
    }
}
