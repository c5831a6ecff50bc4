// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Task, TaskId, TaskStatus};

/// Dependency graph over store ids. An edge u → v means "v depends on u".
///
/// Used for both the task graph and the stage graph. Intentionally
/// lightweight; acyclicity is validated when the recipe is loaded, so here
/// we just keep adjacency information for scheduling and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct DepGraph {
    nodes: Vec<i64>,
    edges: Vec<(i64, i64)>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: i64) {
        self.nodes.push(id);
    }

    pub fn add_edge(&mut self, from: i64, to: i64) {
        self.edges.push((from, to));
    }

    pub fn nodes(&self) -> &[i64] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(i64, i64)] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone)]
struct NodeLinks {
    /// Direct dependencies still in the view.
    deps: BTreeSet<TaskId>,
    /// Direct dependents still in the view.
    dependents: Vec<TaskId>,
}

/// Mutable view of the remaining task DAG.
///
/// Built as a copy of the rendered task graph; nodes leave the view as
/// their tasks reach a terminal status, which may expose new ready nodes.
/// Keyed by task id, so iteration order is insertion order.
#[derive(Debug, Clone)]
pub struct GraphView {
    nodes: BTreeMap<TaskId, NodeLinks>,
}

impl GraphView {
    pub fn from_graph(graph: &DepGraph) -> Self {
        let mut nodes: BTreeMap<TaskId, NodeLinks> = graph
            .nodes()
            .iter()
            .map(|&id| {
                (
                    id,
                    NodeLinks {
                        deps: BTreeSet::new(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        for &(u, v) in graph.edges() {
            if let Some(node) = nodes.get_mut(&v) {
                node.deps.insert(u);
            }
            if let Some(node) = nodes.get_mut(&u) {
                node.dependents.push(v);
            }
        }

        Self { nodes }
    }

    /// Drop every task that already completed successfully (the resume
    /// optimisation), returning how many were skipped.
    pub fn retain_unfinished(&mut self, tasks: &BTreeMap<TaskId, Task>) -> usize {
        let done: Vec<TaskId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| {
                tasks
                    .get(id)
                    .is_some_and(|t| t.status() == TaskStatus::Successful)
            })
            .collect();
        for id in &done {
            self.remove(*id);
        }
        done.len()
    }

    /// Tasks with no unfinished dependencies that have not been attempted
    /// or submitted yet, in ascending id order.
    pub fn ready(&self, tasks: &BTreeMap<TaskId, Task>) -> Vec<TaskId> {
        self.nodes
            .iter()
            .filter(|(id, links)| {
                links.deps.is_empty()
                    && tasks
                        .get(*id)
                        .is_some_and(|t| t.status() == TaskStatus::NoAttempt && !t.is_submitted())
            })
            .map(|(&id, _)| id)
            .collect()
    }

    /// Remove a node and its incident edges, potentially exposing new ready
    /// nodes. Unknown ids are ignored.
    pub fn remove(&mut self, id: TaskId) {
        let Some(links) = self.nodes.remove(&id) else {
            return;
        };
        for dependent in links.dependents {
            if let Some(node) = self.nodes.get_mut(&dependent) {
                node.deps.remove(&id);
            }
        }
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Remaining task ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
