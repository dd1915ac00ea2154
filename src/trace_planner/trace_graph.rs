//! In-memory trace graph and simple-path search.
//!
//! Edges are stored once but searched in two modes:
//!
//! - **directed**: follow `self -> target` only
//! - **undirected**: ignore orientation (fallback when no directed route exists)
//!
//! Paths are simple (no repeated process), which also guarantees termination
//! on cyclic configurations. Neighbors are visited in ascending id order so
//! the same graph always yields the same paths in the same order.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::trace_catalog::{ProcessId, TraceEdge};

pub const DEFAULT_MAX_PATH_LENGTH: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct TraceGraph {
    nodes: BTreeSet<ProcessId>,
    outgoing: BTreeMap<ProcessId, BTreeSet<ProcessId>>,
    undirected: BTreeMap<ProcessId, BTreeSet<ProcessId>>,
    max_path_length: usize,
}

impl TraceGraph {
    pub fn new(edges: &[TraceEdge]) -> Self {
        let mut graph = TraceGraph {
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
            ..Default::default()
        };
        for edge in edges {
            // Self-loops never extend a simple path
            if edge.is_self_loop() {
                graph.nodes.insert(edge.self_process_id);
                continue;
            }
            let (a, b) = (edge.self_process_id, edge.target_process_id);
            graph.nodes.insert(a);
            graph.nodes.insert(b);
            graph.outgoing.entry(a).or_default().insert(b);
            graph.undirected.entry(a).or_default().insert(b);
            graph.undirected.entry(b).or_default().insert(a);
        }
        graph
    }

    /// Paths with more processes than this are not enumerated
    pub fn with_max_path_length(mut self, max_path_length: usize) -> Self {
        self.max_path_length = max_path_length.max(1);
        self
    }

    pub fn contains(&self, process_id: ProcessId) -> bool {
        self.nodes.contains(&process_id)
    }

    fn neighbors(&self, node: ProcessId, directed: bool) -> impl Iterator<Item = ProcessId> + '_ {
        let adjacency = if directed {
            &self.outgoing
        } else {
            &self.undirected
        };
        adjacency.get(&node).into_iter().flatten().copied()
    }

    /// All simple paths from `start` to `end`, each listed start-first.
    ///
    /// Returns an empty list when either process is absent or unreachable.
    /// `start == end` yields the single one-process path.
    pub fn get_all_paths(&self, start: ProcessId, end: ProcessId, directed: bool) -> Vec<Vec<ProcessId>> {
        let mut paths = Vec::new();
        if !self.contains(start) || !self.contains(end) {
            return paths;
        }
        if start == end {
            paths.push(vec![start]);
            return paths;
        }

        let mut current = vec![start];
        let mut visited = HashSet::from([start]);
        self.walk(end, directed, &mut current, &mut visited, &mut paths);

        log::trace!(
            "get_all_paths({} -> {}, directed={}): {} path(s)",
            start,
            end,
            directed,
            paths.len()
        );
        paths
    }

    fn walk(
        &self,
        end: ProcessId,
        directed: bool,
        current: &mut Vec<ProcessId>,
        visited: &mut HashSet<ProcessId>,
        paths: &mut Vec<Vec<ProcessId>>,
    ) {
        if current.len() >= self.max_path_length {
            return;
        }
        let Some(&node) = current.last() else {
            return;
        };
        for next in self.neighbors(node, directed) {
            if visited.contains(&next) {
                continue;
            }
            current.push(next);
            if next == end {
                paths.push(current.clone());
            } else {
                visited.insert(next);
                self.walk(end, directed, current, visited, paths);
                visited.remove(&next);
            }
            current.pop();
        }
    }

    /// Processes of `path` that must stay explicit joins with their columns
    /// selected: both endpoints plus every process in `required`.
    pub fn remove_middle_nodes(
        path: &[ProcessId],
        required: &HashSet<ProcessId>,
    ) -> BTreeSet<ProcessId> {
        let mut keep = BTreeSet::new();
        if let (Some(first), Some(last)) = (path.first(), path.last()) {
            keep.insert(*first);
            keep.insert(*last);
        }
        keep.extend(path.iter().filter(|p| required.contains(p)).copied());
        keep
    }
}
