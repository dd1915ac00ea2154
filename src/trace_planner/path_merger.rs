//! Covering-path selection.
//!
//! ## Algorithm (`get_common_longest_paths`)
//!
//! ```text
//! for each end (caller order):
//!     path = shortest(forward) or shortest(backward, is_forward=false)
//!            or shortest(undirected, is_forward=true)
//! sort paths by length desc (stable)
//! for each path:
//!     if an accepted path of the same direction contains it as prefix
//!        (forward) / suffix in discovery order (backward): attach its end
//!     else if len > 1: accept as new covering path
//! ```
//!
//! Ties in length keep discovery order, so the order of the caller's end
//! list decides which of two equally long routes is reused.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use super::trace_graph::TraceGraph;
use crate::trace_catalog::ProcessId;

/// A route from the start process to one end process.
///
/// `processes` is always start-first. Backward paths were discovered walking
/// end -> start along edge direction; [`Path::discovery_order`] gives that
/// order back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Path {
    pub processes: Vec<ProcessId>,
    pub is_forward: bool,
}

impl Path {
    pub fn new(processes: Vec<ProcessId>, is_forward: bool) -> Self {
        Self {
            processes,
            is_forward,
        }
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn discovery_order(&self) -> Vec<ProcessId> {
        if self.is_forward {
            self.processes.clone()
        } else {
            self.processes.iter().rev().copied().collect()
        }
    }

    /// True when `other` is redundant next to `self`
    pub fn covers(&self, other: &Path) -> bool {
        if self.is_forward != other.is_forward || other.len() > self.len() {
            return false;
        }
        if self.is_forward {
            self.processes.starts_with(&other.processes)
        } else {
            self.discovery_order().ends_with(&other.discovery_order())
        }
    }

    pub fn contains(&self, process_id: ProcessId) -> bool {
        self.processes.contains(&process_id)
    }
}

/// A maximal path representing one or more requested end processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoveringPath {
    pub path: Path,
    /// Requested end processes this path answers for, in request order
    pub end_processes: Vec<ProcessId>,
    /// Processes whose columns are selected ("keep" set)
    pub short_procs: BTreeSet<ProcessId>,
}

impl CoveringPath {
    pub fn new(path: Path, end_processes: Vec<ProcessId>, required: &HashSet<ProcessId>) -> Self {
        let short_procs = TraceGraph::remove_middle_nodes(&path.processes, required);
        Self {
            path,
            end_processes,
            short_procs,
        }
    }

    /// Single-hop plan over the start process only
    pub fn start_only(start: ProcessId) -> Self {
        Self {
            path: Path::new(vec![start], true),
            end_processes: vec![start],
            short_procs: BTreeSet::from([start]),
        }
    }

    pub fn is_forward(&self) -> bool {
        self.path.is_forward
    }

    /// True when the route passes through any of `processes`
    pub fn contains_any(&self, processes: &HashSet<ProcessId>) -> bool {
        processes.iter().any(|&p| self.path.contains(p))
    }
}

/// Step 1: one route per end process, with the direction fallbacks.
///
/// The shortest simple path is preferred; equal lengths keep discovery order.
pub fn find_path(graph: &TraceGraph, start: ProcessId, end: ProcessId) -> Option<Path> {
    fn shortest(paths: Vec<Vec<ProcessId>>) -> Option<Vec<ProcessId>> {
        paths.into_iter().reduce(|best, p| if p.len() < best.len() { p } else { best })
    }

    if let Some(processes) = shortest(graph.get_all_paths(start, end, true)) {
        return Some(Path::new(processes, true));
    }
    if let Some(mut processes) = shortest(graph.get_all_paths(end, start, true)) {
        processes.reverse();
        return Some(Path::new(processes, false));
    }
    shortest(graph.get_all_paths(start, end, false)).map(|processes| Path::new(processes, true))
}

/// Steps 2-4: sort by length and keep only non-redundant paths.
///
/// Input pairs carry the end processes each path answers for; output pairs
/// merge the ends of every discarded path into the path that covers it.
pub fn reduce_paths(paths: Vec<(Path, Vec<ProcessId>)>) -> Vec<(Path, Vec<ProcessId>)> {
    let mut paths = paths;
    // stable: equal lengths keep discovery order
    paths.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut accepted: Vec<(Path, Vec<ProcessId>)> = Vec::new();
    for (path, ends) in paths {
        if let Some((_, covered_ends)) = accepted.iter_mut().find(|(p, _)| p.covers(&path)) {
            for end in ends {
                if !covered_ends.contains(&end) {
                    covered_ends.push(end);
                }
            }
            continue;
        }
        if path.len() > 1 {
            accepted.push((path, ends));
        }
    }
    accepted
}

/// Compute the covering paths for one request.
///
/// Ends equal to `start` are answered by every covering path and are skipped.
/// When any other end is unreachable in all three search modes the result is
/// empty: a record must link across every requested process.
pub fn get_common_longest_paths(
    graph: &TraceGraph,
    start: ProcessId,
    ends: &[ProcessId],
    required: &HashSet<ProcessId>,
) -> Vec<CoveringPath> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for &end in ends {
        if end == start || !seen.insert(end) {
            continue;
        }
        match find_path(graph, start, end) {
            Some(path) => {
                log::debug!(
                    "Path {} -> {}: {:?} (forward={})",
                    start,
                    end,
                    path.processes,
                    path.is_forward
                );
                candidates.push((path, vec![end]));
            }
            None => {
                log::debug!("No path from {} to {}; request yields no records", start, end);
                return Vec::new();
            }
        }
    }

    reduce_paths(candidates)
        .into_iter()
        .map(|(path, ends)| CoveringPath::new(path, ends, required))
        .collect()
}
