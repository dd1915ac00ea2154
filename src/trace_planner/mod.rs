//! Trace planning: path search over the trace graph, covering-path
//! reduction and join-key propagation.

pub mod errors;
pub mod join_keys;
pub mod path_merger;
pub mod trace_graph;

pub use errors::CompileError;
pub use join_keys::{
    build_join_hops, resolve_link_keys, HopContext, HopFilter, HopLink, JoinHop, LinkKey,
    TimeWindow,
};
pub use path_merger::{find_path, get_common_longest_paths, reduce_paths, CoveringPath, Path};
pub use trace_graph::{TraceGraph, DEFAULT_MAX_PATH_LENGTH};
