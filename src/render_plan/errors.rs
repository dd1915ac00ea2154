use thiserror::Error;

use crate::trace_catalog::ProcessId;
use crate::trace_planner::CompileError;

/// Join dependencies that cannot be ordered
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Unresolvable join dependencies: {message}")]
pub struct GraphError {
    pub message: String,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderBuildError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("No hops to render.")]
    MissingHops,

    #[error("No start hop in plan.")]
    MissingStartHop,

    #[error("Result label `{label}` of process {process_id} is used by two different columns.")]
    LabelCollision { label: String, process_id: ProcessId },
}
