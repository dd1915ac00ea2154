use super::errors::TraceCatalogError;
use super::filter::Filter;
use super::process::Process;
use super::trace_edge::TraceEdge;
use super::{ColumnId, ProcessId};

/// Read-only view of the process and trace configuration.
///
/// The engine borrows one store for a whole resolution, so an implementation
/// backed by mutable state must hand out a consistent snapshot.
pub trait ConfigStore {
    fn get_process(&self, process_id: ProcessId) -> Result<&Process, TraceCatalogError>;

    fn get_trace_edges(&self) -> &[TraceEdge];

    /// Configured filters of `process_id` defined on any of `column_ids`
    fn get_condition_filters(&self, process_id: ProcessId, column_ids: &[ColumnId]) -> Vec<Filter>;
}
