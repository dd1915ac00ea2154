use thiserror::Error;

use crate::trace_catalog::{ColumnId, ProcessId, TraceCatalogError};

/// Errors raised while turning a covering path into join hops.
///
/// Every variant is fatal for the path being compiled. A path that cannot be
/// joined completely must not be silently shortened.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("Process `{process_id}` is not configured")]
    UnknownProcess { process_id: ProcessId },

    #[error("Column `{column_id}` not found in process `{process_id}` (trace configuration may be stale){context}")]
    UnknownColumn {
        process_id: ProcessId,
        column_id: ColumnId,
        context: String,
    },

    #[error("No trace edge between processes {from} and {to}")]
    MissingTraceEdge { from: ProcessId, to: ProcessId },

    #[error("Trace edge between processes {from} and {to} has no keys")]
    EmptyTraceKeys { from: ProcessId, to: ProcessId },

    #[error("Process `{process_id}` must have exactly one timestamp column")]
    MissingTimeColumn { process_id: ProcessId },

    #[error("Invalid filter `{filter_id}`: {message}")]
    InvalidFilter { filter_id: i64, message: String },

    #[error("Delta-time key on non-temporal column `{column_id}` of process `{process_id}`")]
    InvalidDeltaKey {
        process_id: ProcessId,
        column_id: ColumnId,
    },

    #[error("Invalid substring range {from}..{to} on column `{column}`")]
    InvalidSubstring { column: String, from: u32, to: u32 },

    #[error("Cannot compile an empty path")]
    EmptyPath,

    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl From<TraceCatalogError> for CompileError {
    fn from(err: TraceCatalogError) -> Self {
        match err {
            TraceCatalogError::Process { process_id } => CompileError::UnknownProcess { process_id },
            TraceCatalogError::Column {
                process_id,
                column_id,
                context,
            } => CompileError::UnknownColumn {
                process_id,
                column_id,
                context,
            },
            TraceCatalogError::TimeColumn { process_id, .. } => {
                CompileError::MissingTimeColumn { process_id }
            }
            TraceCatalogError::InvalidFilter { filter_id, message } => {
                CompileError::InvalidFilter { filter_id, message }
            }
            TraceCatalogError::InvalidDeltaKey {
                process_id,
                column_id,
                ..
            } => CompileError::InvalidDeltaKey {
                process_id,
                column_id,
            },
            other => CompileError::Catalog(other.to_string()),
        }
    }
}
