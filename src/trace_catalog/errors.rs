//! # Trace Catalog Error Types
//!
//! Errors raised while loading the process/trace-edge catalog or looking up
//! entries in it.
//!
//! ## Error Categories
//!
//! - **Lookup Errors**: unknown process or column ids
//! - **Structural Errors**: duplicate ids, edges pointing at unknown processes,
//!   delta-time keys on non-temporal columns
//! - **Configuration Errors**: file I/O and YAML parsing
//!
//! Use the context helpers to say where a lookup failed:
//!
//! ```ignore
//! TraceCatalogError::column_error_with_context(
//!     3, 31,
//!     "While resolving trace key of edge 3 -> 4"
//! )
//! ```

use thiserror::Error;

use super::{ColumnId, ProcessId, RawDataType};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TraceCatalogError {
    #[error("No process found with id `{process_id}`")]
    Process { process_id: ProcessId },
    #[error("Process `{process_id}` has no column with id `{column_id}`{context}")]
    Column {
        process_id: ProcessId,
        column_id: ColumnId,
        context: String,
    },
    #[error("Duplicate {kind} id `{id}` in catalog")]
    DuplicateId { kind: &'static str, id: i64 },
    #[error("Trace edge {self_process_id} -> {target_process_id} references an unknown process")]
    DanglingEdge {
        self_process_id: ProcessId,
        target_process_id: ProcessId,
    },
    #[error("Process `{process_id}` must define exactly one timestamp column (found {found})")]
    TimeColumn { process_id: ProcessId, found: usize },
    #[error("Delta-time key on process `{process_id}` column `{column_id}` needs a temporal column, found {data_type:?}")]
    InvalidDeltaKey {
        process_id: ProcessId,
        column_id: ColumnId,
        data_type: RawDataType,
    },
    #[error("Invalid filter `{filter_id}`: {message}")]
    InvalidFilter { filter_id: i64, message: String },
    #[error("Failed to read catalog file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse catalog: {error}")]
    ConfigParseError { error: String },
}

impl TraceCatalogError {
    /// Create a Column error with context information
    pub fn column_error_with_context(
        process_id: ProcessId,
        column_id: ColumnId,
        context: impl Into<String>,
    ) -> Self {
        TraceCatalogError::Column {
            process_id,
            column_id,
            context: format!("\n  Context: {}", context.into()),
        }
    }

    /// Create a Column error without context
    pub fn column_error(process_id: ProcessId, column_id: ColumnId) -> Self {
        TraceCatalogError::Column {
            process_id,
            column_id,
            context: String::new(),
        }
    }
}
