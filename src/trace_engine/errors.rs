use thiserror::Error;

use crate::config::ConfigError;
use crate::render_plan::duplicate_policy::PolicyError;
use crate::render_plan::{GraphError, RenderBuildError};
use crate::sql_generator::ParameterSubstitutionError;
use crate::trace_catalog::TraceCatalogError;
use crate::trace_planner::CompileError;

/// Failures reported by a [`SqlExecutor`](super::SqlExecutor) or while
/// reading its results
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Could not decode result row: {0}")]
    Decode(String),

    #[error("Result is missing column `{column}`")]
    MissingColumn { column: String },

    #[error(transparent)]
    Substitution(#[from] ParameterSubstitutionError),

    #[error("Executor not configured: {0}")]
    NotConfigured(String),
}

impl ExecutionError {
    pub fn query_error(message: impl Into<String>) -> Self {
        ExecutionError::Query {
            message: message.into(),
        }
    }

    /// Attach the failing SQL to a query error
    pub fn query_error_with_context(message: impl std::fmt::Display, sql: &str) -> Self {
        ExecutionError::Query {
            message: format!("{}\n  SQL: {}", message, sql),
        }
    }
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Catalog(#[from] TraceCatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(RenderBuildError),

    #[error("Invalid trace request: {0}")]
    InvalidRequest(String),
}

impl From<RenderBuildError> for TraceError {
    fn from(err: RenderBuildError) -> Self {
        match err {
            RenderBuildError::Graph(e) => TraceError::Graph(e),
            RenderBuildError::Compile(e) => TraceError::Compile(e),
            other => TraceError::Render(other),
        }
    }
}
