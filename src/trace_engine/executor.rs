use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::errors::ExecutionError;
use crate::sql_generator::CompiledSql;

/// Column-ordered result of one statement
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, ExecutionError> {
        self.column_index(name)
            .ok_or_else(|| ExecutionError::MissingColumn {
                column: name.to_string(),
            })
    }

    /// Values of one column, or an empty list for an empty result
    pub fn column_values(&self, name: &str) -> Result<Vec<&Value>, ExecutionError> {
        if self.rows.is_empty() {
            return Ok(Vec::new());
        }
        let index = self.require_column(name)?;
        Ok(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Drop a column if present
    pub fn remove_column(&mut self, name: &str) {
        if let Some(index) = self.column_index(name) {
            self.columns.remove(index);
            for row in &mut self.rows {
                if index < row.len() {
                    row.remove(index);
                }
            }
        }
    }

    /// Build from JSON objects; column order follows the first row
    pub fn from_json_rows(rows: Vec<Value>) -> Result<Self, ExecutionError> {
        let mut result = QueryResult::default();
        for row in rows {
            let object = match row {
                Value::Object(object) => object,
                other => {
                    return Err(ExecutionError::Decode(format!(
                        "expected object, got {}",
                        other
                    )))
                }
            };
            if result.columns.is_empty() {
                result.columns = object.keys().cloned().collect();
            }
            result.rows.push(
                result
                    .columns
                    .iter()
                    .map(|c| object.get(c).cloned().unwrap_or(Value::Null))
                    .collect(),
            );
        }
        Ok(result)
    }
}

/// Database seam: runs one compiled statement.
///
/// Implementations run `pre_statements` on the same session before `sql`,
/// then `post_statements` whether or not `sql` succeeded, so session
/// settings never outlive the statement. Pooling, transactions and retries
/// are the implementation's business.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn run_sql(&self, statement: &CompiledSql) -> Result<QueryResult, ExecutionError>;
}
