use serde::{Deserialize, Serialize};

use super::errors::TraceCatalogError;
use super::filter::Filter;
use super::{ColumnId, ProcessId};

fn default_row_id_column() -> String {
    "id".to_string()
}

/// Raw storage type of a process column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RawDataType {
    Integer,
    Real,
    Text,
    Datetime,
    Date,
    Time,
    Boolean,
}

impl RawDataType {
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            RawDataType::Datetime | RawDataType::Date | RawDataType::Time
        )
    }
}

/// One column of a process table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessColumn {
    pub id: ColumnId,
    /// Physical column name in the process table
    pub column_name: String,
    /// Display name; falls back to `column_name`
    #[serde(default)]
    pub name: Option<String>,
    pub data_type: RawDataType,
    /// Part of the duplicate-serial key
    #[serde(default)]
    pub is_serial_no: bool,
    /// The process timestamp column
    #[serde(default)]
    pub is_get_date: bool,
}

impl ProcessColumn {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.column_name)
    }
}

/// A configured transactional table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Process {
    pub id: ProcessId,
    pub name: String,
    pub table_name: String,
    /// Monotonic row identifier column
    #[serde(default = "default_row_id_column")]
    pub row_id_column: String,
    pub columns: Vec<ProcessColumn>,
    /// Filters users may pick when this process is a condition process
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Process {
    pub fn column(&self, column_id: ColumnId) -> Result<&ProcessColumn, TraceCatalogError> {
        self.columns
            .iter()
            .find(|c| c.id == column_id)
            .ok_or_else(|| TraceCatalogError::column_error(self.id, column_id))
    }

    pub fn column_opt(&self, column_id: ColumnId) -> Option<&ProcessColumn> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    /// The single timestamp column
    pub fn time_column(&self) -> Result<&ProcessColumn, TraceCatalogError> {
        let mut found = self.columns.iter().filter(|c| c.is_get_date);
        match (found.next(), found.next()) {
            (Some(col), None) => Ok(col),
            (first, _) => Err(TraceCatalogError::TimeColumn {
                process_id: self.id,
                found: if first.is_some() {
                    self.columns.iter().filter(|c| c.is_get_date).count()
                } else {
                    0
                },
            }),
        }
    }

    /// Serial-number columns in catalog order
    pub fn serial_columns(&self) -> Vec<&ProcessColumn> {
        self.columns.iter().filter(|c| c.is_serial_no).collect()
    }
}
