//! Centralized naming for CTEs and output column labels.
//!
//! **All** CTE names and result labels must come from these functions. The
//! merge step joins per-path tables by label, so a label produced one way in
//! the compiler and looked up another way in the orchestrator silently drops
//! rows.
//!
//! ## Naming Convention
//! - CTE: `proc_{process_id}_cte_{hop_index}`
//! - Row identifier label: `row_id__{process_id}`
//! - Timestamp label: `time__{process_id}`
//! - Column label: `{column_name}__{process_id}`
//! - Column label on a clash: `{column_name}_{column_id}__{process_id}`
//!
//! The double underscore keeps labels unambiguous when a column name itself
//! ends in `_<digits>`.

use crate::trace_catalog::{ColumnId, ProcessId};

/// Window column carrying the per-duplicate-group row number.
pub const ROW_NUMBER_COLUMN: &str = "__row_number__";

/// Window column carrying the pre-collapse row count.
pub const ACTUAL_COUNT_COLUMN: &str = "__actual_count__";

/// Name of the CTE that materializes the joined chain for window dedup.
pub const JOINED_CTE_NAME: &str = "trace_joined";

/// Generate the CTE name for one hop.
///
/// # Examples
/// ```
/// use tracegraph::utils::column_naming::cte_name;
///
/// assert_eq!(cte_name(3, 0), "proc_3_cte_0");
/// assert_eq!(cte_name(12, 4), "proc_12_cte_4");
/// ```
pub fn cte_name(process_id: ProcessId, hop_index: usize) -> String {
    format!("proc_{}_cte_{}", process_id, hop_index)
}

/// Label of a process's row identifier in result tables.
///
/// ```
/// use tracegraph::utils::column_naming::row_id_label;
///
/// assert_eq!(row_id_label(7), "row_id__7");
/// ```
pub fn row_id_label(process_id: ProcessId) -> String {
    format!("row_id__{}", process_id)
}

/// Label of a process's timestamp in result tables.
///
/// ```
/// use tracegraph::utils::column_naming::time_label;
///
/// assert_eq!(time_label(7), "time__7");
/// ```
pub fn time_label(process_id: ProcessId) -> String {
    format!("time__{}", process_id)
}

/// Label of a requested column in result tables.
///
/// ```
/// use tracegraph::utils::column_naming::column_label;
///
/// assert_eq!(column_label("serial_no", 2), "serial_no__2");
/// assert_eq!(column_label("lot_1", 10), "lot_1__10");
/// ```
pub fn column_label(column_name: &str, process_id: ProcessId) -> String {
    format!("{}__{}", column_name, process_id)
}

/// Label of a requested column whose plain label is already taken by
/// another column of the same process (e.g. a column named `time`).
///
/// ```
/// use tracegraph::utils::column_naming::{column_label_with_id, time_label};
///
/// assert_eq!(column_label_with_id("time", 35, 3), "time_35__3");
/// assert_ne!(column_label_with_id("time", 35, 3), time_label(3));
/// ```
pub fn column_label_with_id(column_name: &str, column_id: ColumnId, process_id: ProcessId) -> String {
    format!("{}_{}__{}", column_name, column_id, process_id)
}
