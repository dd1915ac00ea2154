//! Combining per-path result tables.
//!
//! Paths share the start process, so their tables are joined on the start
//! row-id label with an explicit hash join:
//!
//! - inner semantics: a start row missing from any path is dropped
//! - a start row matching several rows on both sides yields every pairing
//! - on a column-name clash the later path's value wins (the key is shared)

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::errors::ExecutionError;
use super::executor::QueryResult;
use crate::render_plan::duplicate_policy::value_key;
use crate::render_plan::SortOrder;

/// Inner hash join of `tables` on `key`
pub fn merge_on_row_id(tables: Vec<QueryResult>, key: &str) -> Result<QueryResult, ExecutionError> {
    let mut tables = tables.into_iter();
    let Some(mut merged) = tables.next() else {
        return Ok(QueryResult::default());
    };

    for right in tables {
        if merged.is_empty() || right.is_empty() {
            let mut columns = merged.columns.clone();
            columns.extend(right.columns.iter().filter(|c| !merged.columns.contains(*c)).cloned());
            merged = QueryResult::new(columns, Vec::new());
            continue;
        }
        let left_key = merged.require_column(key)?;
        let right_key = right.require_column(key)?;

        // right column index -> merged position (existing or appended)
        let mut columns = merged.columns.clone();
        let targets: Vec<usize> = right
            .columns
            .iter()
            .map(|c| {
                let existing = columns.iter().position(|m| m == c);
                match existing {
                    Some(pos) => pos,
                    None => {
                        columns.push(c.clone());
                        columns.len() - 1
                    }
                }
            })
            .collect();

        let mut index: HashMap<String, Vec<&Vec<Value>>> = HashMap::new();
        for row in &right.rows {
            index.entry(value_key(&row[right_key])).or_default().push(row);
        }

        let mut rows = Vec::new();
        for left in &merged.rows {
            let Some(matches) = index.get(&value_key(&left[left_key])) else {
                continue;
            };
            for right_row in matches {
                let mut row = left.clone();
                row.resize(columns.len(), Value::Null);
                for (i, value) in right_row.iter().enumerate() {
                    if i != right_key {
                        row[targets[i]] = value.clone();
                    }
                }
                rows.push(row);
            }
        }
        merged = QueryResult::new(columns, rows);
    }

    Ok(merged)
}

/// Total order over JSON cells: null < bool < number < string < other
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) != rank(b) => rank(a).cmp(&rank(b)),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Stable ascending sort by the given labels; absent labels are skipped
pub fn sort_by_labels(table: &mut QueryResult, labels: &[String]) {
    let indexes: Vec<usize> = labels
        .iter()
        .filter_map(|label| table.column_index(label))
        .collect();
    table.rows.sort_by(|a, b| {
        indexes
            .iter()
            .map(|&i| compare_values(&a[i], &b[i]))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

fn row_key(row: &[Value], indexes: &[usize]) -> String {
    indexes
        .iter()
        .map(|&i| value_key(&row[i]))
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

/// Keep one row per duplicate key: the first by `order_labels` in `order`.
///
/// Later labels break ties of earlier ones, the way the window strategy
/// orders by start time and then start row id.
pub fn dedup_by_key(
    table: &mut QueryResult,
    key_labels: &[String],
    order_labels: &[&str],
    order: SortOrder,
) -> Result<(), ExecutionError> {
    if table.is_empty() {
        return Ok(());
    }
    let order_indexes = order_labels
        .iter()
        .map(|label| table.require_column(label))
        .collect::<Result<Vec<_>, _>>()?;
    let key_indexes = key_labels
        .iter()
        .map(|label| table.require_column(label))
        .collect::<Result<Vec<_>, _>>()?;

    table.rows.sort_by(|a, b| {
        let ordering = order_indexes
            .iter()
            .map(|&i| compare_values(&a[i], &b[i]))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    let mut seen = HashSet::new();
    table.rows.retain(|row| seen.insert(row_key(row, &key_indexes)));
    Ok(())
}

/// Number of distinct value combinations over `labels`
pub fn count_distinct(table: &QueryResult, labels: &[String]) -> Result<usize, ExecutionError> {
    if table.is_empty() {
        return Ok(0);
    }
    let indexes = labels
        .iter()
        .map(|label| table.require_column(label))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(table
        .rows
        .iter()
        .map(|row| row_key(row, &indexes))
        .collect::<HashSet<_>>()
        .len())
}

/// `(row id, duplicate key)` pairs of a count-only result
pub fn count_rows(
    table: &QueryResult,
    row_id_label: &str,
    key_labels: &[String],
) -> Result<Vec<(Value, Vec<Value>)>, ExecutionError> {
    if table.is_empty() {
        return Ok(Vec::new());
    }
    let id_index = table.require_column(row_id_label)?;
    let key_indexes = key_labels
        .iter()
        .map(|label| table.require_column(label))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(table
        .rows
        .iter()
        .map(|row| {
            (
                row[id_index].clone(),
                key_indexes.iter().map(|&i| row[i].clone()).collect(),
            )
        })
        .collect())
}
