//! Duplicate-record policy and the two deduplication strategies.
//!
//! A duplicate group is the set of result rows sharing the start process's
//! serial-number columns.
//!
//! | policy | condition process | covering paths | strategy |
//! |---|---|---|---|
//! | `SHOW_BOTH` | any | any | [`DedupStrategy::KeepAll`] |
//! | `SHOW_FIRST` / `SHOW_LAST` | yes | one | [`DedupStrategy::WindowFunction`] |
//! | `SHOW_FIRST` / `SHOW_LAST` | yes | several | [`DedupStrategy::PostHoc`] |
//! | `SHOW_FIRST` / `SHOW_LAST` | no | any | [`DedupStrategy::PostHoc`] |
//!
//! Row numbering inside one path's SQL cannot see the rows another path
//! keeps, so with several covering paths the policy runs on the merged table.
//!
//! Counts:
//! - `KeepAll`: actual = merged rows, unique = distinct duplicate keys
//! - `WindowFunction`: actual = pre-collapse count carried by the SQL,
//!   unique = merged rows
//! - `PostHoc`: actual = merged rows before dedup, unique = distinct
//!   duplicate keys over the union of start rows returned by the count-only
//!   statements

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::SortOrder;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PolicyError {
    #[error("Unknown duplicate policy `{0}` (expected SHOW_BOTH, SHOW_FIRST or SHOW_LAST)")]
    UnknownPolicy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DuplicatePolicy {
    ShowBoth,
    ShowFirst,
    ShowLast,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::ShowBoth => "SHOW_BOTH",
            DuplicatePolicy::ShowFirst => "SHOW_FIRST",
            DuplicatePolicy::ShowLast => "SHOW_LAST",
        }
    }

    /// Order of the start time within a duplicate group; row 1 is kept
    pub fn keep_order(&self) -> Option<SortOrder> {
        match self {
            DuplicatePolicy::ShowBoth => None,
            DuplicatePolicy::ShowFirst => Some(SortOrder::Asc),
            DuplicatePolicy::ShowLast => Some(SortOrder::Desc),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SHOW_BOTH" => Ok(DuplicatePolicy::ShowBoth),
            "SHOW_FIRST" => Ok(DuplicatePolicy::ShowFirst),
            "SHOW_LAST" => Ok(DuplicatePolicy::ShowLast),
            _ => Err(PolicyError::UnknownPolicy(s.to_string())),
        }
    }
}

impl TryFrom<String> for DuplicatePolicy {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DuplicatePolicy> for String {
    fn from(policy: DuplicatePolicy) -> Self {
        policy.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DedupStrategy {
    KeepAll,
    /// `ROW_NUMBER()` inside the SQL, one row per duplicate group
    WindowFunction { order: SortOrder },
    /// Dedup of the merged table, counts from count-only statements
    PostHoc { order: SortOrder },
}

impl DedupStrategy {
    pub fn is_window(&self) -> bool {
        matches!(self, DedupStrategy::WindowFunction { .. })
    }

    pub fn needs_count_statements(&self) -> bool {
        matches!(self, DedupStrategy::PostHoc { .. })
    }
}

pub fn should_use_window_function_strategy(
    policy: DuplicatePolicy,
    has_condition_processes: bool,
) -> bool {
    policy != DuplicatePolicy::ShowBoth && has_condition_processes
}

pub fn resolve_strategy(
    policy: DuplicatePolicy,
    has_condition_processes: bool,
    covering_paths: usize,
) -> DedupStrategy {
    match policy.keep_order() {
        None => DedupStrategy::KeepAll,
        Some(order)
            if should_use_window_function_strategy(policy, has_condition_processes)
                && covering_paths <= 1 =>
        {
            DedupStrategy::WindowFunction { order }
        }
        Some(order) => DedupStrategy::PostHoc { order },
    }
}

/// Hashable form of a JSON cell
pub fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Unique record count from count-only results.
///
/// Each path contributes `(start row id, duplicate key)` pairs. Start rows
/// are unioned across paths, so a row visible through several paths counts
/// once, and the union is then counted by distinct duplicate key.
pub fn unique_count_across_paths(per_path: &[Vec<(Value, Vec<Value>)>]) -> usize {
    let mut rows: HashMap<String, String> = HashMap::new();
    for (row_id, dup_key) in per_path.iter().flatten() {
        rows.entry(value_key(row_id)).or_insert_with(|| {
            dup_key
                .iter()
                .map(value_key)
                .collect::<Vec<_>>()
                .join("\u{1f}")
        });
    }
    rows.into_values().collect::<HashSet<_>>().len()
}
