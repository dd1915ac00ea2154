//! Condition filter definitions.
//!
//! A filter is a `(column, function, values)` tuple attached to a condition
//! process. Values are always bound as SQL parameters by the compiler; this
//! module only describes them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ColumnId;

/// Matching function of a condition filter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterFunction {
    /// Exact match, set membership over all values
    Matches,
    #[serde(rename = "STARTSWITH", alias = "STARTS_WITH")]
    StartsWith,
    #[serde(rename = "ENDSWITH", alias = "ENDS_WITH")]
    EndsWith,
    Contains,
    /// Value found at a fixed character position
    Substring,
    Regex,
    /// All whitespace-separated tokens, any order
    AndSearch,
    /// Any whitespace-separated token
    OrSearch,
}

impl FilterFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterFunction::Matches => "MATCHES",
            FilterFunction::StartsWith => "STARTSWITH",
            FilterFunction::EndsWith => "ENDSWITH",
            FilterFunction::Contains => "CONTAINS",
            FilterFunction::Substring => "SUBSTRING",
            FilterFunction::Regex => "REGEX",
            FilterFunction::AndSearch => "AND_SEARCH",
            FilterFunction::OrSearch => "OR_SEARCH",
        }
    }
}

impl fmt::Display for FilterFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MATCHES" => Ok(FilterFunction::Matches),
            "STARTSWITH" | "STARTS_WITH" => Ok(FilterFunction::StartsWith),
            "ENDSWITH" | "ENDS_WITH" => Ok(FilterFunction::EndsWith),
            "CONTAINS" => Ok(FilterFunction::Contains),
            "SUBSTRING" => Ok(FilterFunction::Substring),
            "REGEX" => Ok(FilterFunction::Regex),
            "AND_SEARCH" => Ok(FilterFunction::AndSearch),
            "OR_SEARCH" => Ok(FilterFunction::OrSearch),
            other => Err(format!("unknown filter function '{}'", other)),
        }
    }
}

/// One configured or inline condition filter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    /// Catalog id; inline request filters use 0
    #[serde(default)]
    pub id: i64,
    pub column_id: ColumnId,
    pub function: FilterFunction,
    pub values: Vec<String>,
    /// 1-based start position for `SUBSTRING`
    #[serde(default)]
    pub from_char: Option<u32>,
}

impl Filter {
    pub fn new(column_id: ColumnId, function: FilterFunction, values: Vec<String>) -> Self {
        Self {
            id: 0,
            column_id,
            function,
            values,
            from_char: None,
        }
    }

    pub fn with_from_char(mut self, from_char: u32) -> Self {
        self.from_char = Some(from_char);
        self
    }

    /// Whitespace tokens of all values, used by the search functions
    pub fn tokens(&self) -> Vec<&str> {
        self.values
            .iter()
            .flat_map(|v| v.split_whitespace())
            .collect()
    }
}
