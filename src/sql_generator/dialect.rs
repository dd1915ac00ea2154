//! Per-backend SQL spelling.
//!
//! | | PostgreSQL | ClickHouse | SQLite |
//! |---|---|---|---|
//! | identifier | `"x"` | `` `x` `` | `"x"` |
//! | placeholder | `$1` | `$p1` (inlined before execution) | `?` |
//! | substring | `substring(x, f, n)` | `substring(x, f, n)` | `substr(x, f, n)` |
//! | regex | `x ~ p` | `match(x, p)` | `x REGEXP p` |
//! | +minutes | `x + n * INTERVAL '1 minute'` | `addMinutes(x, n)` | `datetime(x, 'n minutes')` |
//! | nested-loop hint | `SET enable_nestloop = false` | - | - |
//! | hint reset | `RESET enable_nestloop` | - | - |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::render_plan::PlannerHint;

pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &'static str;

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Placeholder for the `index`-th bound value (1-based)
    fn placeholder(&self, index: usize) -> String;

    fn substring(&self, expr: &str, from: u32, length: u32) -> String {
        format!("substring({}, {}, {})", expr, from, length)
    }

    fn regex_match(&self, expr: &str, pattern: &str) -> String;

    fn like(&self, expr: &str, pattern: &str) -> String {
        format!("{} LIKE {} ESCAPE '\\'", expr, pattern)
    }

    fn add_minutes(&self, expr: &str, minutes: i64) -> String;

    /// Session statement for a hint, `None` when the backend has no equivalent
    fn planner_hint(&self, _hint: PlannerHint) -> Option<String> {
        None
    }

    /// Session statement restoring the setting changed by [`Self::planner_hint`]
    fn planner_hint_reset(&self, _hint: PlannerHint) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn regex_match(&self, expr: &str, pattern: &str) -> String {
        format!("{} ~ {}", expr, pattern)
    }

    fn add_minutes(&self, expr: &str, minutes: i64) -> String {
        format!("({} + {} * INTERVAL '1 minute')", expr, minutes)
    }

    fn planner_hint(&self, hint: PlannerHint) -> Option<String> {
        match hint {
            PlannerHint::DisableNestedLoop => Some("SET enable_nestloop = false".to_string()),
        }
    }

    fn planner_hint_reset(&self, hint: PlannerHint) -> Option<String> {
        match hint {
            PlannerHint::DisableNestedLoop => Some("RESET enable_nestloop".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClickHouse;

impl SqlDialect for ClickHouse {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("`{}`", identifier.replace('`', "\\`"))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("$p{}", index)
    }

    fn regex_match(&self, expr: &str, pattern: &str) -> String {
        format!("match({}, {})", expr, pattern)
    }

    // backslash is the default LIKE escape
    fn like(&self, expr: &str, pattern: &str) -> String {
        format!("{} LIKE {}", expr, pattern)
    }

    fn add_minutes(&self, expr: &str, minutes: i64) -> String {
        format!("addMinutes({}, {})", expr, minutes)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn substring(&self, expr: &str, from: u32, length: u32) -> String {
        format!("substr({}, {}, {})", expr, from, length)
    }

    fn regex_match(&self, expr: &str, pattern: &str) -> String {
        format!("{} REGEXP {}", expr, pattern)
    }

    fn add_minutes(&self, expr: &str, minutes: i64) -> String {
        format!("datetime({}, '{:+} minutes')", expr, minutes)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown SQL dialect `{0}` (expected postgres, clickhouse or sqlite)")]
pub struct UnknownDialect(pub String);

/// Configurable dialect selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Postgres,
    #[serde(alias = "ch")]
    ClickHouse,
    Sqlite,
}

impl DialectKind {
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            DialectKind::Postgres => &Postgres,
            DialectKind::ClickHouse => &ClickHouse,
            DialectKind::Sqlite => &Sqlite,
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dialect().name())
    }
}

impl FromStr for DialectKind {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DialectKind::Postgres),
            "clickhouse" | "ch" => Ok(DialectKind::ClickHouse),
            "sqlite" => Ok(DialectKind::Sqlite),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}
