//! Backend-neutral SQL AST for compiled trace plans.
//!
//! A [`SqlStatement`] is a chain of CTEs (one per hop, optionally followed by
//! the joined window CTE) plus a body. Nothing here knows about placeholders
//! or identifier quoting; `sql_generator` renders the tree per dialect.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod duplicate_policy;
pub mod errors;
pub mod filter_builder;
pub mod plan_builder;

pub use duplicate_policy::{DedupStrategy, DuplicatePolicy};
pub use errors::{GraphError, RenderBuildError};
pub use plan_builder::{build_statement, CompiledPlan};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SqlStatement {
    /// Session settings issued before the statement itself
    pub hints: Vec<PlannerHint>,
    pub ctes: Vec<Cte>,
    pub body: SelectQuery,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum PlannerHint {
    DisableNestedLoop,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Cte {
    pub cte_name: String,
    pub query: SelectQuery,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Default)]
pub struct SelectQuery {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub from: String,
    pub joins: Vec<Join>,
    pub filters: Option<Condition>,
    pub order_by: Vec<OrderByItem>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SelectItem {
    pub expression: SqlExpr,
    pub col_alias: Option<String>,
}

impl SelectItem {
    pub fn aliased(expression: SqlExpr, alias: impl Into<String>) -> Self {
        Self {
            expression,
            col_alias: Some(alias.into()),
        }
    }

    pub fn bare(expression: SqlExpr) -> Self {
        Self {
            expression,
            col_alias: None,
        }
    }

    /// Name this item is visible under in the enclosing query
    pub fn output_name(&self) -> Option<&str> {
        match (&self.col_alias, &self.expression) {
            (Some(alias), _) => Some(alias),
            (None, SqlExpr::Column { name, .. }) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Join {
    pub table_name: String,
    pub join_type: JoinType,
    pub joining_on: Vec<Condition>,
}

impl Join {
    /// Table names referenced by the join conditions, other than the joined table
    pub fn dependencies(&self) -> std::collections::HashSet<String> {
        let mut tables = std::collections::HashSet::new();
        for condition in &self.joining_on {
            condition.collect_tables(&mut tables);
        }
        tables.remove(&self.table_name);
        tables
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OrderByItem {
    pub expression: SqlExpr,
    pub order: SortOrder,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum SqlExpr {
    Column {
        table: Option<String>,
        name: String,
    },
    /// Bound value, rendered as a dialect placeholder
    Param(Value),
    Integer(i64),
    /// 1-based start, character length
    Substring {
        expr: Box<SqlExpr>,
        from: u32,
        length: u32,
    },
    AddMinutes {
        expr: Box<SqlExpr>,
        minutes: i64,
    },
    RowNumber {
        partition_by: Vec<SqlExpr>,
        order_by: Vec<OrderByItem>,
    },
    CountOver,
}

impl SqlExpr {
    pub fn column(table: &str, name: &str) -> Self {
        SqlExpr::Column {
            table: Some(table.to_string()),
            name: name.to_string(),
        }
    }

    pub fn unqualified(name: &str) -> Self {
        SqlExpr::Column {
            table: None,
            name: name.to_string(),
        }
    }

    pub fn param(value: impl Into<Value>) -> Self {
        SqlExpr::Param(value.into())
    }

    fn collect_tables(&self, tables: &mut std::collections::HashSet<String>) {
        match self {
            SqlExpr::Column {
                table: Some(table), ..
            } => {
                tables.insert(table.clone());
            }
            SqlExpr::Substring { expr, .. } | SqlExpr::AddMinutes { expr, .. } => {
                expr.collect_tables(tables)
            }
            _ => {}
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Condition {
    Eq(SqlExpr, SqlExpr),
    Gt(SqlExpr, SqlExpr),
    Ge(SqlExpr, SqlExpr),
    Le(SqlExpr, SqlExpr),
    Lt(SqlExpr, SqlExpr),
    In(SqlExpr, Vec<SqlExpr>),
    /// Pattern is already escaped for `\`
    Like(SqlExpr, SqlExpr),
    RegexMatch(SqlExpr, SqlExpr),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    /// Conjunction that collapses trivial cases
    pub fn all(mut conditions: Vec<Condition>) -> Option<Condition> {
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Condition::And(conditions)),
        }
    }

    pub fn any(mut conditions: Vec<Condition>) -> Option<Condition> {
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Condition::Or(conditions)),
        }
    }

    fn collect_tables(&self, tables: &mut std::collections::HashSet<String>) {
        match self {
            Condition::Eq(a, b)
            | Condition::Gt(a, b)
            | Condition::Ge(a, b)
            | Condition::Le(a, b)
            | Condition::Lt(a, b)
            | Condition::Like(a, b)
            | Condition::RegexMatch(a, b) => {
                a.collect_tables(tables);
                b.collect_tables(tables);
            }
            Condition::In(a, list) => {
                a.collect_tables(tables);
                list.iter().for_each(|e| e.collect_tables(tables));
            }
            Condition::And(list) | Condition::Or(list) => {
                list.iter().for_each(|c| c.collect_tables(tables));
            }
        }
    }
}
