use serde::Serialize;
use serde_json::Value;

use super::dialect::SqlDialect;
use super::parameter_substitution::{inline_positional, ParameterSubstitutionError};
use crate::render_plan::{
    Condition, Cte, Join, JoinType, OrderByItem, SelectItem, SelectQuery, SqlExpr, SqlStatement,
};

/// Rendered statement with its bound values in placeholder order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledSql {
    /// Session statements to run first on the same connection
    pub pre_statements: Vec<String>,
    pub sql: String,
    pub params: Vec<Value>,
    /// Session statements undoing `pre_statements`, run after `sql` even when it fails
    pub post_statements: Vec<String>,
}

impl CompiledSql {
    /// SQL with every placeholder replaced by a literal (`$pN` placeholders only)
    pub fn inlined(&self) -> Result<String, ParameterSubstitutionError> {
        inline_positional(&self.sql, &self.params)
    }
}

/// Collects bound values while rendering
pub struct SqlWriter<'a> {
    dialect: &'a dyn SqlDialect,
    params: Vec<Value>,
}

impl<'a> SqlWriter<'a> {
    pub fn new(dialect: &'a dyn SqlDialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: &Value) -> String {
        self.params.push(value.clone());
        self.dialect.placeholder(self.params.len())
    }

    fn ident(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }
}

pub trait ToSql {
    fn to_sql(&self, w: &mut SqlWriter<'_>) -> String;
}

impl ToSql for SqlExpr {
    fn to_sql(&self, w: &mut SqlWriter<'_>) -> String {
        match self {
            SqlExpr::Column { table, name } => match table {
                Some(table) => format!("{}.{}", w.ident(table), w.ident(name)),
                None => w.ident(name),
            },
            SqlExpr::Param(value) => w.bind(value),
            SqlExpr::Integer(i) => i.to_string(),
            SqlExpr::Substring { expr, from, length } => {
                let inner = expr.to_sql(w);
                w.dialect.substring(&inner, *from, *length)
            }
            SqlExpr::AddMinutes { expr, minutes } => {
                let inner = expr.to_sql(w);
                w.dialect.add_minutes(&inner, *minutes)
            }
            SqlExpr::RowNumber {
                partition_by,
                order_by,
            } => {
                let partition: Vec<String> = partition_by.iter().map(|e| e.to_sql(w)).collect();
                let order: Vec<String> = order_by.iter().map(|o| o.to_sql(w)).collect();
                let mut over = Vec::new();
                if !partition.is_empty() {
                    over.push(format!("PARTITION BY {}", partition.join(", ")));
                }
                if !order.is_empty() {
                    over.push(format!("ORDER BY {}", order.join(", ")));
                }
                format!("ROW_NUMBER() OVER ({})", over.join(" "))
            }
            SqlExpr::CountOver => "COUNT(*) OVER ()".to_string(),
        }
    }
}

impl ToSql for OrderByItem {
    fn to_sql(&self, w: &mut SqlWriter<'_>) -> String {
        format!("{} {}", self.expression.to_sql(w), self.order.as_sql())
    }
}

fn binary(w: &mut SqlWriter<'_>, a: &SqlExpr, op: &str, b: &SqlExpr) -> String {
    let left = a.to_sql(w);
    format!("{} {} {}", left, op, b.to_sql(w))
}

fn render_condition(condition: &Condition, w: &mut SqlWriter<'_>, nested: bool) -> String {
    match condition {
        Condition::Eq(a, b) => binary(w, a, "=", b),
        Condition::Gt(a, b) => binary(w, a, ">", b),
        Condition::Ge(a, b) => binary(w, a, ">=", b),
        Condition::Le(a, b) => binary(w, a, "<=", b),
        Condition::Lt(a, b) => binary(w, a, "<", b),
        Condition::In(a, list) => {
            let left = a.to_sql(w);
            let items: Vec<String> = list.iter().map(|e| e.to_sql(w)).collect();
            format!("{} IN ({})", left, items.join(", "))
        }
        Condition::Like(a, pattern) => {
            let left = a.to_sql(w);
            let right = pattern.to_sql(w);
            w.dialect.like(&left, &right)
        }
        Condition::RegexMatch(a, pattern) => {
            let left = a.to_sql(w);
            let right = pattern.to_sql(w);
            w.dialect.regex_match(&left, &right)
        }
        Condition::And(parts) | Condition::Or(parts) => {
            let op = if matches!(condition, Condition::And(_)) {
                " AND "
            } else {
                " OR "
            };
            let rendered: Vec<String> = parts
                .iter()
                .map(|c| render_condition(c, w, true))
                .collect();
            if nested {
                format!("({})", rendered.join(op))
            } else {
                rendered.join(op)
            }
        }
    }
}

impl ToSql for Condition {
    fn to_sql(&self, w: &mut SqlWriter<'_>) -> String {
        render_condition(self, w, false)
    }
}

impl ToSql for SelectItem {
    fn to_sql(&self, w: &mut SqlWriter<'_>) -> String {
        let expr = self.expression.to_sql(w);
        match &self.col_alias {
            Some(alias) => format!("{} AS {}", expr, w.ident(alias)),
            None => expr,
        }
    }
}

impl ToSql for Join {
    fn to_sql(&self, w: &mut SqlWriter<'_>) -> String {
        let keyword = match self.join_type {
            JoinType::Inner => "INNER JOIN",
        };
        let table = w.ident(&self.table_name);
        let on: Vec<String> = self
            .joining_on
            .iter()
            .map(|c| render_condition(c, w, true))
            .collect();
        if on.is_empty() {
            format!("{} {} ON 1 = 1", keyword, table)
        } else {
            format!("{} {} ON {}", keyword, table, on.join(" AND "))
        }
    }
}

impl ToSql for SelectQuery {
    fn to_sql(&self, w: &mut SqlWriter<'_>) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        let items: Vec<String> = self.items.iter().map(|i| i.to_sql(w)).collect();
        sql.push_str(&items.join(", "));
        sql.push_str("\nFROM ");
        sql.push_str(&w.ident(&self.from));
        for join in &self.joins {
            sql.push('\n');
            sql.push_str(&join.to_sql(w));
        }
        if let Some(filters) = &self.filters {
            sql.push_str("\nWHERE ");
            sql.push_str(&filters.to_sql(w));
        }
        if !self.order_by.is_empty() {
            let order: Vec<String> = self.order_by.iter().map(|o| o.to_sql(w)).collect();
            sql.push_str("\nORDER BY ");
            sql.push_str(&order.join(", "));
        }
        sql
    }
}

impl ToSql for Cte {
    fn to_sql(&self, w: &mut SqlWriter<'_>) -> String {
        let name = w.ident(&self.cte_name);
        format!("{} AS (\n{}\n)", name, self.query.to_sql(w))
    }
}

impl ToSql for SqlStatement {
    fn to_sql(&self, w: &mut SqlWriter<'_>) -> String {
        let mut sql = String::new();
        if !self.ctes.is_empty() {
            let ctes: Vec<String> = self.ctes.iter().map(|c| c.to_sql(w)).collect();
            sql.push_str("WITH ");
            sql.push_str(&ctes.join(",\n"));
            sql.push('\n');
        }
        sql.push_str(&self.body.to_sql(w));
        sql
    }
}

/// Render a statement for one backend
pub fn render_statement(statement: &SqlStatement, dialect: &dyn SqlDialect) -> CompiledSql {
    let mut writer = SqlWriter::new(dialect);
    let sql = statement.to_sql(&mut writer);
    let pre_statements = statement
        .hints
        .iter()
        .filter_map(|hint| dialect.planner_hint(*hint))
        .collect();
    let post_statements = statement
        .hints
        .iter()
        .rev()
        .filter_map(|hint| dialect.planner_hint_reset(*hint))
        .collect();
    CompiledSql {
        pre_statements,
        sql,
        params: writer.params,
        post_statements,
    }
}
