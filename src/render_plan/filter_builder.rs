//! Condition filters -> WHERE conditions of a hop CTE.
//!
//! Filters on the same column are OR-combined, filters on different columns
//! are AND-combined. Every user value is a bound parameter.

use crate::render_plan::{Condition, SqlExpr};
use crate::trace_catalog::{Filter, FilterFunction};
use crate::trace_planner::{CompileError, HopFilter};

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn invalid(filter: &Filter, message: impl Into<String>) -> CompileError {
    CompileError::InvalidFilter {
        filter_id: filter.id,
        message: message.into(),
    }
}

/// OR over one condition per value
fn any_value(
    filter: &Filter,
    build: impl Fn(&str) -> Condition,
) -> Result<Condition, CompileError> {
    Condition::any(filter.values.iter().map(|v| build(v)).collect())
        .ok_or_else(|| invalid(filter, "no values"))
}

fn like(column: &SqlExpr, pattern: String) -> Condition {
    Condition::Like(column.clone(), SqlExpr::param(pattern))
}

/// Condition for a single filter against `column`
pub fn filter_condition(column: &SqlExpr, filter: &Filter) -> Result<Condition, CompileError> {
    if filter.values.is_empty() {
        return Err(invalid(filter, "no values"));
    }

    match filter.function {
        FilterFunction::Matches => Ok(Condition::In(
            column.clone(),
            filter.values.iter().map(|v| SqlExpr::param(v.as_str())).collect(),
        )),
        FilterFunction::StartsWith => {
            any_value(filter, |v| like(column, format!("{}%", escape_like(v))))
        }
        FilterFunction::EndsWith => any_value(filter, |v| like(column, format!("%{}", escape_like(v)))),
        FilterFunction::Contains => {
            any_value(filter, |v| like(column, format!("%{}%", escape_like(v))))
        }
        FilterFunction::Substring => {
            let from = filter
                .from_char
                .filter(|&from| from >= 1)
                .ok_or_else(|| invalid(filter, "SUBSTRING requires from_char >= 1"))?;
            any_value(filter, |v| {
                Condition::Eq(
                    SqlExpr::Substring {
                        expr: Box::new(column.clone()),
                        from,
                        length: v.chars().count() as u32,
                    },
                    SqlExpr::param(v),
                )
            })
        }
        FilterFunction::Regex => {
            for pattern in &filter.values {
                regex::Regex::new(pattern)
                    .map_err(|e| invalid(filter, format!("invalid regex `{}`: {}", pattern, e)))?;
            }
            any_value(filter, |v| Condition::RegexMatch(column.clone(), SqlExpr::param(v)))
        }
        FilterFunction::AndSearch | FilterFunction::OrSearch => {
            let tokens: Vec<Condition> = filter
                .tokens()
                .into_iter()
                .map(|token| like(column, format!("%{}%", escape_like(token))))
                .collect();
            let combined = if filter.function == FilterFunction::AndSearch {
                Condition::all(tokens)
            } else {
                Condition::any(tokens)
            };
            combined.ok_or_else(|| invalid(filter, "search values contain no tokens"))
        }
    }
}

/// WHERE condition over a hop's filters, or `None` when it has none
pub fn build_hop_filter(
    table: Option<&str>,
    filters: &[HopFilter],
) -> Result<Option<Condition>, CompileError> {
    // group by column, first-seen order
    let mut groups: Vec<(&str, Vec<Condition>)> = Vec::new();
    for hop_filter in filters {
        let column = match table {
            Some(table) => SqlExpr::column(table, &hop_filter.column_name),
            None => SqlExpr::unqualified(&hop_filter.column_name),
        };
        let condition = filter_condition(&column, &hop_filter.filter)?;
        match groups
            .iter_mut()
            .find(|(name, _)| *name == hop_filter.column_name)
        {
            Some((_, conditions)) => conditions.push(condition),
            None => groups.push((&hop_filter.column_name, vec![condition])),
        }
    }

    Ok(Condition::all(
        groups
            .into_iter()
            .filter_map(|(_, conditions)| Condition::any(conditions))
            .collect(),
    ))
}
