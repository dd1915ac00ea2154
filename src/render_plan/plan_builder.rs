//! Hop list -> [`SqlStatement`].
//!
//! ```text
//! WITH proc_1_cte_0 AS (SELECT id, time, serial FROM t1 WHERE time window AND filters),
//!      proc_2_cte_1 AS (...),
//!      [trace_joined AS (SELECT labels, ROW_NUMBER() OVER (...), COUNT(*) OVER ()
//!                        FROM proc_1_cte_0 INNER JOIN proc_2_cte_1 ON ...)]
//! SELECT labels FROM proc_1_cte_0 INNER JOIN proc_2_cte_1 ON ... ORDER BY time labels
//! ```
//!
//! Three terminal renderings share the same CTE chain:
//! - row-selecting (`KeepAll` / `PostHoc`)
//! - window (`WindowFunction`): joined CTE filtered to `__row_number__ = 1`
//! - count-only (`for_count`): `SELECT DISTINCT` start row id + duplicate key

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::duplicate_policy::DedupStrategy;
use super::errors::{GraphError, RenderBuildError};
use super::filter_builder::build_hop_filter;
use super::{
    Condition, Cte, Join, JoinType, OrderByItem, PlannerHint, SelectItem, SelectQuery, SortOrder,
    SqlExpr, SqlStatement,
};
use crate::trace_planner::{HopLink, JoinHop, LinkKey, TimeWindow};
use crate::utils::column_naming::{
    column_label, column_label_with_id, cte_name, row_id_label, time_label, ACTUAL_COUNT_COLUMN,
    JOINED_CTE_NAME, ROW_NUMBER_COLUMN,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One covering path ready to render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPlan {
    pub hops: Vec<JoinHop>,
    pub strategy: DedupStrategy,
    pub for_count: bool,
    pub is_forward: bool,
    pub disable_nested_loop: bool,
}

impl CompiledPlan {
    pub fn start_hop(&self) -> Result<(usize, &JoinHop), RenderBuildError> {
        self.hops
            .iter()
            .enumerate()
            .find(|(_, hop)| hop.is_start && !hop.dup_key_columns.is_empty())
            .ok_or(RenderBuildError::MissingStartHop)
    }

    /// Result labels of the duplicate key
    pub fn dup_key_labels(&self) -> Result<Vec<String>, RenderBuildError> {
        let (_, start) = self.start_hop()?;
        Ok(start
            .dup_key_columns
            .iter()
            .map(|column| dup_key_label(start, column))
            .collect())
    }

    /// Time labels of every kept hop, start first
    pub fn time_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .hops
            .iter()
            .filter(|hop| hop.is_start && hop.keep)
            .chain(self.hops.iter().filter(|hop| !hop.is_start && hop.keep))
            .map(|hop| time_label(hop.process_id))
            .collect();
        labels.dedup();
        labels
    }

    fn needs_planner_hint(&self) -> bool {
        self.disable_nested_loop
            && (self.strategy.is_window() || self.hops.iter().any(JoinHop::has_filters))
    }
}

fn dup_key_label(start: &JoinHop, column: &str) -> String {
    if column == start.row_id_column {
        row_id_label(start.process_id)
    } else {
        column_label(column, start.process_id)
    }
}

fn format_timestamp(window: &TimeWindow) -> (String, String) {
    (
        window.start.format(TIMESTAMP_FORMAT).to_string(),
        window.end.format(TIMESTAMP_FORMAT).to_string(),
    )
}

fn push_unique<'a>(names: &mut Vec<&'a str>, name: &'a str) {
    if !names.contains(&name) {
        names.push(name);
    }
}

/// CTE reading one process table within its window
fn hop_cte(index: usize, hop: &JoinHop) -> Result<Cte, RenderBuildError> {
    let mut columns: Vec<&str> = Vec::new();
    push_unique(&mut columns, &hop.row_id_column);
    push_unique(&mut columns, &hop.time_column);
    for column in &hop.selected_columns {
        push_unique(&mut columns, &column.column_name);
    }
    for column in hop.link_columns() {
        push_unique(&mut columns, column);
    }
    for column in &hop.dup_key_columns {
        push_unique(&mut columns, column);
    }

    let (start, end) = format_timestamp(&hop.window);
    let time = SqlExpr::unqualified(&hop.time_column);
    let mut conditions = vec![
        Condition::Ge(time.clone(), SqlExpr::param(start)),
        Condition::Le(time, SqlExpr::param(end)),
    ];
    if let Some(filter) = build_hop_filter(None, &hop.filters)? {
        conditions.push(filter);
    }

    Ok(Cte {
        cte_name: cte_name(hop.process_id, index),
        query: SelectQuery {
            items: columns
                .into_iter()
                .map(|c| SelectItem::bare(SqlExpr::unqualified(c)))
                .collect(),
            from: hop.table_name.clone(),
            filters: Condition::all(conditions),
            ..Default::default()
        },
    })
}

fn key_side(table: &str, column: &str, substr: Option<crate::trace_catalog::SubstringRange>) -> SqlExpr {
    let expr = SqlExpr::column(table, column);
    match substr {
        Some(range) => SqlExpr::Substring {
            expr: Box::new(expr),
            from: range.from,
            length: range.length(),
        },
        None => expr,
    }
}

fn add_minutes(expr: &SqlExpr, minutes: i64) -> SqlExpr {
    SqlExpr::AddMinutes {
        expr: Box::new(expr.clone()),
        minutes,
    }
}

/// Join condition(s) for one link key.
///
/// Plain keys compare for equality. A delta key bounds the two timestamps
/// to less than `delta` minutes apart, on both sides, or with `cut_off` only
/// in the delta's direction:
///
/// ```text
/// no cut_off:         prev - |d| <  next <  prev + |d|
/// cut_off, d >= 0:    prev       <= next <  prev + d
/// cut_off, d <  0:    prev + d   <  next <= prev
/// ```
fn key_conditions(prev_table: &str, next_table: &str, key: &LinkKey) -> Vec<Condition> {
    let prev = key_side(prev_table, &key.prev_column, key.prev_substr);
    let next = key_side(next_table, &key.next_column, key.next_substr);
    match key.delta_time {
        None => vec![Condition::Eq(next, prev)],
        Some(delta) if !key.cut_off => vec![
            Condition::Gt(next.clone(), add_minutes(&prev, -delta.abs())),
            Condition::Lt(next, add_minutes(&prev, delta.abs())),
        ],
        Some(delta) if delta >= 0 => vec![
            Condition::Ge(next.clone(), prev.clone()),
            Condition::Lt(next, add_minutes(&prev, delta)),
        ],
        Some(delta) => vec![
            Condition::Gt(next.clone(), add_minutes(&prev, delta)),
            Condition::Le(next, prev),
        ],
    }
}

fn hop_join(hops: &[JoinHop], index: usize) -> Join {
    let hop = &hops[index];
    let table = cte_name(hop.process_id, index);
    let prev_hop = &hops[index - 1];
    let prev_table = cte_name(prev_hop.process_id, index - 1);

    let mut joining_on = match &hop.link {
        Some(HopLink::SameRow) => vec![Condition::Eq(
            SqlExpr::column(&table, &hop.row_id_column),
            SqlExpr::column(&prev_table, &prev_hop.row_id_column),
        )],
        Some(HopLink::TraceKeys(keys)) => keys
            .iter()
            .flat_map(|key| key_conditions(&prev_table, &table, key))
            .collect(),
        None => Vec::new(),
    };
    if let Some(earlier) = hop.same_row_as {
        let earlier_hop = &hops[earlier];
        joining_on.push(Condition::Eq(
            SqlExpr::column(&table, &hop.row_id_column),
            SqlExpr::column(
                &cte_name(earlier_hop.process_id, earlier),
                &earlier_hop.row_id_column,
            ),
        ));
    }

    Join {
        table_name: table,
        join_type: JoinType::Inner,
        joining_on,
    }
}

/// Order joins so each one only references tables already in scope.
///
/// Greedy: repeatedly emit every join whose dependencies are satisfied.
/// Fails when a pass makes no progress.
pub fn topo_sort_joins(from: &str, joins: Vec<Join>) -> Result<Vec<Join>, GraphError> {
    let mut available: HashSet<String> = HashSet::from([from.to_string()]);
    let mut ordered: Vec<Join> = Vec::new();
    let mut remaining = joins;

    while !remaining.is_empty() {
        let before = remaining.len();
        let mut next_remaining = Vec::new();

        for join in remaining {
            if join.dependencies().is_subset(&available) {
                available.insert(join.table_name.clone());
                ordered.push(join);
            } else {
                next_remaining.push(join);
            }
        }

        remaining = next_remaining;
        if remaining.len() == before {
            let stuck: Vec<_> = remaining
                .iter()
                .map(|j| {
                    let mut missing: Vec<_> =
                        j.dependencies().difference(&available).cloned().collect();
                    missing.sort();
                    format!("'{}' needs {:?}", j.table_name, missing)
                })
                .collect();
            return Err(GraphError {
                message: stuck.join(", "),
            });
        }
    }

    Ok(ordered)
}

/// Labelled result columns of the joined chain.
///
/// A requested column whose plain label belongs to another column of the
/// same hop (a column literally named `time` or `row_id`) is relabelled
/// with its column id.
fn output_items(plan: &CompiledPlan) -> Result<Vec<SelectItem>, RenderBuildError> {
    let (start_index, start) = plan.start_hop()?;
    let mut ordered: Vec<(usize, &JoinHop)> = vec![(start_index, start)];
    ordered.extend(
        plan.hops
            .iter()
            .enumerate()
            .filter(|(i, hop)| *i != start_index && hop.keep),
    );

    let mut items: Vec<SelectItem> = Vec::new();
    // label -> (table, column) it was taken for
    let mut taken: HashMap<String, (String, String)> = HashMap::new();
    let mut push = |table: &str, column: &str, label: String| -> bool {
        match taken.get(&label) {
            Some((t, c)) => t == table && c == column,
            None => {
                taken.insert(label.clone(), (table.to_string(), column.to_string()));
                items.push(SelectItem::aliased(SqlExpr::column(table, column), label));
                true
            }
        }
    };

    for (index, hop) in ordered {
        let table = cte_name(hop.process_id, index);
        push(&table, &hop.row_id_column, row_id_label(hop.process_id));
        push(&table, &hop.time_column, time_label(hop.process_id));
        for column in &hop.dup_key_columns {
            push(&table, column, dup_key_label(hop, column));
        }
        for column in &hop.selected_columns {
            let name = &column.column_name;
            if push(&table, name, column_label(name, hop.process_id)) {
                continue;
            }
            let label = column_label_with_id(name, column.id, hop.process_id);
            if !push(&table, name, label.clone()) {
                return Err(RenderBuildError::LabelCollision {
                    label,
                    process_id: hop.process_id,
                });
            }
        }
    }
    Ok(items)
}

fn time_order(plan: &CompiledPlan) -> Vec<OrderByItem> {
    plan.time_labels()
        .iter()
        .map(|label| OrderByItem {
            expression: SqlExpr::unqualified(label),
            order: SortOrder::Asc,
        })
        .collect()
}

/// Render one compiled plan into the backend-neutral AST
pub fn build_statement(plan: &CompiledPlan) -> Result<SqlStatement, RenderBuildError> {
    let Some(first) = plan.hops.first() else {
        return Err(RenderBuildError::MissingHops);
    };
    let (start_index, start) = plan.start_hop()?;
    let start_table = cte_name(start.process_id, start_index);

    let mut ctes = plan
        .hops
        .iter()
        .enumerate()
        .map(|(index, hop)| hop_cte(index, hop))
        .collect::<Result<Vec<_>, _>>()?;

    let from = cte_name(first.process_id, 0);
    let joins = topo_sort_joins(
        &from,
        (1..plan.hops.len()).map(|i| hop_join(&plan.hops, i)).collect(),
    )?;

    let hints = if plan.needs_planner_hint() {
        vec![PlannerHint::DisableNestedLoop]
    } else {
        Vec::new()
    };

    let dup_key_exprs: Vec<SqlExpr> = start
        .dup_key_columns
        .iter()
        .map(|column| SqlExpr::column(&start_table, column))
        .collect();

    let body = if plan.for_count {
        let mut items = vec![SelectItem::aliased(
            SqlExpr::column(&start_table, &start.row_id_column),
            row_id_label(start.process_id),
        )];
        for column in &start.dup_key_columns {
            let label = dup_key_label(start, column);
            if items.iter().all(|item| item.output_name() != Some(label.as_str())) {
                items.push(SelectItem::aliased(
                    SqlExpr::column(&start_table, column),
                    label,
                ));
            }
        }
        SelectQuery {
            distinct: true,
            items,
            from,
            joins,
            ..Default::default()
        }
    } else if let DedupStrategy::WindowFunction { order } = plan.strategy {
        let labels = output_items(plan)?;
        let mut joined_items = labels.clone();
        joined_items.push(SelectItem::aliased(
            SqlExpr::RowNumber {
                partition_by: dup_key_exprs,
                order_by: vec![
                    OrderByItem {
                        expression: SqlExpr::column(&start_table, &start.time_column),
                        order,
                    },
                    OrderByItem {
                        expression: SqlExpr::column(&start_table, &start.row_id_column),
                        order,
                    },
                ],
            },
            ROW_NUMBER_COLUMN,
        ));
        joined_items.push(SelectItem::aliased(SqlExpr::CountOver, ACTUAL_COUNT_COLUMN));
        ctes.push(Cte {
            cte_name: JOINED_CTE_NAME.to_string(),
            query: SelectQuery {
                items: joined_items,
                from,
                joins,
                ..Default::default()
            },
        });

        let mut items: Vec<SelectItem> = labels
            .iter()
            .filter_map(SelectItem::output_name)
            .map(|label| SelectItem::bare(SqlExpr::unqualified(label)))
            .collect();
        items.push(SelectItem::bare(SqlExpr::unqualified(ACTUAL_COUNT_COLUMN)));
        SelectQuery {
            items,
            from: JOINED_CTE_NAME.to_string(),
            filters: Some(Condition::Eq(
                SqlExpr::unqualified(ROW_NUMBER_COLUMN),
                SqlExpr::Integer(1),
            )),
            order_by: time_order(plan),
            ..Default::default()
        }
    } else {
        SelectQuery {
            items: output_items(plan)?,
            from,
            joins,
            order_by: time_order(plan),
            ..Default::default()
        }
    };

    log::trace!(
        "Built statement: {} CTE(s), {} join(s), hints={:?}",
        ctes.len(),
        body.joins.len(),
        hints
    );

    Ok(SqlStatement { hints, ctes, body })
}
