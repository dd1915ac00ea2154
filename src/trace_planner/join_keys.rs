//! Join-key propagation: covering path -> ordered `JoinHop`s.
//!
//! Each hop knows which of its columns the previous hop joins on (inbound
//! link) and which columns the next hop joins on (outbound link). Hops are
//! ordered the way the CTE chain is built: start -> end for forward paths,
//! end -> start (discovery order) for backward paths.
//!
//! ## Time windows
//!
//! ```text
//! start process:   [start_tm, end_tm]
//! other processes: [start_tm - buffer, end_tm + buffer]
//!                  ∩ previous window shifted by each delta-time key that
//!                    links the two hops' timestamp columns
//! ```
//!
//! Delta keys on other temporal columns leave the buffered window alone;
//! the join condition alone enforces their band.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use super::errors::CompileError;
use super::path_merger::CoveringPath;
use crate::trace_catalog::{
    ColumnId, ConfigStore, Filter, Process, ProcessColumn, ProcessId, SubstringRange, TraceEdge,
};

/// Closed time range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn widened(&self, buffer: Duration) -> Self {
        Self {
            start: self.start - buffer,
            end: self.end + buffer,
        }
    }

    /// May produce `start > end`, which matches nothing
    pub fn intersect(&self, other: &TimeWindow) -> Self {
        Self {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        }
    }

    /// Range a linked row may fall in, given this window for the row it links from
    pub fn shifted_by_delta(&self, delta_minutes: i64, cut_off: bool) -> Self {
        let delta = Duration::minutes(delta_minutes);
        let spread = Duration::minutes(delta_minutes.abs());
        match (cut_off, delta_minutes >= 0) {
            (false, _) => Self {
                start: self.start - spread,
                end: self.end + spread,
            },
            (true, true) => Self {
                start: self.start,
                end: self.end + delta,
            },
            (true, false) => Self {
                start: self.start + delta,
                end: self.end,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

/// One join-key pair oriented along the chain (previous hop -> next hop)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkKey {
    pub prev_column: String,
    pub prev_substr: Option<SubstringRange>,
    pub next_column: String,
    pub next_substr: Option<SubstringRange>,
    /// Minutes, oriented previous -> next
    pub delta_time: Option<i64>,
    pub cut_off: bool,
}

impl LinkKey {
    /// Delta key relating the two hops' own timestamp columns
    pub fn is_time_delta(&self, prev_time_column: &str, next_time_column: &str) -> bool {
        self.delta_time.is_some()
            && self.prev_substr.is_none()
            && self.next_substr.is_none()
            && self.prev_column == prev_time_column
            && self.next_column == next_time_column
    }
}

/// How a hop joins to its neighbour
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HopLink {
    TraceKeys(Vec<LinkKey>),
    /// Same process on both sides: join on the row identifier
    SameRow,
}

impl HopLink {
    pub fn keys(&self) -> &[LinkKey] {
        match self {
            HopLink::TraceKeys(keys) => keys,
            HopLink::SameRow => &[],
        }
    }
}

/// A condition filter with its physical column resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HopFilter {
    pub column_name: String,
    pub filter: Filter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinHop {
    pub process_id: ProcessId,
    pub table_name: String,
    pub row_id_column: String,
    pub time_column: String,
    /// Exposes row id, time and requested columns in the result
    pub keep: bool,
    /// Requested columns; empty for pass-through hops
    pub selected_columns: Vec<ProcessColumn>,
    /// Duplicate-serial key columns, start hop only
    pub dup_key_columns: Vec<String>,
    /// Inbound link from the previous hop
    pub link: Option<HopLink>,
    /// Outbound link to the next hop; `None` on the terminal hop
    pub next_link: Option<HopLink>,
    /// Earlier hop index of the same process, correlated by row identifier
    pub same_row_as: Option<usize>,
    pub window: TimeWindow,
    pub filters: Vec<HopFilter>,
    pub is_start: bool,
}

impl JoinHop {
    pub fn is_terminal(&self) -> bool {
        self.next_link.is_none()
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Columns this hop must expose for its inbound and outbound joins
    pub fn link_columns(&self) -> Vec<&str> {
        let inbound = self
            .link
            .iter()
            .flat_map(|l| l.keys())
            .map(|k| k.next_column.as_str());
        let outbound = self
            .next_link
            .iter()
            .flat_map(|l| l.keys())
            .map(|k| k.prev_column.as_str());
        let mut columns: Vec<&str> = Vec::new();
        for column in inbound.chain(outbound) {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }
}

/// Request-scoped inputs of the propagator
#[derive(Debug, Clone)]
pub struct HopContext<'a> {
    pub start_process_id: ProcessId,
    pub window: TimeWindow,
    pub time_buffer: Duration,
    pub requested_columns: &'a HashMap<ProcessId, Vec<ColumnId>>,
    pub condition_filters: &'a HashMap<ProcessId, Vec<Filter>>,
}

/// Orient the keys of the edge between `prev` and `next` along the chain.
///
/// Tries `prev -> next` first, then `next -> prev` with sides swapped and the
/// delta sign flipped.
pub fn resolve_link_keys(
    edges: &[TraceEdge],
    prev: &Process,
    next: &Process,
) -> Result<Vec<LinkKey>, CompileError> {
    let context = |edge: &TraceEdge| {
        format!(
            "\n  Context: trace edge {} -> {}",
            edge.self_process_id, edge.target_process_id
        )
    };

    if let Some(edge) = edges
        .iter()
        .find(|e| e.self_process_id == prev.id && e.target_process_id == next.id)
    {
        if edge.keys.is_empty() {
            return Err(CompileError::EmptyTraceKeys {
                from: prev.id,
                to: next.id,
            });
        }
        return edge
            .keys
            .iter()
            .map(|key| {
                if key.delta_time.is_some() {
                    check_delta_column(prev, key.self_column_id)?;
                    check_delta_column(next, key.target_column_id)?;
                }
                Ok(LinkKey {
                    prev_column: key_column(prev, key.self_column_id, &context(edge))?,
                    prev_substr: checked_substr(prev, key.self_column_id, key.self_substr)?,
                    next_column: key_column(next, key.target_column_id, &context(edge))?,
                    next_substr: checked_substr(next, key.target_column_id, key.target_substr)?,
                    delta_time: key.delta_time,
                    cut_off: key.cut_off,
                })
            })
            .collect();
    }

    if let Some(edge) = edges
        .iter()
        .find(|e| e.self_process_id == next.id && e.target_process_id == prev.id)
    {
        if edge.keys.is_empty() {
            return Err(CompileError::EmptyTraceKeys {
                from: next.id,
                to: prev.id,
            });
        }
        return edge
            .keys
            .iter()
            .map(|key| {
                if key.delta_time.is_some() {
                    check_delta_column(prev, key.target_column_id)?;
                    check_delta_column(next, key.self_column_id)?;
                }
                Ok(LinkKey {
                    prev_column: key_column(prev, key.target_column_id, &context(edge))?,
                    prev_substr: checked_substr(prev, key.target_column_id, key.target_substr)?,
                    next_column: key_column(next, key.self_column_id, &context(edge))?,
                    next_substr: checked_substr(next, key.self_column_id, key.self_substr)?,
                    delta_time: key.delta_time.map(|d| -d),
                    cut_off: key.cut_off,
                })
            })
            .collect();
    }

    Err(CompileError::MissingTraceEdge {
        from: prev.id,
        to: next.id,
    })
}

fn key_column(process: &Process, column_id: ColumnId, context: &str) -> Result<String, CompileError> {
    process
        .column_opt(column_id)
        .map(|c| c.column_name.clone())
        .ok_or_else(|| CompileError::UnknownColumn {
            process_id: process.id,
            column_id,
            context: context.to_string(),
        })
}

/// Delta keys compare timestamps; unknown columns are reported by `key_column`
fn check_delta_column(process: &Process, column_id: ColumnId) -> Result<(), CompileError> {
    match process.column_opt(column_id) {
        Some(column) if !column.data_type.is_temporal() => Err(CompileError::InvalidDeltaKey {
            process_id: process.id,
            column_id,
        }),
        _ => Ok(()),
    }
}

fn checked_substr(
    process: &Process,
    column_id: ColumnId,
    range: Option<SubstringRange>,
) -> Result<Option<SubstringRange>, CompileError> {
    match range {
        Some(r) if !r.is_valid() => Err(CompileError::InvalidSubstring {
            column: process
                .column_opt(column_id)
                .map(|c| c.column_name.clone())
                .unwrap_or_default(),
            from: r.from,
            to: r.to,
        }),
        other => Ok(other),
    }
}

/// Build the ordered hop list for one covering path
pub fn build_join_hops(
    store: &dyn ConfigStore,
    covering: &CoveringPath,
    ctx: &HopContext<'_>,
) -> Result<Vec<JoinHop>, CompileError> {
    if covering.path.is_empty() {
        return Err(CompileError::EmptyPath);
    }
    let order: Vec<ProcessId> = if covering.path.is_forward {
        covering.path.processes.clone()
    } else {
        covering.path.discovery_order()
    };
    let edges = store.get_trace_edges();

    let mut hops: Vec<JoinHop> = Vec::with_capacity(order.len());
    let mut first_seen: HashMap<ProcessId, usize> = HashMap::new();

    for (index, &process_id) in order.iter().enumerate() {
        let process = store.get_process(process_id)?;
        let time_column = process.time_column()?.column_name.clone();
        let earlier = first_seen.get(&process_id).copied();
        let is_first_occurrence = earlier.is_none();
        let is_start = process_id == ctx.start_process_id;

        let link = match index {
            0 => None,
            _ => {
                let prev_id = order[index - 1];
                if prev_id == process_id {
                    Some(HopLink::SameRow)
                } else {
                    let prev = store.get_process(prev_id)?;
                    Some(HopLink::TraceKeys(resolve_link_keys(edges, prev, process)?))
                }
            }
        };
        let same_row_as = earlier.filter(|&j| j + 1 != index);

        let keep = is_first_occurrence && covering.short_procs.contains(&process_id);
        let selected_columns = if keep {
            ctx.requested_columns
                .get(&process_id)
                .map(|ids| {
                    ids.iter()
                        .map(|&id| process.column(id).cloned())
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let dup_key_columns = if is_start && is_first_occurrence {
            let serials: Vec<String> = process
                .serial_columns()
                .into_iter()
                .map(|c| c.column_name.clone())
                .collect();
            if serials.is_empty() {
                vec![process.row_id_column.clone()]
            } else {
                serials
            }
        } else {
            Vec::new()
        };

        let filters = if is_first_occurrence {
            ctx.condition_filters
                .get(&process_id)
                .map(|filters| {
                    filters
                        .iter()
                        .map(|f| {
                            Ok(HopFilter {
                                column_name: process.column(f.column_id)?.column_name.clone(),
                                filter: f.clone(),
                            })
                        })
                        .collect::<Result<Vec<_>, CompileError>>()
                })
                .transpose()?
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut window = if is_start {
            ctx.window
        } else {
            ctx.window.widened(ctx.time_buffer)
        };
        if let (Some(HopLink::TraceKeys(keys)), Some(prev_hop)) = (&link, hops.last()) {
            for key in keys {
                if !key.is_time_delta(&prev_hop.time_column, &time_column) {
                    continue;
                }
                if let Some(delta) = key.delta_time {
                    window = window.intersect(&prev_hop.window.shifted_by_delta(delta, key.cut_off));
                }
            }
        }

        log::trace!(
            "hop {} process {} window [{}, {}] link={:?}",
            index,
            process_id,
            window.start,
            window.end,
            link
        );

        if let Some(prev_hop) = hops.last_mut() {
            prev_hop.next_link = link.clone();
        }
        first_seen.entry(process_id).or_insert(index);

        hops.push(JoinHop {
            process_id,
            table_name: process.table_name.clone(),
            row_id_column: process.row_id_column.clone(),
            time_column,
            keep,
            selected_columns,
            dup_key_columns,
            link,
            next_link: None,
            same_row_as,
            window,
            filters,
            is_start,
        });
    }

    Ok(hops)
}
