//! Request orchestration: covering paths -> compiled SQL -> execution ->
//! merged table and record counts.
//!
//! ```text
//! TraceRequest
//!   -> get_common_longest_paths      (no path: empty result, zero counts)
//!   -> build_join_hops / build_statement / render_statement   per path
//!   -> SqlExecutor::run_sql          sequential, one (+1 count) per path
//!   -> merge_on_row_id -> dedup policy -> sort by hop time labels
//! ```
//!
//! Count-only statements are compiled for the paths through a condition
//! process, or for every path when the request has no condition process.
//!
//! ```text
//! unique = |distinct dup keys of (start rows of path 1 ∪ ... ∪ path n)|
//! ```

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

pub mod clickhouse_executor;
pub mod errors;
pub mod executor;
pub mod merge;

pub use clickhouse_executor::ClickHouseExecutor;
pub use errors::{ExecutionError, TraceError};
pub use executor::{QueryResult, SqlExecutor};

use crate::config::{ConfigError, EngineConfig};
use crate::render_plan::duplicate_policy::{resolve_strategy, unique_count_across_paths};
use crate::render_plan::{build_statement, CompiledPlan, DedupStrategy, DuplicatePolicy};
use crate::sql_generator::{render_statement, CompiledSql, DialectKind};
use crate::trace_catalog::{ColumnId, ConfigStore, Filter, ProcessId};
use crate::trace_planner::{
    build_join_hops, get_common_longest_paths, CoveringPath, HopContext, TimeWindow, TraceGraph,
};
use crate::utils::column_naming::{row_id_label, time_label, ACTUAL_COUNT_COLUMN};

fn default_policy() -> String {
    DuplicatePolicy::ShowBoth.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndProcess {
    pub process_id: ProcessId,
    #[serde(default)]
    pub column_ids: Vec<ColumnId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionProcess {
    pub process_id: ProcessId,
    /// Columns whose configured filters apply; also selected
    #[serde(default)]
    pub column_ids: Vec<ColumnId>,
    /// Filters given inline with the request
    #[serde(default)]
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRequest {
    pub start_process_id: ProcessId,
    #[serde(default)]
    pub end_processes: Vec<EndProcess>,
    #[serde(default)]
    pub condition_processes: Vec<ConditionProcess>,
    pub start_tm: NaiveDateTime,
    pub end_tm: NaiveDateTime,
    /// `SHOW_BOTH`, `SHOW_FIRST` or `SHOW_LAST`
    #[serde(default = "default_policy")]
    pub duplicate_policy: String,
}

impl TraceRequest {
    fn validate(&self) -> Result<(), TraceError> {
        if self.start_tm > self.end_tm {
            return Err(TraceError::InvalidRequest(format!(
                "start_tm {} is after end_tm {}",
                self.start_tm, self.end_tm
            )));
        }
        Ok(())
    }

    /// End and condition processes, request order, without repeats
    pub fn target_processes(&self) -> Vec<ProcessId> {
        let mut seen = HashSet::new();
        self.end_processes
            .iter()
            .map(|e| e.process_id)
            .chain(self.condition_processes.iter().map(|c| c.process_id))
            .filter(|p| seen.insert(*p))
            .collect()
    }

    fn requested_columns(&self) -> HashMap<ProcessId, Vec<ColumnId>> {
        let mut requested: HashMap<ProcessId, Vec<ColumnId>> = HashMap::new();
        let all = self
            .end_processes
            .iter()
            .map(|e| (e.process_id, &e.column_ids))
            .chain(
                self.condition_processes
                    .iter()
                    .map(|c| (c.process_id, &c.column_ids)),
            );
        for (process_id, column_ids) in all {
            let columns = requested.entry(process_id).or_default();
            for id in column_ids {
                if !columns.contains(id) {
                    columns.push(*id);
                }
            }
        }
        requested
    }
}

/// One covering path with its rendered statements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPath {
    pub covering: CoveringPath,
    pub plan: CompiledPlan,
    pub statement: CompiledSql,
    /// Count-only statement, post-hoc dedup on counted paths only
    pub count_statement: Option<CompiledSql>,
}

/// Everything compiled for one request, without executing it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracePlanSet {
    pub policy: DuplicatePolicy,
    pub strategy: DedupStrategy,
    pub dialect: DialectKind,
    pub start_row_id_label: String,
    pub start_time_label: String,
    pub dup_key_labels: Vec<String>,
    /// Final sort order, start first
    pub time_labels: Vec<String>,
    pub paths: Vec<CompiledPath>,
}

impl TracePlanSet {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceResult {
    pub table: QueryResult,
    pub actual_record_number: usize,
    pub unique_record_number: usize,
    pub compiled: TracePlanSet,
}

/// Window counts arrive as numbers or, from ClickHouse, as quoted 64-bit integers
fn value_as_count(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub struct TraceEngine<'a> {
    store: &'a dyn ConfigStore,
    config: EngineConfig,
}

impl<'a> TraceEngine<'a> {
    pub fn new(store: &'a dyn ConfigStore, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Covering paths for a request; empty when some target cannot be linked
    pub fn covering_paths(&self, request: &TraceRequest) -> Vec<CoveringPath> {
        let start = request.start_process_id;
        let targets = request.target_processes();
        if targets.iter().all(|&p| p == start) {
            return vec![CoveringPath::start_only(start)];
        }
        let required: HashSet<ProcessId> = targets.iter().copied().collect();
        let graph = TraceGraph::new(self.store.get_trace_edges())
            .with_max_path_length(self.config.max_path_length);
        get_common_longest_paths(&graph, start, &targets, &required)
    }

    pub fn compile(&self, request: &TraceRequest) -> Result<TracePlanSet, TraceError> {
        self.config.validate().map_err(ConfigError::from)?;
        request.validate()?;
        let policy: DuplicatePolicy = request.duplicate_policy.parse()?;
        let start = request.start_process_id;
        self.store.get_process(start)?;

        let requested = request.requested_columns();
        let mut condition_filters: HashMap<ProcessId, Vec<Filter>> = HashMap::new();
        for condition in &request.condition_processes {
            let mut filters = self
                .store
                .get_condition_filters(condition.process_id, &condition.column_ids);
            filters.extend(condition.filters.iter().cloned());
            if !filters.is_empty() {
                condition_filters
                    .entry(condition.process_id)
                    .or_default()
                    .extend(filters);
            }
        }

        let condition_ids: HashSet<ProcessId> = request
            .condition_processes
            .iter()
            .map(|c| c.process_id)
            .collect();
        let covering = self.covering_paths(request);
        let strategy = resolve_strategy(policy, !condition_ids.is_empty(), covering.len());
        let dialect = self.config.dialect.dialect();
        let ctx = HopContext {
            start_process_id: start,
            window: TimeWindow::new(request.start_tm, request.end_tm),
            time_buffer: self.config.time_buffer(),
            requested_columns: &requested,
            condition_filters: &condition_filters,
        };

        log::debug!(
            "Trace {} -> {:?}: {} covering path(s), strategy {:?}",
            start,
            request.target_processes(),
            covering.len(),
            strategy
        );

        let mut paths = Vec::with_capacity(covering.len());
        for covering in covering {
            let plan = CompiledPlan {
                hops: build_join_hops(self.store, &covering, &ctx)?,
                strategy,
                for_count: false,
                is_forward: covering.is_forward(),
                disable_nested_loop: self.config.disable_nested_loop,
            };
            let statement = render_statement(&build_statement(&plan)?, dialect);
            let counted = condition_ids.is_empty() || covering.contains_any(&condition_ids);
            let count_statement = if strategy.needs_count_statements() && counted {
                let count_plan = CompiledPlan {
                    for_count: true,
                    ..plan.clone()
                };
                Some(render_statement(&build_statement(&count_plan)?, dialect))
            } else {
                None
            };
            log::debug!(
                "Path {:?} (forward={}):\n{}",
                covering.path.processes,
                covering.is_forward(),
                statement.sql
            );
            paths.push(CompiledPath {
                covering,
                plan,
                statement,
                count_statement,
            });
        }

        let dup_key_labels = match paths.first() {
            Some(path) => path.plan.dup_key_labels()?,
            None => Vec::new(),
        };
        let mut time_labels: Vec<String> = Vec::new();
        for label in paths.iter().flat_map(|p| p.plan.time_labels()) {
            if !time_labels.contains(&label) {
                time_labels.push(label);
            }
        }

        Ok(TracePlanSet {
            policy,
            strategy,
            dialect: self.config.dialect,
            start_row_id_label: row_id_label(start),
            start_time_label: time_label(start),
            dup_key_labels,
            time_labels,
            paths,
        })
    }

    /// Compile, execute every path sequentially and merge.
    ///
    /// Any failure aborts the whole request; no partial result is returned.
    pub async fn run(
        &self,
        request: &TraceRequest,
        executor: &dyn SqlExecutor,
    ) -> Result<TraceResult, TraceError> {
        let compiled = self.compile(request)?;
        if compiled.is_empty() {
            log::debug!("No covering path; returning empty result");
            return Ok(TraceResult {
                table: QueryResult::default(),
                actual_record_number: 0,
                unique_record_number: 0,
                compiled,
            });
        }

        let mut tables = Vec::with_capacity(compiled.paths.len());
        for path in &compiled.paths {
            tables.push(executor.run_sql(&path.statement).await?);
        }

        let (mut table, actual, unique) = match compiled.strategy {
            DedupStrategy::KeepAll => {
                let merged = merge::merge_on_row_id(tables, &compiled.start_row_id_label)?;
                let unique = merge::count_distinct(&merged, &compiled.dup_key_labels)?;
                let actual = merged.len();
                (merged, actual, unique)
            }
            DedupStrategy::WindowFunction { .. } => {
                let mut actual = 0;
                for table in &tables {
                    if let Some(count) = table
                        .column_values(ACTUAL_COUNT_COLUMN)?
                        .first()
                        .and_then(|v| value_as_count(v))
                    {
                        actual = actual.max(count);
                    }
                }
                let mut merged = merge::merge_on_row_id(tables, &compiled.start_row_id_label)?;
                merged.remove_column(ACTUAL_COUNT_COLUMN);
                let unique = merged.len();
                (merged, actual, unique)
            }
            DedupStrategy::PostHoc { order } => {
                let mut merged = merge::merge_on_row_id(tables, &compiled.start_row_id_label)?;
                let actual = merged.len();
                merge::dedup_by_key(
                    &mut merged,
                    &compiled.dup_key_labels,
                    &[
                        compiled.start_time_label.as_str(),
                        compiled.start_row_id_label.as_str(),
                    ],
                    order,
                )?;

                let mut per_path = Vec::new();
                for path in &compiled.paths {
                    if let Some(count_statement) = &path.count_statement {
                        let counted = executor.run_sql(count_statement).await?;
                        per_path.push(merge::count_rows(
                            &counted,
                            &compiled.start_row_id_label,
                            &compiled.dup_key_labels,
                        )?);
                    }
                }
                (merged, actual, unique_count_across_paths(&per_path))
            }
        };

        merge::sort_by_labels(&mut table, &compiled.time_labels);
        log::debug!(
            "Trace result: {} row(s), actual={}, unique={}",
            table.len(),
            actual,
            unique
        );

        Ok(TraceResult {
            table,
            actual_record_number: actual,
            unique_record_number: unique,
            compiled,
        })
    }
}
