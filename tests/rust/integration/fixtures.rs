use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracegraph::config::EngineConfig;
use tracegraph::sql_generator::{CompiledSql, DialectKind};
use tracegraph::trace_catalog::TraceCatalog;
use tracegraph::trace_engine::{
    ConditionProcess, EndProcess, ExecutionError, QueryResult, SqlExecutor, TraceRequest,
};

/// Machining(1) -serial- Assembly(2) -lot- Inspection(3)
///                       Assembly(2) -serial, time within 60 min- Packing(4)
pub const LINE_CATALOG: &str = r#"
name: line_a
processes:
  - id: 1
    name: Machining
    table_name: t_machining
    columns:
      - { id: 11, column_name: serial, data_type: TEXT, is_serial_no: true }
      - { id: 12, column_name: machined_at, data_type: DATETIME, is_get_date: true }
      - { id: 13, column_name: judge, data_type: TEXT }
  - id: 2
    name: Assembly
    table_name: t_assembly
    columns:
      - { id: 21, column_name: serial_no, data_type: TEXT, is_serial_no: true }
      - { id: 22, column_name: assembled_at, data_type: DATETIME, is_get_date: true }
      - { id: 23, column_name: lot_no, data_type: TEXT }
      - { id: 24, column_name: torque, data_type: REAL }
  - id: 3
    name: Inspection
    table_name: t_inspection
    row_id_column: rec_id
    columns:
      - { id: 31, column_name: lot_no, data_type: TEXT }
      - { id: 32, column_name: inspected_at, data_type: DATETIME, is_get_date: true }
      - { id: 33, column_name: result, data_type: TEXT }
    filters:
      - { id: 300, column_id: 33, function: MATCHES, values: [NG] }
  - id: 4
    name: Packing
    table_name: t_packing
    columns:
      - { id: 41, column_name: serial, data_type: TEXT }
      - { id: 42, column_name: packed_at, data_type: DATETIME, is_get_date: true }
      - { id: 43, column_name: box_id, data_type: TEXT }
edges:
  - self_process_id: 1
    target_process_id: 2
    keys:
      - { self_column_id: 11, target_column_id: 21 }
  - self_process_id: 2
    target_process_id: 3
    keys:
      - { self_column_id: 23, target_column_id: 31 }
  - self_process_id: 2
    target_process_id: 4
    keys:
      - { self_column_id: 21, target_column_id: 41 }
      - { self_column_id: 22, target_column_id: 42, delta_time: 60, cut_off: true }
"#;

pub fn line_catalog() -> TraceCatalog {
    TraceCatalog::from_yaml_str(LINE_CATALOG).unwrap()
}

pub fn config(dialect: DialectKind) -> EngineConfig {
    EngineConfig {
        dialect,
        ..EngineConfig::default()
    }
}

pub fn ts(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn request(start: i64, ends: &[(i64, &[i64])], policy: &str) -> TraceRequest {
    TraceRequest {
        start_process_id: start,
        end_processes: ends
            .iter()
            .map(|(process_id, columns)| EndProcess {
                process_id: *process_id,
                column_ids: columns.to_vec(),
            })
            .collect(),
        condition_processes: vec![],
        start_tm: ts(1, 0),
        end_tm: ts(8, 0),
        duplicate_policy: policy.to_string(),
    }
}

/// Inspection results `NG` via the catalog filter on column 33
pub fn with_ng_condition(mut request: TraceRequest) -> TraceRequest {
    request.condition_processes.push(ConditionProcess {
        process_id: 3,
        column_ids: vec![33],
        filters: vec![],
    });
    request
}

/// Replays queued results in order and records the statements it ran
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<QueryResult, ExecutionError>>>,
    statements: Mutex<Vec<CompiledSql>>,
}

impl ScriptedExecutor {
    pub fn new(responses: Vec<Result<QueryResult, ExecutionError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<CompiledSql> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for ScriptedExecutor {
    async fn run_sql(&self, statement: &CompiledSql) -> Result<QueryResult, ExecutionError> {
        self.statements.lock().unwrap().push(statement.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ExecutionError::query_error("no scripted result left")))
    }
}

pub fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
    QueryResult::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}
