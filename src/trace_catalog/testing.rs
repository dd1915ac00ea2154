//! Catalog fixtures for unit tests.
//!
//! Every fixture process `p` has the same column layout so tests can refer
//! to columns by arithmetic instead of lookups:
//!
//! | column id   | name     | type     | flags        |
//! |-------------|----------|----------|--------------|
//! | `p*10 + 1`  | `serial` | TEXT     | serial no    |
//! | `p*10 + 2`  | `time`   | DATETIME | get date     |
//! | `p*10 + 3`  | `lot`    | TEXT     |              |
//! | `p*10 + 4`  | `value`  | REAL     |              |
//! | `p*10 + 5`  | `stamp`  | DATETIME |              |

use super::{
    Filter, Process, ProcessColumn, ProcessId, RawDataType, TraceCatalogConfig, TraceCatalog,
    TraceEdge, TraceKey,
};

pub fn serial_col(p: ProcessId) -> i64 {
    p * 10 + 1
}

pub fn time_col(p: ProcessId) -> i64 {
    p * 10 + 2
}

pub fn lot_col(p: ProcessId) -> i64 {
    p * 10 + 3
}

pub fn value_col(p: ProcessId) -> i64 {
    p * 10 + 4
}

/// Temporal column that is not the process timestamp
pub fn stamp_col(p: ProcessId) -> i64 {
    p * 10 + 5
}

fn column(id: i64, name: &str, data_type: RawDataType) -> ProcessColumn {
    ProcessColumn {
        id,
        column_name: name.to_string(),
        name: None,
        data_type,
        is_serial_no: false,
        is_get_date: false,
    }
}

pub fn process(p: ProcessId) -> Process {
    let mut serial = column(serial_col(p), "serial", RawDataType::Text);
    serial.is_serial_no = true;
    let mut time = column(time_col(p), "time", RawDataType::Datetime);
    time.is_get_date = true;
    Process {
        id: p,
        name: format!("Process {}", p),
        table_name: format!("t_proc_{}", p),
        row_id_column: "id".to_string(),
        columns: vec![
            serial,
            time,
            column(lot_col(p), "lot", RawDataType::Text),
            column(value_col(p), "value", RawDataType::Real),
            column(stamp_col(p), "stamp", RawDataType::Datetime),
        ],
        filters: vec![],
    }
}

/// Edge `a -> b` joined on both serial columns
pub fn serial_edge(a: ProcessId, b: ProcessId) -> TraceEdge {
    TraceEdge::new(a, b, vec![TraceKey::new(serial_col(a), serial_col(b))])
}

/// Edge `a -> b` joined on both lot columns
pub fn lot_edge(a: ProcessId, b: ProcessId) -> TraceEdge {
    TraceEdge::new(a, b, vec![TraceKey::new(lot_col(a), lot_col(b))])
}

pub fn catalog(processes: &[ProcessId], edges: Vec<TraceEdge>) -> TraceCatalog {
    catalog_with_filters(processes, edges, vec![])
}

pub fn catalog_with_filters(
    processes: &[ProcessId],
    edges: Vec<TraceEdge>,
    filters: Vec<(ProcessId, Filter)>,
) -> TraceCatalog {
    let processes = processes
        .iter()
        .map(|&p| {
            let mut proc = process(p);
            proc.filters = filters
                .iter()
                .filter(|(fp, _)| *fp == p)
                .map(|(_, f)| f.clone())
                .collect();
            proc
        })
        .collect();
    TraceCatalogConfig {
        name: Some("test".to_string()),
        processes,
        edges,
    }
    .into_catalog()
    .expect("fixture catalog should be valid")
}

/// `A(1) -serial- B(2) -lot- C(3)`
pub fn abc_catalog() -> TraceCatalog {
    catalog(&[1, 2, 3], vec![serial_edge(1, 2), lot_edge(2, 3)])
}
