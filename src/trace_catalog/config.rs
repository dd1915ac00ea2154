use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::TraceCatalogError;
use super::filter::{Filter, FilterFunction};
use super::process::Process;
use super::store::ConfigStore;
use super::trace_edge::TraceEdge;
use super::{ColumnId, ProcessId};

/// Trace catalogs are defined in YAML with the following structure:
///
/// ```yaml
/// processes:
///   - id: 1
///     name: Machining
///     table_name: t_machining
///     row_id_column: id          # optional, defaults to "id"
///     columns:
///       - { id: 11, column_name: serial, data_type: TEXT, is_serial_no: true }
///       - { id: 12, column_name: time, data_type: DATETIME, is_get_date: true }
///       - { id: 13, column_name: judge, data_type: TEXT }
///     filters:
///       - { id: 100, column_id: 13, function: MATCHES, values: [OK] }
/// edges:
///   - self_process_id: 1
///     target_process_id: 2
///     keys:
///       - self_column_id: 11
///         target_column_id: 21
///         self_substr: { from: 1, to: 8 }   # optional
///         delta_time: 30                    # optional, minutes
///         cut_off: true                     # optional
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TraceCatalogConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub processes: Vec<Process>,
    #[serde(default)]
    pub edges: Vec<TraceEdge>,
}

impl TraceCatalogConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TraceCatalogError> {
        serde_yaml::from_str(yaml).map_err(|e| TraceCatalogError::ConfigParseError {
            error: e.to_string(),
        })
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, TraceCatalogError> {
        let content =
            fs::read_to_string(path).map_err(|e| TraceCatalogError::ConfigReadError {
                error: e.to_string(),
            })?;
        Self::from_yaml_str(&content)
    }

    /// Structural validation; the returned catalog is safe to plan against
    pub fn into_catalog(self) -> Result<TraceCatalog, TraceCatalogError> {
        let mut processes = HashMap::new();
        let mut filter_ids = HashSet::new();

        for process in self.processes {
            let mut column_ids = HashSet::new();
            for column in &process.columns {
                if !column_ids.insert(column.id) {
                    return Err(TraceCatalogError::DuplicateId {
                        kind: "column",
                        id: column.id,
                    });
                }
            }
            process.time_column()?;

            for filter in &process.filters {
                if !filter_ids.insert(filter.id) {
                    return Err(TraceCatalogError::DuplicateId {
                        kind: "filter",
                        id: filter.id,
                    });
                }
                validate_filter(&process, filter)?;
            }

            let id = process.id;
            if processes.insert(id, process).is_some() {
                return Err(TraceCatalogError::DuplicateId {
                    kind: "process",
                    id,
                });
            }
        }

        for edge in &self.edges {
            let (Some(self_proc), Some(target_proc)) = (
                processes.get(&edge.self_process_id),
                processes.get(&edge.target_process_id),
            ) else {
                return Err(TraceCatalogError::DanglingEdge {
                    self_process_id: edge.self_process_id,
                    target_process_id: edge.target_process_id,
                });
            };
            let context = format!(
                "In trace edge {} -> {}",
                edge.self_process_id, edge.target_process_id
            );
            for key in &edge.keys {
                let sides = [
                    (self_proc, key.self_column_id),
                    (target_proc, key.target_column_id),
                ];
                for (process, column_id) in sides {
                    let column = process.column_opt(column_id).ok_or_else(|| {
                        TraceCatalogError::column_error_with_context(
                            process.id,
                            column_id,
                            context.as_str(),
                        )
                    })?;
                    if key.delta_time.is_some() && !column.data_type.is_temporal() {
                        return Err(TraceCatalogError::InvalidDeltaKey {
                            process_id: process.id,
                            column_id,
                            data_type: column.data_type,
                        });
                    }
                }
            }
        }

        log::debug!(
            "Loaded trace catalog {:?}: {} processes, {} edges",
            self.name,
            processes.len(),
            self.edges.len()
        );

        Ok(TraceCatalog {
            name: self.name,
            processes,
            edges: self.edges,
        })
    }
}

/// Filters are checked once at load time so a broken catalog entry fails
/// fast instead of on the first request that selects it.
pub(crate) fn validate_filter(process: &Process, filter: &Filter) -> Result<(), TraceCatalogError> {
    if process.column_opt(filter.column_id).is_none() {
        return Err(TraceCatalogError::column_error_with_context(
            process.id,
            filter.column_id,
            format!("In filter {}", filter.id),
        ));
    }
    if filter.values.is_empty() {
        return Err(TraceCatalogError::InvalidFilter {
            filter_id: filter.id,
            message: "no values".to_string(),
        });
    }
    match filter.function {
        FilterFunction::Regex => {
            for pattern in &filter.values {
                regex::Regex::new(pattern).map_err(|e| TraceCatalogError::InvalidFilter {
                    filter_id: filter.id,
                    message: e.to_string(),
                })?;
            }
        }
        FilterFunction::Substring => {
            if !matches!(filter.from_char, Some(pos) if pos >= 1) {
                return Err(TraceCatalogError::InvalidFilter {
                    filter_id: filter.id,
                    message: "SUBSTRING requires from_char >= 1".to_string(),
                });
            }
        }
        FilterFunction::AndSearch | FilterFunction::OrSearch => {
            if filter.tokens().is_empty() {
                return Err(TraceCatalogError::InvalidFilter {
                    filter_id: filter.id,
                    message: "search filter has no tokens".to_string(),
                });
            }
        }
        _ => {}
    }
    Ok(())
}

/// Validated, immutable catalog snapshot
#[derive(Debug, Clone, Default)]
pub struct TraceCatalog {
    pub name: Option<String>,
    processes: HashMap<ProcessId, Process>,
    edges: Vec<TraceEdge>,
}

impl TraceCatalog {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TraceCatalogError> {
        TraceCatalogConfig::from_yaml_str(yaml)?.into_catalog()
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, TraceCatalogError> {
        TraceCatalogConfig::from_yaml_file(path)?.into_catalog()
    }

    pub fn process_ids(&self) -> Vec<ProcessId> {
        let mut ids: Vec<ProcessId> = self.processes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Copy of this catalog without `process_id` and its edges
    pub fn without_process(&self, process_id: ProcessId) -> Self {
        let mut processes = self.processes.clone();
        processes.remove(&process_id);
        Self {
            name: self.name.clone(),
            processes,
            edges: self
                .edges
                .iter()
                .filter(|e| e.self_process_id != process_id && e.target_process_id != process_id)
                .cloned()
                .collect(),
        }
    }
}

impl ConfigStore for TraceCatalog {
    fn get_process(&self, process_id: ProcessId) -> Result<&Process, TraceCatalogError> {
        self.processes
            .get(&process_id)
            .ok_or(TraceCatalogError::Process { process_id })
    }

    fn get_trace_edges(&self) -> &[TraceEdge] {
        &self.edges
    }

    fn get_condition_filters(&self, process_id: ProcessId, column_ids: &[ColumnId]) -> Vec<Filter> {
        self.processes
            .get(&process_id)
            .map(|p| {
                p.filters
                    .iter()
                    .filter(|f| column_ids.contains(&f.column_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
