pub mod config;
pub mod errors;
pub mod filter;
pub mod process;
pub mod store;
pub mod trace_edge;

#[cfg(test)]
pub mod testing;

pub type ProcessId = i64;
pub type ColumnId = i64;

pub use config::{TraceCatalog, TraceCatalogConfig};
pub use errors::TraceCatalogError;
pub use filter::{Filter, FilterFunction};
pub use process::{Process, ProcessColumn, RawDataType};
pub use store::ConfigStore;
pub use trace_edge::{SubstringRange, TraceEdge, TraceKey};
