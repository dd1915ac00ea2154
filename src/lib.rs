//! Tracegraph - traceability queries over manufacturing process tables
//!
//! Given a catalog of processes (one table each) and trace edges linking
//! them by key columns, this crate:
//! - Finds the covering paths from a start process to every requested end
//! - Compiles each path into a chain of CTEs joined on the trace keys
//! - Renders the SQL for PostgreSQL, ClickHouse or SQLite
//! - Executes the statements, merges the per-path results and applies the
//!   duplicate-record policy

pub mod utils;

pub mod config;
pub mod render_plan;
pub mod sql_generator;
pub mod trace_catalog;
pub mod trace_engine;
pub mod trace_planner;
