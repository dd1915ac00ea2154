//! Dialect-specific rendering of the plan AST.

pub mod dialect;
pub mod parameter_substitution;
pub mod to_sql;

pub use dialect::{ClickHouse, DialectKind, Postgres, SqlDialect, Sqlite};
pub use parameter_substitution::ParameterSubstitutionError;
pub use to_sql::{render_statement, CompiledSql, ToSql};
