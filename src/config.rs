use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::sql_generator::DialectKind;
use crate::trace_planner::DEFAULT_MAX_PATH_LENGTH;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Engine configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Days added on both sides of the request window for non-start processes
    #[validate(range(
        min = 0,
        max = 3650,
        message = "Time buffer must be between 0 and 3650 days"
    ))]
    pub time_buffer_days: i64,

    /// Backend the SQL is rendered for
    pub dialect: DialectKind,

    /// Emit the nested-loop planner hint when the backend supports it
    pub disable_nested_loop: bool,

    /// Longest path (in processes) the path search enumerates
    #[validate(range(
        min = 2,
        max = 64,
        message = "Max path length must be between 2 and 64"
    ))]
    pub max_path_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_buffer_days: 14,
            dialect: DialectKind::Postgres,
            disable_nested_loop: true,
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            time_buffer_days: parse_env_var("TRACEGRAPH_TIME_BUFFER_DAYS", "14")?,
            dialect: parse_env_var("TRACEGRAPH_SQL_DIALECT", "postgres")?,
            disable_nested_loop: parse_env_var("TRACEGRAPH_DISABLE_NESTLOOP", "true")?,
            max_path_length: parse_env_var(
                "TRACEGRAPH_MAX_PATH_LENGTH",
                &DEFAULT_MAX_PATH_LENGTH.to_string(),
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Override the dialect (CLI wins over file and environment)
    pub fn with_dialect(mut self, dialect: Option<DialectKind>) -> Self {
        if let Some(dialect) = dialect {
            self.dialect = dialect;
        }
        self
    }

    pub fn time_buffer(&self) -> chrono::Duration {
        chrono::Duration::days(self.time_buffer_days)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
