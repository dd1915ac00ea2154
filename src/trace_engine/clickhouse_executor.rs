use std::env;

use async_trait::async_trait;
use clickhouse::Client;
use tokio::io::AsyncBufReadExt;

use super::errors::ExecutionError;
use super::executor::{QueryResult, SqlExecutor};
use crate::sql_generator::CompiledSql;

fn read_env_var(key: &str) -> Result<String, ExecutionError> {
    env::var(key).map_err(|_| ExecutionError::NotConfigured(format!("{} is not set", key)))
}

/// Executor over the ClickHouse HTTP interface.
///
/// Statements must be rendered with the ClickHouse dialect: bound values are
/// inlined as literals before sending.
#[derive(Clone)]
pub struct ClickHouseExecutor {
    client: Client,
}

impl ClickHouseExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client from `CLICKHOUSE_URL`, `CLICKHOUSE_USER`, `CLICKHOUSE_PASSWORD`
    /// and `CLICKHOUSE_DATABASE`
    pub fn from_env() -> Result<Self, ExecutionError> {
        let url = read_env_var("CLICKHOUSE_URL")?;
        let user = read_env_var("CLICKHOUSE_USER")?;
        let password = read_env_var("CLICKHOUSE_PASSWORD")?;
        let database = read_env_var("CLICKHOUSE_DATABASE")?;

        log::debug!("ClickHouse executor at {} (database {})", url, database);
        Ok(Self::new(
            Client::default()
                .with_url(url)
                .with_user(user)
                .with_password(password)
                .with_database(database),
        ))
    }
}

/// `?` is the client's bind marker; literal ones are doubled
fn escape_bind_markers(sql: &str) -> String {
    sql.replace('?', "??")
}

impl ClickHouseExecutor {
    async fn execute_session(&self, statements: &[String]) -> Result<(), ExecutionError> {
        for statement in statements {
            self.client
                .query(&escape_bind_markers(statement))
                .execute()
                .await
                .map_err(|e| ExecutionError::query_error_with_context(e, statement))?;
        }
        Ok(())
    }

    async fn fetch_rows(&self, statement: &CompiledSql) -> Result<QueryResult, ExecutionError> {
        let sql = statement.inlined()?;
        log::debug!("Executing SQL:\n{}", sql);

        let cursor = self
            .client
            .query(&escape_bind_markers(&sql))
            .fetch_bytes("JSONEachRow")
            .map_err(|e| ExecutionError::query_error_with_context(e, &sql))?;

        let mut lines = cursor.lines();
        let mut rows = Vec::new();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let value: serde_json::Value = serde_json::from_str(&line)
                        .map_err(|e| ExecutionError::Decode(e.to_string()))?;
                    rows.push(value);
                }
                Ok(None) => break,
                Err(e) => return Err(ExecutionError::query_error_with_context(e, &sql)),
            }
        }

        QueryResult::from_json_rows(rows)
    }
}

#[async_trait]
impl SqlExecutor for ClickHouseExecutor {
    async fn run_sql(&self, statement: &CompiledSql) -> Result<QueryResult, ExecutionError> {
        self.execute_session(&statement.pre_statements).await?;
        let result = self.fetch_rows(statement).await;
        // the query error wins over a failed reset
        let reset = self.execute_session(&statement.post_statements).await;
        let result = result?;
        reset?;
        Ok(result)
    }
}
