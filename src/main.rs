use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracegraph::config::EngineConfig;
use tracegraph::sql_generator::DialectKind;
use tracegraph::trace_catalog::TraceCatalog;
use tracegraph::trace_engine::{ClickHouseExecutor, TraceEngine, TraceRequest};

/// Tracegraph - compile and run trace queries across process tables
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Trace catalog (processes, columns, filters, edges) as YAML
    #[arg(long)]
    catalog: PathBuf,

    /// Trace request as YAML or JSON
    #[arg(long)]
    request: PathBuf,

    /// Engine configuration YAML; environment variables are used otherwise
    #[arg(long)]
    engine_config: Option<PathBuf>,

    /// SQL dialect: postgres, clickhouse or sqlite
    #[arg(long)]
    dialect: Option<DialectKind>,

    /// Execute against ClickHouse (CLICKHOUSE_* variables) instead of
    /// printing the compiled plan
    #[arg(long)]
    execute: bool,
}

fn load_request(path: &Path) -> anyhow::Result<TraceRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading request {}", path.display()))?;
    // YAML is a superset of the JSON requests we accept
    serde_yaml::from_str(&content).with_context(|| format!("parsing request {}", path.display()))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let catalog = TraceCatalog::from_yaml_file(&cli.catalog)
        .with_context(|| format!("loading catalog {}", cli.catalog.display()))?;
    let request = load_request(&cli.request)?;

    let mut config = match &cli.engine_config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::from_env()?,
    }
    .with_dialect(cli.dialect);

    if cli.execute && config.dialect != DialectKind::ClickHouse {
        log::info!(
            "--execute runs on ClickHouse; switching dialect from {}",
            config.dialect
        );
        config.dialect = DialectKind::ClickHouse;
    }

    let engine = TraceEngine::new(&catalog, config);
    let output = if cli.execute {
        let executor = ClickHouseExecutor::from_env()?;
        let result = engine.run(&request, &executor).await?;
        log::info!(
            "{} row(s), actual={}, unique={}",
            result.table.len(),
            result.actual_record_number,
            result.unique_record_number
        );
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string_pretty(&engine.compile(&request)?)?
    };

    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() {
    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
