//! resilient-db
//!
//! Command line front end for the managed data-access layer over SQLite.
//!
//! ```text
//!   resilient-db [--config file.toml] [--database url] <command>
//!
//!   check                 one health check, JSON report
//!   query <sql> -p json   rows as JSON
//!   exec  <sql> -p json   changes / last id as JSON
//!   monitor               periodic health checks until Ctrl+C
//! ```
//!
//! Every command prints the circuit breaker snapshot to stderr on exit.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;

use resilient_db::config::{load_config, DataAccessConfig};
use resilient_db::health::HealthMonitor;
use resilient_db::lifecycle::{shutdown_signal, Shutdown};
use resilient_db::observability::{logging, metrics};
use resilient_db::store::SqliteStore;
use resilient_db::ManagedDataAccess;

#[derive(Parser)]
#[command(name = "resilient-db")]
#[command(about = "Resilient SQLite access: health checks, queries and statements", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL, overrides `[database] url`.
    #[arg(short, long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one health check
    Check,
    /// Run a read and print the rows
    Query {
        sql: String,
        /// Positional parameter as JSON (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Run a write without retry and print the outcome
    Exec {
        sql: String,
        /// Positional parameter as JSON (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Health-check periodically until Ctrl+C
    Monitor,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => DataAccessConfig::default(),
    };
    if let Some(url) = cli.database.clone() {
        config.database.url = url;
    }

    logging::init_logging(&config.observability);

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: DataAccessConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = SqliteStore::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.busy_timeout(),
    )
    .await?;
    let access = Arc::new(ManagedDataAccess::new(Arc::new(store), &config));

    let outcome: Result<(), Box<dyn std::error::Error>> = match command {
        Commands::Check => {
            let report = access.health_check().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Query { sql, params } => {
            let params = parse_params(&params)?;
            match access.query_many::<Value>(&sql, &params, access.read_options()).await {
                Ok(rows) => {
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Exec { sql, params } => {
            let params = parse_params(&params)?;
            let options = access.write_options().without_retry();
            match access.execute(&sql, &params, options).await {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Monitor => {
            let shutdown = Shutdown::new();
            let monitor = HealthMonitor::new(access.clone(), config.health_check.clone());
            let handle = tokio::spawn(monitor.run(shutdown.subscribe()));

            shutdown_signal().await;
            shutdown.trigger();
            handle.await?;
            Ok(())
        }
    };

    eprintln!("{}", serde_json::to_string(&access.circuit_breaker_stats())?);
    outcome
}

fn parse_params(raw: &[String]) -> Result<Vec<Value>, serde_json::Error> {
    raw.iter().map(|p| serde_json::from_str(p)).collect()
}
