//! sqlgate - Main entry point.
//!
//! Validates the configured connection, opens it and runs one maintenance
//! command against it.

use clap::Parser;
use sqlgate::cascade::delete_hosts;
use sqlgate::config::{Cli, Command, install_dir};
use sqlgate::db::{Database, Dialect, init_db_config};
use sqlgate::models::{Paging, SelectData};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries command output.
    if cli.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!("Starting sqlgate v{}", env!("CARGO_PKG_VERSION"));

    let raw = cli.into_connection_config()?;
    let (config, diagnostics) = init_db_config(raw, &install_dir()?).await;
    if diagnostics.has_fatal() {
        for diagnostic in diagnostics.iter() {
            eprintln!("{diagnostic}");
        }
        std::process::exit(1);
    }

    let db = Database::open(config).await?;
    let result = run(&db, &cli.command).await;
    db.close().await;

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        if let Some(suggestion) = e.suggestion() {
            eprintln!("Hint: {suggestion}");
        }
        return Err(e.into());
    }

    info!("Done");
    Ok(())
}

async fn run(db: &Database, command: &Command) -> sqlgate::DbResult<()> {
    match command {
        Command::Check => {
            db.ping().await?;
            println!("{} connection OK", db.backend());
        }
        Command::Query {
            table,
            fields,
            filters,
            limit,
        } => {
            let backend = db.backend();
            let mut spec = SelectData::from_table(table.as_str())
                .fields(fields.iter().map(String::as_str))
                .paging(Paging::from_slice(limit)?);
            for (column, value) in filters {
                spec = spec.filter(column.as_str(), backend.build_where_field_exact(value));
            }
            for row in db.query_data(&spec).await? {
                println!("{}", serde_json::Value::Object(row));
            }
        }
        Command::DeleteHosts { ids } => {
            let report = delete_hosts(db, ids).await?;
            let text = serde_json::to_string_pretty(&report)
                .map_err(|e| sqlgate::DbError::internal(e.to_string()))?;
            println!("{text}");
        }
    }
    Ok(())
}
