//! db-dispatch - Main entry point.
//!
//! Opens one connection, runs a single operation through the dispatch layer
//! and prints the result as JSON on stdout.

use clap::Parser;
use db_dispatch::config::{Command, Config, load_batch};
use db_dispatch::db::{self, OwnedConnection};
use db_dispatch::error::DbResult;
use serde_json::{Value as JsonValue, json};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // stdout carries the JSON result
    if config.json_logs {
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

async fn run(conn: &mut OwnedConnection, command: &Command) -> DbResult<JsonValue> {
    let mut conn = conn.as_connection();

    let output = match command {
        Command::One(args) => {
            let row = db::select_one(&mut conn, &args.sql, &args.query_params()).await?;
            json!(row)
        }
        Command::All(args) => {
            let rows = db::select_all(&mut conn, &args.sql, &args.query_params()).await?;
            json!(rows)
        }
        Command::Exec(args) => {
            let outcome = db::cud_query(&mut conn, &args.sql, &args.query_params()).await?;
            json!({ "rows_affected": outcome.rows_affected() })
        }
        Command::Proc(args) => {
            let outcome =
                db::execute_procedure(&mut conn, &args.sql, &args.query_params()).await?;
            match outcome {
                db::WriteOutcome::Rows(rows) => json!(rows),
                other => json!({ "rows_affected": other.rows_affected() }),
            }
        }
        Command::Insert {
            statement,
            id_column,
        } => {
            let id = db::insert_returning_new_id(
                &mut conn,
                &statement.sql,
                &statement.query_params(),
                id_column,
            )
            .await?;
            json!({ "id": id })
        }
        Command::Batch { file } => {
            let steps = load_batch(file)?;
            db::insert_transaction(&mut conn, &steps).await?;
            json!({ "committed": true, "steps": steps.len() })
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!("Starting db-dispatch v{}", env!("CARGO_PKG_VERSION"));

    let conn_config = config.connection_config()?;
    let mut conn = db::connect(&conn_config, config.connect_timeout_duration()).await?;

    let result = run(&mut conn, &config.command).await;

    if let Err(e) = conn.close().await {
        error!(error = %e, "Failed to close connection");
    }

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!(
                error = %e,
                sql_state = ?e.sql_state(),
                suggestion = ?e.suggestion(),
                "Command failed"
            );
            Err(e.into())
        }
    }
}
