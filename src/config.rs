//! Configuration handling for db-dispatch.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::db::{DEFAULT_ID_COLUMN, TransactionStep};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, QueryParam};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the db-dispatch binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-dispatch",
    about = "Run queries against SQL Server or PostgreSQL through one interface",
    version,
    author
)]
pub struct Config {
    /// Connection string: postgres://..., mssql://... or an ADO string (server=...;...)
    #[arg(short = 'd', long = "database-url", value_name = "URL", env = "DATABASE_URL")]
    pub database_url: String,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Operation to run.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the first row of a query, or null
    One(StatementArgs),
    /// Print every row of a query
    All(StatementArgs),
    /// Run a create/update/delete statement
    Exec(StatementArgs),
    /// Run a stored procedure call
    Proc(StatementArgs),
    /// Run an INSERT and print the generated id
    Insert {
        #[command(flatten)]
        statement: StatementArgs,

        /// Column read back on PostgreSQL
        #[arg(long, default_value = DEFAULT_ID_COLUMN)]
        id_column: String,
    },
    /// Run a JSON file of steps as one transaction
    Batch {
        /// JSON array of {"query", "params", "label"} objects
        file: PathBuf,
    },
}

/// A statement and its positional parameters.
#[derive(Debug, Clone, clap::Args)]
pub struct StatementArgs {
    /// SQL text, with $1.. (PostgreSQL) or @P1.. (SQL Server) placeholders
    pub sql: String,

    /// Positional parameter; JSON scalars (42, true, null, "x") keep their type
    #[arg(short = 'p', long = "param", value_name = "VALUE")]
    pub params: Vec<String>,
}

impl StatementArgs {
    /// Parameters in their typed form.
    pub fn query_params(&self) -> Vec<QueryParam> {
        self.params.iter().map(|raw| QueryParam::parse_cli(raw)).collect()
    }
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Classify the configured connection string.
    pub fn connection_config(&self) -> DbResult<ConnectionConfig> {
        ConnectionConfig::new(self.database_url.as_str())
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

/// Read a batch file: a JSON array of transaction steps.
pub fn load_batch(path: &Path) -> DbResult<Vec<TransactionStep>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DbError::invalid_input(format!("Cannot read batch file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        DbError::invalid_input(format!("Invalid batch file {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_select_one() {
        let config = parse(&[
            "db-dispatch",
            "--database-url",
            "postgres://u:p@localhost/app",
            "one",
            "select email from users where id = $1",
            "-p",
            "1",
        ]);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
        match config.command {
            Command::One(args) => {
                assert_eq!(args.sql, "select email from users where id = $1");
                assert_eq!(args.query_params(), vec![QueryParam::Int(1)]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_insert_with_id_column() {
        let config = parse(&[
            "db-dispatch",
            "-d",
            "mssql://sa:pw@localhost/app",
            "insert",
            "INSERT INTO tblusers (Email) VALUES (@P1)",
            "-p",
            "a@example.com",
            "--id-column",
            "UserID",
        ]);
        match config.command {
            Command::Insert {
                statement,
                id_column,
            } => {
                assert_eq!(id_column, "UserID");
                assert_eq!(
                    statement.query_params(),
                    vec![QueryParam::String("a@example.com".into())]
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_insert_default_id_column() {
        let config = parse(&[
            "db-dispatch",
            "-d",
            "postgres://localhost/app",
            "insert",
            "insert into t (a) values ($1)",
            "-p",
            "null",
        ]);
        match config.command {
            Command::Insert {
                statement,
                id_column,
            } => {
                assert_eq!(id_column, "id");
                assert_eq!(statement.query_params(), vec![QueryParam::Null]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_requires_subcommand() {
        let result = Config::try_parse_from(["db-dispatch", "-d", "postgres://localhost/app"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_connection_config_rejects_unknown_scheme() {
        let config = parse(&["db-dispatch", "-d", "mysql://localhost/app", "all", "SELECT 1"]);
        let err = config.connection_config().unwrap_err();
        assert!(matches!(err, DbError::UnrecognizedBackend { .. }));
    }

    #[test]
    fn test_connect_timeout_duration() {
        let config = parse(&[
            "db-dispatch",
            "-d",
            "postgres://localhost/app",
            "--connect-timeout",
            "3",
            "exec",
            "delete from sessions",
        ]);
        assert_eq!(config.connect_timeout_duration(), Duration::from_secs(3));
    }

    #[test]
    fn test_load_batch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"query": "update accounts set balance = balance - $1 where id = $2", "params": [100, 1], "msg": "debit"}},
                {{"query": "update accounts set balance = balance + $1 where id = $2", "params": [100, 2]}}
            ]"#
        )
        .unwrap();

        let steps = load_batch(file.path()).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].label.as_deref(), Some("debit"));
        assert_eq!(steps[1].params, vec![QueryParam::Int(100), QueryParam::Int(2)]);
    }

    #[test]
    fn test_load_batch_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"query\": \"not an array\"}}").unwrap();
        let err = load_batch(file.path()).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_load_batch_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_batch(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Cannot read batch file"));
    }
}
