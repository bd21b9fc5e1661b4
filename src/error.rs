//! Error types for db-dispatch.
//!
//! Driver errors are carried verbatim: a failed statement on SQL Server yields
//! the `tiberius` error, a failed statement on PostgreSQL yields the `sqlx`
//! error. The remaining variants describe failures that belong to this crate
//! (unknown backend, a failed transaction step, bad caller input).

use crate::models::QueryParam;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error reported by the SQL Server driver.
    #[cfg(feature = "mssql")]
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// Error reported by the PostgreSQL driver.
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Unrecognized backend: {message}")]
    UnrecognizedBackend { message: String },

    #[error("Transaction step {index} failed ({label}): {source}")]
    TransactionStep {
        /// Zero-based position of the failing step in the batch
        index: usize,
        label: String,
        query: String,
        params: Vec<QueryParam>,
        #[source]
        source: Box<DbError>,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an unrecognized backend error.
    pub fn unrecognized_backend(message: impl Into<String>) -> Self {
        Self::UnrecognizedBackend {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Wrap the failure of one transaction step.
    pub fn transaction_step(
        index: usize,
        label: impl Into<String>,
        query: impl Into<String>,
        params: Vec<QueryParam>,
        source: DbError,
    ) -> Self {
        Self::TransactionStep {
            index,
            label: label.into(),
            query: query.into(),
            params,
            source: Box::new(source),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::UnrecognizedBackend { .. } => Some(
                "Use a postgres://, mssql://, sqlserver:// or ADO (Server=...) connection string",
            ),
            Self::TransactionStep { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// The driver error at the root of this error, following transaction
    /// step wrappers. `None` for errors raised by this crate itself.
    pub fn backend_source(&self) -> Option<&DbError> {
        match self {
            Self::TransactionStep { source, .. } => source.backend_source(),
            #[cfg(feature = "mssql")]
            Self::Mssql(_) => Some(self),
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => Some(self),
            _ => None,
        }
    }

    /// Server-reported error code: SQLSTATE for PostgreSQL, the error number
    /// for SQL Server.
    pub fn sql_state(&self) -> Option<String> {
        match self.backend_source()? {
            #[cfg(feature = "mssql")]
            Self::Mssql(tiberius::error::Error::Server(token)) => Some(token.code().to_string()),
            #[cfg(feature = "postgres")]
            Self::Postgres(sqlx::Error::Database(db_err)) => db_err.code().map(|c| c.to_string()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::connection(
            format!("I/O error: {}", err),
            "Check network connectivity and database server status",
        )
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::connection("refused", "Check the port");
        assert_eq!(err.suggestion(), Some("Check the port"));
        assert!(DbError::invalid_input("x").suggestion().is_none());
        assert!(
            DbError::unrecognized_backend("oracle://")
                .suggestion()
                .is_some()
        );
    }

    #[test]
    fn test_transaction_step_display_and_source() {
        let inner = DbError::invalid_input("bad value");
        let err = DbError::transaction_step(
            2,
            "insert audit row",
            "INSERT INTO audit VALUES ($1)",
            vec![QueryParam::Int(7)],
            inner,
        );
        let msg = err.to_string();
        assert!(msg.contains("step 2"));
        assert!(msg.contains("insert audit row"));
        assert!(msg.contains("bad value"));

        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("bad value"));
    }

    #[test]
    fn test_crate_errors_have_no_backend_source() {
        let err = DbError::transaction_step(
            0,
            "label",
            "SELECT 1",
            vec![],
            DbError::invalid_input("nope"),
        );
        assert!(err.backend_source().is_none());
        assert!(err.sql_state().is_none());
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_backend_source_through_step_wrapper() {
        let err = DbError::transaction_step(
            1,
            "label",
            "SELECT 1",
            vec![],
            DbError::from(sqlx::Error::RowNotFound),
        );
        assert!(matches!(
            err.backend_source(),
            Some(DbError::Postgres(sqlx::Error::RowNotFound))
        ));
        assert!(err.sql_state().is_none());
    }

    #[test]
    fn test_io_error_maps_to_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: DbError = io.into();
        assert!(matches!(err, DbError::Connection { .. }));
        assert!(err.to_string().contains("refused"));
    }
}
