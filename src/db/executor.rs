//! Query execution: the backend-independent operations.
//!
//! Each operation branches on the connection's backend once, issues the
//! backend's native call and normalizes the result into [`Record`]s.
//!
//! # Write semantics
//!
//! - SQL Server: the statement runs inside an explicit transaction which is
//!   committed on success and rolled back before the error is returned.
//! - PostgreSQL: the statement runs in the session's autocommit mode; no
//!   commit or rollback is issued here.
//!
//! Errors are never retried or translated; driver errors reach the caller
//! as the driver reported them.

use crate::db::Connection;
use crate::db::params::describe_params;
use crate::db::types::Record;
use crate::error::DbResult;
use crate::models::QueryParam;
use serde_json::Value as JsonValue;
use tracing::debug;

#[cfg(feature = "mssql")]
use crate::db::mssql;
#[cfg(feature = "postgres")]
use crate::db::postgres::{self, PgExecuted};
#[cfg(feature = "postgres")]
use crate::db::types::RowToRecord;

/// Column read back by [`insert_returning_new_id`] when none is given.
pub const DEFAULT_ID_COLUMN: &str = "id";

/// Backend-native outcome of the shared execute adapter.
pub enum Executed<'c> {
    /// Live SQL Server cursor, positioned before the first row
    #[cfg(feature = "mssql")]
    Cursor(mssql::Cursor<'c>),
    /// Complete PostgreSQL row set of a `select`
    #[cfg(feature = "postgres")]
    Rows(Vec<sqlx::postgres::PgRow>),
    /// PostgreSQL status of any other statement
    #[cfg(feature = "postgres")]
    Status(sqlx::postgres::PgQueryResult),
    #[cfg(not(feature = "mssql"))]
    #[doc(hidden)]
    _Never(std::convert::Infallible, std::marker::PhantomData<&'c ()>),
}

impl Executed<'_> {
    /// Discard whatever the statement produced.
    pub async fn drain(self) -> DbResult<()> {
        match self {
            #[cfg(feature = "mssql")]
            Executed::Cursor(cursor) => cursor.drain().await,
            #[cfg(feature = "postgres")]
            Executed::Rows(_) | Executed::Status(_) => Ok(()),
            #[cfg(not(feature = "mssql"))]
            Executed::_Never(never, _) => match never {},
        }
    }
}

/// Result of [`cud_query`] / [`execute_procedure`].
#[derive(Debug)]
pub enum WriteOutcome {
    /// SQL Server affected-row count
    RowsAffected(u64),
    /// PostgreSQL status, as returned by the driver
    #[cfg(feature = "postgres")]
    Status(sqlx::postgres::PgQueryResult),
    /// PostgreSQL rows, when the statement was a `select` (e.g. a function call)
    Rows(Vec<Record>),
}

impl WriteOutcome {
    /// Number of rows affected (or returned, for `Rows`).
    pub fn rows_affected(&self) -> u64 {
        match self {
            Self::RowsAffected(n) => *n,
            #[cfg(feature = "postgres")]
            Self::Status(result) => result.rows_affected(),
            Self::Rows(rows) => rows.len() as u64,
        }
    }
}

/// Execute a statement with the backend's native call convention.
///
/// SQL Server yields a live cursor. PostgreSQL fetches all rows when the
/// statement starts with `select` and otherwise returns the driver status.
pub async fn execute<'c>(
    conn: &'c mut Connection<'_>,
    query: &'c str,
    params: &'c [QueryParam],
) -> DbResult<Executed<'c>> {
    debug!(
        backend = %conn.kind(),
        sql = %query,
        params = %describe_params(params),
        "Executing statement"
    );

    impl_db_dispatch!(conn, {
        #[cfg(feature = "mssql")]
        Cursor(client) => Ok(Executed::Cursor(mssql::open_cursor(client, query, params).await?)),
        #[cfg(feature = "postgres")]
        ResultSet(pg) => Ok(match postgres::execute(pg, query, params).await? {
            PgExecuted::Rows(rows) => Executed::Rows(rows),
            PgExecuted::Status(status) => Executed::Status(status),
        }),
    })
}

/// Fetch a single row, or `None` when the query returns no rows.
pub async fn select_one(
    conn: &mut Connection<'_>,
    query: &str,
    params: &[QueryParam],
) -> DbResult<Option<Record>> {
    match execute(conn, query, params).await? {
        #[cfg(feature = "mssql")]
        Executed::Cursor(cursor) => cursor.fetch_one().await,
        #[cfg(feature = "postgres")]
        Executed::Rows(rows) => Ok(rows.first().map(RowToRecord::to_record)),
        #[cfg(feature = "postgres")]
        Executed::Status(_) => Ok(None),
        #[cfg(not(feature = "mssql"))]
        Executed::_Never(never, _) => match never {},
    }
}

/// Fetch every row; an empty result is an empty vector.
pub async fn select_all(
    conn: &mut Connection<'_>,
    query: &str,
    params: &[QueryParam],
) -> DbResult<Vec<Record>> {
    match execute(conn, query, params).await? {
        #[cfg(feature = "mssql")]
        Executed::Cursor(cursor) => cursor.fetch_all().await,
        #[cfg(feature = "postgres")]
        Executed::Rows(rows) => Ok(rows.iter().map(RowToRecord::to_record).collect()),
        #[cfg(feature = "postgres")]
        Executed::Status(_) => Ok(Vec::new()),
        #[cfg(not(feature = "mssql"))]
        Executed::_Never(never, _) => match never {},
    }
}

/// Run a create/update/delete statement.
pub async fn cud_query(
    conn: &mut Connection<'_>,
    query: &str,
    params: &[QueryParam],
) -> DbResult<WriteOutcome> {
    debug!(
        backend = %conn.kind(),
        sql = %query,
        params = %describe_params(params),
        "Executing write"
    );

    impl_db_dispatch!(conn, {
        #[cfg(feature = "mssql")]
        Cursor(client) => {
            mssql::begin(client).await?;
            let outcome = mssql::execute_counted(client, query, params).await;
            let rows_affected = mssql::commit_or_rollback(client, outcome).await?;
            Ok(WriteOutcome::RowsAffected(rows_affected))
        },
        #[cfg(feature = "postgres")]
        ResultSet(pg) => Ok(match postgres::execute(pg, query, params).await? {
            PgExecuted::Status(status) => WriteOutcome::Status(status),
            PgExecuted::Rows(rows) => {
                WriteOutcome::Rows(rows.iter().map(RowToRecord::to_record).collect())
            }
        }),
    })
}

/// Run a stored procedure call. Same contract as [`cud_query`].
pub async fn execute_procedure(
    conn: &mut Connection<'_>,
    query: &str,
    params: &[QueryParam],
) -> DbResult<WriteOutcome> {
    cud_query(conn, query, params).await
}

/// Run an INSERT and return the generated id, or `None` when nothing was
/// inserted.
///
/// The id read-back is appended to `query` verbatim
/// (`; SELECT CAST(SCOPE_IDENTITY() AS BIGINT);` on SQL Server,
/// ` RETURNING <id_column>;` on PostgreSQL), so `query` must not end with a
/// semicolon or a clause of its own. `id_column` is only used on PostgreSQL.
pub async fn insert_returning_new_id(
    conn: &mut Connection<'_>,
    query: &str,
    params: &[QueryParam],
    id_column: &str,
) -> DbResult<Option<JsonValue>> {
    debug!(
        backend = %conn.kind(),
        sql = %query,
        params = %describe_params(params),
        id_column = %id_column,
        "Executing insert returning id"
    );

    impl_db_dispatch!(conn, {
        #[cfg(feature = "mssql")]
        Cursor(client) => {
            let sql = mssql::with_identity_suffix(query);
            mssql::begin(client).await?;
            let outcome = match mssql::open_cursor(client, sql.as_str(), params).await {
                Ok(cursor) => cursor.fetch_first_value().await,
                Err(e) => Err(e),
            };
            mssql::commit_or_rollback(client, outcome).await
        },
        #[cfg(feature = "postgres")]
        ResultSet(pg) => {
            let sql = postgres::with_returning_suffix(query, id_column);
            let rows = postgres::fetch_rows(pg, &sql, params).await?;
            Ok(rows.first().and_then(|row| returned_id(row.to_record(), id_column)))
        },
    })
}

/// Pick the id out of a `RETURNING` row. PostgreSQL folds unquoted
/// identifiers to lower case, so a single-column row is accepted as-is.
#[cfg(feature = "postgres")]
fn returned_id(record: Record, id_column: &str) -> Option<JsonValue> {
    if let Some(value) = record.get(id_column) {
        return Some(value.clone());
    }
    if record.len() == 1 {
        return record.into_iter().next().map(|(_, v)| v);
    }
    None
}
