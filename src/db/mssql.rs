//! SQL Server adapter (cursor-style backend).
//!
//! Statements go through `tiberius`. A [`Cursor`] wraps the live result
//! stream and holds the client borrow until it is fetched from or dropped,
//! so the client is released on every exit path.
//!
//! TDS sessions autocommit, so the explicit commit/rollback contract of the
//! cursor backend is realised by opening a transaction before the work:
//! [`begin`], then [`commit_or_rollback`] with the outcome.

use crate::db::params::bind_mssql_param;
use crate::db::types::{Record, column_data_to_json, row_into_record};
use crate::error::DbResult;
use crate::models::QueryParam;
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use tiberius::{Client, Query, QueryStream};
use tokio::net::TcpStream;
use tokio_util::compat::Compat;
use tracing::{debug, warn};

/// The SQL Server client type this crate dispatches on.
pub type MssqlClient = Client<Compat<TcpStream>>;

const BEGIN_SQL: &str = "BEGIN TRANSACTION";
const COMMIT_SQL: &str = "COMMIT TRANSACTION";
// A server-side abort may already have ended the transaction.
const ROLLBACK_SQL: &str = "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION";

/// Clause appended to an INSERT to read back the generated identity.
pub const IDENTITY_SUFFIX: &str = "SELECT CAST(SCOPE_IDENTITY() AS BIGINT);";

/// A positioned, not yet drained result stream.
pub struct Cursor<'c> {
    stream: QueryStream<'c>,
}

impl<'c> Cursor<'c> {
    /// First row of the first result set, if any.
    pub async fn fetch_one(self) -> DbResult<Option<Record>> {
        Ok(self.stream.into_row().await?.map(row_into_record))
    }

    /// All rows of the first result set.
    pub async fn fetch_all(self) -> DbResult<Vec<Record>> {
        let rows = self.stream.into_first_result().await?;
        Ok(rows.into_iter().map(row_into_record).collect())
    }

    /// First column of the first row across all result sets.
    ///
    /// Statements that produce no result set (an INSERT ahead of a SELECT in
    /// the same batch) are skipped.
    pub async fn fetch_first_value(self) -> DbResult<Option<JsonValue>> {
        let sets = self.stream.into_results().await?;
        Ok(sets
            .into_iter()
            .flatten()
            .next()
            .and_then(|row| row.into_iter().next())
            .map(column_data_to_json))
    }

    /// Consume and discard any remaining results.
    pub async fn drain(self) -> DbResult<()> {
        self.stream.into_results().await?;
        Ok(())
    }
}

/// Run a statement and return its live cursor.
pub async fn open_cursor<'c>(
    client: &'c mut MssqlClient,
    sql: impl Into<Cow<'c, str>>,
    params: &'c [QueryParam],
) -> DbResult<Cursor<'c>> {
    let stream = build_query(sql, params).query(client).await?;
    Ok(Cursor { stream })
}

/// Run a statement and return the total number of affected rows.
pub async fn execute_counted(
    client: &mut MssqlClient,
    sql: &str,
    params: &[QueryParam],
) -> DbResult<u64> {
    let result = build_query(sql, params).execute(client).await?;
    Ok(result.total())
}

/// Open an explicit transaction on the session.
pub async fn begin(client: &mut MssqlClient) -> DbResult<()> {
    run_batch(client, BEGIN_SQL).await
}

/// Commit the open transaction.
pub async fn commit(client: &mut MssqlClient) -> DbResult<()> {
    run_batch(client, COMMIT_SQL).await
}

/// Roll back the open transaction, if there still is one.
pub async fn rollback(client: &mut MssqlClient) -> DbResult<()> {
    run_batch(client, ROLLBACK_SQL).await
}

/// Finish a transaction opened with [`begin`].
///
/// Commits when `outcome` is `Ok`; otherwise, or when the commit itself
/// fails, rolls back and returns the original error.
pub async fn commit_or_rollback<T>(client: &mut MssqlClient, outcome: DbResult<T>) -> DbResult<T> {
    let err = match outcome {
        Ok(value) => match commit(client).await {
            Ok(()) => {
                debug!("Transaction committed (SQL Server)");
                return Ok(value);
            }
            Err(e) => e,
        },
        Err(e) => e,
    };

    match rollback(client).await {
        Ok(()) => warn!(error = %err, "Transaction rolled back (SQL Server)"),
        Err(rb) => warn!(error = %err, rollback_error = %rb, "Rollback failed (SQL Server)"),
    }
    Err(err)
}

/// Append the identity read-back to an INSERT statement.
pub fn with_identity_suffix(query: &str) -> String {
    format!("{}; {}", query.trim_end(), IDENTITY_SUFFIX)
}

fn build_query<'a>(sql: impl Into<Cow<'a, str>>, params: &'a [QueryParam]) -> Query<'a> {
    let mut query = Query::new(sql);
    for param in params {
        bind_mssql_param(&mut query, param);
    }
    query
}

// Transaction control must run as a plain batch: inside sp_executesql a
// BEGIN without a matching COMMIT is rejected.
async fn run_batch(client: &mut MssqlClient, sql: &str) -> DbResult<()> {
    client.simple_query(sql).await?.into_results().await?;
    Ok(())
}
