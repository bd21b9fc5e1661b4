//! Database abstraction layer.
//!
//! This module provides the backend dispatch and normalization core:
//! - `Connection`: the caller's driver handle, tagged with its backend
//! - `connect`: opening the owned connection the binary runs against
//! - `executor`: the read/write operations and the shared execute adapter
//! - `transaction`: atomic execution of a batch of statements
//! - `types`: conversion of driver rows into [`Record`]s
//! - `mssql` / `postgres`: backend-specific adapters

#[cfg(not(any(feature = "mssql", feature = "postgres")))]
compile_error!("db-dispatch needs at least one backend: enable the `mssql` or `postgres` feature");

#[macro_use]
pub mod macros;
pub mod connect;
pub mod executor;
#[cfg(feature = "mssql")]
pub mod mssql;
pub mod params;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod transaction;
pub mod types;

pub use crate::models::BackendKind;
pub use connect::{OwnedConnection, connect};
pub use executor::{
    DEFAULT_ID_COLUMN, Executed, WriteOutcome, cud_query, execute, execute_procedure,
    insert_returning_new_id, select_all, select_one,
};
#[cfg(feature = "mssql")]
pub use mssql::MssqlClient;
pub use transaction::{TransactionStep, insert_transaction};
pub use types::Record;

/// A live connection handle, tagged with the backend it belongs to.
///
/// The handle stays owned by the caller: this wrapper only borrows it for
/// the duration of the calls made through it and never opens, pools or
/// closes connections.
pub enum Connection<'a> {
    /// SQL Server client (cursor-style driver model)
    #[cfg(feature = "mssql")]
    Cursor(&'a mut mssql::MssqlClient),
    /// PostgreSQL connection (result-set-style driver model)
    #[cfg(feature = "postgres")]
    ResultSet(&'a mut sqlx::PgConnection),
}

impl Connection<'_> {
    /// Get the backend kind for this connection.
    pub fn kind(&self) -> BackendKind {
        impl_db_dispatch!(self, {
            #[cfg(feature = "mssql")]
            Cursor(_c) => BackendKind::Cursor,
            #[cfg(feature = "postgres")]
            ResultSet(_c) => BackendKind::ResultSet,
        })
    }
}

impl std::fmt::Debug for Connection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.kind())
            .finish()
    }
}

#[cfg(feature = "mssql")]
impl<'a> From<&'a mut mssql::MssqlClient> for Connection<'a> {
    fn from(client: &'a mut mssql::MssqlClient) -> Self {
        Connection::Cursor(client)
    }
}

#[cfg(feature = "postgres")]
impl<'a> From<&'a mut sqlx::PgConnection> for Connection<'a> {
    fn from(conn: &'a mut sqlx::PgConnection) -> Self {
        Connection::ResultSet(conn)
    }
}
