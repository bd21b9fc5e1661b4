//! db-dispatch Library
//!
//! A uniform async query interface over SQL Server (`tiberius`) and
//! PostgreSQL (`sqlx`) connections: single-row and multi-row reads, writes,
//! procedure calls, insert-with-generated-id and atomic statement batches,
//! all returning rows as ordered JSON records.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{Connection, Record, TransactionStep};
pub use error::{DbError, DbResult};
pub use models::{BackendKind, QueryParam};
