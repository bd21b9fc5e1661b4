//! Data models for db-dispatch.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{BackendKind, ConnectionConfig};
pub use query::QueryParam;
