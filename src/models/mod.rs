//! Data models for the data access layer.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod diagnostic;
pub mod query;

// Re-export commonly used types
pub use connection::{
    ConnectionConfig, DEFAULT_ACQUIRE_TIMEOUT_SECS, DEFAULT_CONN_MAX_LIFETIME_SECS, DatabaseType,
    SslMode,
};
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use query::{
    FieldData, OrderData, Paging, Row, SelectData, SortDirection, WhereData, stringify_value,
};
