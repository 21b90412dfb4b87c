//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection configuration validation
//! - SQL dialects and the backend bound at validation time
//! - Connection pool management
//! - Statement execution and row decoding
//! - Explicit transactions

pub mod dialect;
pub mod executor;
pub mod params;
pub mod pool;
pub mod transaction;
pub mod types;
pub mod validator;

pub use dialect::{Backend, BuiltQuery, Dialect, MySql, Postgres, is_identifier};
pub use pool::{Database, DbPool, connection_url};
pub use transaction::{DbTransaction, Tx};
pub use validator::{check_identifier, init_db_config, is_supported_db};
