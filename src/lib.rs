//! sqlgate Library
//!
//! A backend-agnostic SQL access and transaction layer for PostgreSQL and
//! MySQL: structured insert/update/delete/select operations rendered per
//! dialect, explicit transactions, and atomic multi-table cascading deletes.

pub mod cascade;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use cascade::{CascadePlan, DeleteReport, delete_hosts};
pub use config::Cli;
pub use db::{Backend, Database, Dialect, Tx, init_db_config};
pub use error::{DbError, DbResult};
pub use models::{ConnectionConfig, Diagnostics, SelectData};
