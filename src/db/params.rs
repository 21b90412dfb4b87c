//! Parameter binding utilities for database queries.
//!
//! This module binds the JSON values collected by the dialects into
//! [`crate::db::BuiltQuery::params`] to database-specific query objects.

use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres};

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q JsonValue,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(v) => query.bind(*v),
        JsonValue::Number(n) => match n.as_i64() {
            Some(v) => query.bind(v),
            None => query.bind(n.as_f64()),
        },
        JsonValue::String(v) => query.bind(v.as_str()),
        other => query.bind(Json(other)),
    }
}

/// Bind a parameter to a PostgreSQL query.
///
/// Strings are sent as text, so numeric columns need JSON numbers.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q JsonValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(v) => query.bind(*v),
        JsonValue::Number(n) => match n.as_i64() {
            Some(v) => query.bind(v),
            None => query.bind(n.as_f64()),
        },
        JsonValue::String(v) => query.bind(v.as_str()),
        other => query.bind(Json(other)),
    }
}
