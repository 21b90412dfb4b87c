//! Row decoding.
//!
//! Every column of a result row becomes one JSON value, chosen from the
//! column type the driver reports. [`mysql::decode_row`] and
//! [`postgres::decode_row`] build the [`Row`] maps the executor returns.

use crate::models::{DatabaseType, Row};
use serde_json::Value as JsonValue;
use sqlx::{ColumnIndex, Decode, Type};

/// Layout used for every decoded date-time value.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a column is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Unsigned,
    Float,
    Decimal,
    Boolean,
    Bytes,
    Json,
    Uuid,
    DateTime,
    DateTimeTz,
    Date,
    Time,
    Text,
}

/// Pick the decoder for a driver type name such as `BIGINT UNSIGNED` or `int4`.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_ascii_lowercase();
    let name = lower.as_str();

    if name.contains("decimal") || name.contains("numeric") {
        TypeCategory::Decimal
    } else if name == "bool" || name == "boolean" {
        TypeCategory::Boolean
    } else if (name.contains("int") && !name.contains("interval")) || name.contains("serial") {
        if name.contains("unsigned") {
            TypeCategory::Unsigned
        } else {
            TypeCategory::Integer
        }
    } else if name.contains("float") || name.contains("double") || name == "real" {
        TypeCategory::Float
    } else if name == "json" || name == "jsonb" {
        TypeCategory::Json
    } else if name == "uuid" {
        TypeCategory::Uuid
    } else if name.contains("blob") || name.contains("binary") || name == "bytea" {
        TypeCategory::Bytes
    } else {
        match (name, db) {
            ("datetime" | "timestamp", DatabaseType::MySQL) => TypeCategory::DateTime,
            ("timestamp", DatabaseType::PostgreSQL) => TypeCategory::DateTime,
            ("timestamptz", DatabaseType::PostgreSQL) => TypeCategory::DateTimeTz,
            ("date", _) => TypeCategory::Date,
            ("time", _) => TypeCategory::Time,
            _ => TypeCategory::Text,
        }
    }
}

/// Column value, or `None` when it is NULL or not decodable as `T`.
fn get<'r, R, T>(row: &'r R, idx: usize) -> Option<T>
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

/// Binary columns read as text when they hold UTF-8, base64 otherwise.
fn bytes_value(bytes: Vec<u8>) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match String::from_utf8(bytes) {
        Ok(text) => JsonValue::String(text),
        Err(e) => JsonValue::String(STANDARD.encode(e.as_bytes())),
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn string_value<T: ToString>(v: T) -> JsonValue {
    JsonValue::String(v.to_string())
}

pub(crate) mod mysql {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use rust_decimal::Decimal;
    use sqlx::mysql::MySqlRow;
    use sqlx::{Column, Row as _, TypeInfo};

    pub fn decode_row(row: &MySqlRow) -> Row {
        row.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
                let value = decode_value(row, col.ordinal(), category).unwrap_or(JsonValue::Null);
                (col.name().to_string(), value)
            })
            .collect()
    }

    fn decode_value(row: &MySqlRow, idx: usize, category: TypeCategory) -> Option<JsonValue> {
        match category {
            TypeCategory::Integer => get::<_, i64>(row, idx).map(JsonValue::from),
            TypeCategory::Unsigned => get::<_, u64>(row, idx).map(JsonValue::from),
            TypeCategory::Float => get::<_, f64>(row, idx)
                .or_else(|| get::<_, f32>(row, idx).map(f64::from))
                .map(float_value),
            TypeCategory::Decimal => get::<_, Decimal>(row, idx).map(string_value),
            TypeCategory::Boolean => get::<_, bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Bytes => get::<_, Vec<u8>>(row, idx).map(bytes_value),
            TypeCategory::Json => get::<_, JsonValue>(row, idx),
            TypeCategory::DateTime | TypeCategory::DateTimeTz => get::<_, NaiveDateTime>(row, idx)
                .map(|v| string_value(v.format(DATETIME_FORMAT))),
            TypeCategory::Date => get::<_, NaiveDate>(row, idx).map(string_value),
            TypeCategory::Time => get::<_, NaiveTime>(row, idx).map(string_value),
            TypeCategory::Uuid | TypeCategory::Text => get::<_, String>(row, idx)
                .map(JsonValue::String)
                .or_else(|| get::<_, Vec<u8>>(row, idx).map(bytes_value)),
        }
    }
}

pub(crate) mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use rust_decimal::Decimal;
    use sqlx::postgres::PgRow;
    use sqlx::{Column, Row as _, TypeInfo};

    pub fn decode_row(row: &PgRow) -> Row {
        row.columns()
            .iter()
            .map(|col| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                let value = decode_value(row, col.ordinal(), category).unwrap_or(JsonValue::Null);
                (col.name().to_string(), value)
            })
            .collect()
    }

    fn decode_value(row: &PgRow, idx: usize, category: TypeCategory) -> Option<JsonValue> {
        match category {
            // INT2, INT4 and INT8 each decode only into their own width.
            TypeCategory::Integer | TypeCategory::Unsigned => get::<_, i64>(row, idx)
                .or_else(|| get::<_, i32>(row, idx).map(i64::from))
                .or_else(|| get::<_, i16>(row, idx).map(i64::from))
                .map(JsonValue::from),
            TypeCategory::Float => get::<_, f64>(row, idx)
                .or_else(|| get::<_, f32>(row, idx).map(f64::from))
                .map(float_value),
            TypeCategory::Decimal => get::<_, Decimal>(row, idx).map(string_value),
            TypeCategory::Boolean => get::<_, bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Bytes => get::<_, Vec<u8>>(row, idx).map(bytes_value),
            TypeCategory::Json => get::<_, JsonValue>(row, idx),
            TypeCategory::Uuid => get::<_, uuid::Uuid>(row, idx).map(string_value),
            TypeCategory::DateTime => get::<_, NaiveDateTime>(row, idx)
                .map(|v| string_value(v.format(DATETIME_FORMAT))),
            TypeCategory::DateTimeTz => {
                get::<_, DateTime<Utc>>(row, idx).map(|v| string_value(v.to_rfc3339()))
            }
            TypeCategory::Date => get::<_, NaiveDate>(row, idx).map(string_value),
            TypeCategory::Time => get::<_, NaiveTime>(row, idx).map(string_value),
            TypeCategory::Text => get::<_, String>(row, idx).map(JsonValue::String),
        }
    }
}
