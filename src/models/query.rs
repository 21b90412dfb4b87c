//! Query specification and field payload models.
//!
//! These are passive value objects. Dialect-specific rendering lives in
//! [`crate::db::dialect`].

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Column name → value payload for inserts and updates.
///
/// Ordered by column name so rendered statements are deterministic.
pub type FieldData = BTreeMap<String, JsonValue>;

/// Field name → pre-rendered `operator value` fragment, ANDed together.
///
/// The fragment is appended directly after the field name, so it must start
/// with its operator: `="h1"`, ` like 'web%'`, ` in (1,2)`. Fragments are
/// spliced into the statement verbatim; build them with
/// [`crate::db::Backend::build_where_field_exact`] when the value comes from
/// user input.
pub type WhereData = BTreeMap<String, String>;

/// One result row, column name → decoded value.
pub type Row = serde_json::Map<String, JsonValue>;

/// Sort direction for an order entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// `0` is ascending, anything else is descending.
    pub fn from_flag(flag: i32) -> Self {
        if flag == 0 { Self::Asc } else { Self::Desc }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A single `ORDER BY` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderData {
    pub key: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderData {
    pub fn new(key: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            key: key.into(),
            direction,
        }
    }

    pub fn asc(key: impl Into<String>) -> Self {
        Self::new(key, SortDirection::Asc)
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self::new(key, SortDirection::Desc)
    }
}

/// Row paging for a select.
///
/// The two numbers are rendered in the order they were given; see the
/// dialect implementations for the exact clause each backend emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Paging {
    #[default]
    Unlimited,
    Count(u64),
    CountOffset(u64, u64),
}

impl Paging {
    /// Build paging from a 0, 1 or 2 element list.
    pub fn from_slice(limit: &[u64]) -> DbResult<Self> {
        match *limit {
            [] => Ok(Self::Unlimited),
            [count] => Ok(Self::Count(count)),
            [count, offset] => Ok(Self::CountOffset(count, offset)),
            _ => Err(DbError::invalid_input(format!(
                "paging takes at most 2 numbers, got {}",
                limit.len()
            ))),
        }
    }
}

/// Backend-agnostic description of a select or delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectData {
    /// Target tables. An entry may carry an alias: `"host h"`.
    pub tables: Vec<String>,
    /// Output expressions, rendered verbatim.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default, rename = "where")]
    pub filters: WhereData,
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub order: Vec<OrderData>,
    #[serde(default)]
    pub paging: Paging,
}

impl SelectData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single-table specification.
    pub fn from_table(table: impl Into<String>) -> Self {
        Self::new().table(table)
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Add a where fragment. A later fragment for the same field replaces the earlier one.
    pub fn filter(mut self, field: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.filters.insert(field.into(), fragment.into());
        self
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group.push(field.into());
        self
    }

    pub fn order_by(mut self, order: OrderData) -> Self {
        self.order.push(order);
        self
    }

    pub fn paging(mut self, paging: Paging) -> Self {
        self.paging = paging;
        self
    }
}

/// Render a payload value as SQL text, before quoting.
///
/// Null becomes an empty string, numbers use their shortest plain form, strings are
/// taken verbatim and anything else is rendered as JSON.
pub fn stringify_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => f.to_string(),
            _ => n.to_string(),
        },
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
