//! SQL dialects.
//!
//! Every statement this crate sends is rendered here, by pure functions that
//! never touch a connection. The same [`BuiltQuery`] is executed whether the
//! call goes straight to the pool or through a [`crate::db::Tx`].
//!
//! # Architecture
//!
//! - [`Dialect`] holds the statement shapes as provided methods and leaves
//!   quoting, value placement, ordering and paging to each backend.
//! - [`MySql`] and [`Postgres`] are the two implementations.
//! - [`Backend`] is the variant chosen once from the configured engine kind.
//!   It implements [`Dialect`] by delegation, so callers only need the trait
//!   in scope.
//!
//! Table and column names are checked with [`Dialect::identifier`] before
//! they are spliced in. Where fragments are spliced verbatim; build them
//! with [`Dialect::build_where_field_exact`] when the value is user input.

use crate::error::{DbError, DbResult};
use crate::models::{
    DatabaseType, FieldData, OrderData, Paging, SelectData, WhereData, stringify_value,
};
use serde_json::Value as JsonValue;
use std::fmt;
use tracing::warn;

/// Longest identifier accepted by [`Dialect::identifier`].
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// A rendered statement plus the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    /// Bound in order. Empty when every value was inlined.
    pub params: Vec<JsonValue>,
}

impl BuiltQuery {
    fn new(sql: String, params: Vec<JsonValue>) -> Self {
        Self { sql, params }
    }
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// `[A-Za-z0-9_]{1,64}`, anchored at both ends.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Escape a value for a double- or single-quoted MySQL string literal.
///
/// Quotes are doubled, so the literal stays closed under `NO_BACKSLASH_ESCAPES`.
pub fn escape_mysql_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\"\""),
            '\'' => out.push_str("''"),
            '\0' => out.push_str("\\0"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out
}

/// Escape a value for a standard-conforming PostgreSQL string literal.
pub fn escape_postgres_literal(raw: &str) -> String {
    raw.replace('\'', "''")
}

/// Quoted PostgreSQL literal. Values holding a backslash use the `E''` form,
/// which reads the same whatever `standard_conforming_strings` is set to.
pub fn quote_postgres_literal(raw: &str) -> String {
    if raw.contains('\\') {
        format!("E'{}'", escape_postgres_literal(&raw.replace('\\', "\\\\")))
    } else {
        format!("'{}'", escape_postgres_literal(raw))
    }
}

/// Engine-specific SQL rendering.
///
/// Implementors supply the handful of dialect differences; the statement
/// builders are provided on top of them and must not be overridden.
pub trait Dialect: fmt::Debug + Send + Sync {
    fn database_type(&self) -> DatabaseType;

    /// Character wrapped around table and column names.
    fn identifier_quote(&self) -> char;

    /// Quote and escape a string literal.
    fn quote_literal(&self, value: &str) -> String;

    /// Render one insert/update value, pushing to `params` when the dialect
    /// binds instead of inlining.
    fn render_value(&self, value: &JsonValue, params: &mut Vec<JsonValue>) -> String;

    /// `ORDER BY` clause body for the given entries, without the keywords.
    fn render_order(&self, order: &[OrderData]) -> Option<String>;

    /// Trailing `LIMIT` clause, with keywords.
    fn render_paging(&self, paging: Paging) -> Option<String>;

    /// Everything up to the `WHERE` of a delete on the given tables.
    fn render_delete_head(&self, tables: &[String]) -> DbResult<String>;

    /// True when `name` may be spliced into a statement as a table or column.
    fn identifier(&self, name: &str) -> bool {
        is_identifier(name)
    }

    fn quote_identifier(&self, name: &str) -> DbResult<String> {
        if !self.identifier(name) {
            return Err(DbError::invalid_input(format!(
                "'{}' is not a valid identifier",
                name
            )));
        }
        let q = self.identifier_quote();
        Ok(format!("{q}{name}{q}"))
    }

    /// Check a possibly qualified column reference such as `h.hostid`.
    fn check_column_ref(&self, name: &str) -> DbResult<()> {
        if name.split('.').all(|part| self.identifier(part)) {
            Ok(())
        } else {
            Err(DbError::invalid_input(format!(
                "'{}' is not a valid column reference",
                name
            )))
        }
    }

    /// Render a table entry, keeping an optional alias: `host h`.
    fn render_table(&self, entry: &str) -> DbResult<String> {
        let mut parts = entry.split_whitespace();
        let table = parts
            .next()
            .ok_or_else(|| DbError::invalid_input("table name is empty"))?;
        let quoted = self.quote_identifier(table)?;
        match (parts.next(), parts.next()) {
            (None, _) => Ok(quoted),
            (Some(alias), None) if self.identifier(alias) => Ok(format!("{quoted} {alias}")),
            _ => Err(DbError::invalid_input(format!(
                "'{}' is not a valid table entry",
                entry
            ))),
        }
    }

    fn render_tables(&self, tables: &[String]) -> DbResult<String> {
        if tables.is_empty() {
            return Err(DbError::invalid_input("table list is empty"));
        }
        let rendered = tables
            .iter()
            .map(|t| self.render_table(t))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(rendered.join(","))
    }

    /// Where fragments ANDed together, or `None` when there are none.
    fn render_where(&self, filters: &WhereData) -> DbResult<Option<String>> {
        if filters.is_empty() {
            return Ok(None);
        }
        let mut clauses = Vec::with_capacity(filters.len());
        for (field, fragment) in filters {
            self.check_column_ref(field)?;
            if fragment.trim().is_empty() {
                return Err(DbError::invalid_input(format!(
                    "where condition for '{}' is empty",
                    field
                )));
            }
            clauses.push(format!("{field}{fragment}"));
        }
        Ok(Some(clauses.join(" AND ")))
    }

    fn build_insert_query(&self, table: &str, data: &FieldData) -> DbResult<BuiltQuery> {
        let table = self.quote_identifier(table)?;
        if data.is_empty() {
            return Err(DbError::invalid_input(
                "can not insert empty data into a table",
            ));
        }

        let mut columns = Vec::with_capacity(data.len());
        let mut values = Vec::with_capacity(data.len());
        let mut params = Vec::new();
        for (column, value) in data {
            columns.push(self.quote_identifier(column)?);
            values.push(self.render_value(value, &mut params));
        }

        let sql = format!(
            "INSERT INTO {}({}) Values ({})",
            table,
            columns.join(","),
            values.join(",")
        );
        Ok(BuiltQuery::new(sql, params))
    }

    fn build_update_query(
        &self,
        table: &str,
        data: &FieldData,
        filters: &WhereData,
    ) -> DbResult<BuiltQuery> {
        let table = self.quote_identifier(table)?;
        if data.is_empty() {
            return Err(DbError::invalid_input("no fields to update"));
        }

        let mut params = Vec::new();
        let mut assignments = Vec::with_capacity(data.len());
        for (column, value) in data {
            let column = self.quote_identifier(column)?;
            assignments.push(format!("{}={}", column, self.render_value(value, &mut params)));
        }

        let mut sql = format!("UPDATE {} SET {}", table, assignments.join(","));
        match self.render_where(filters)? {
            Some(clause) => {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
            None => warn!(table = %table, "Update without where clause touches every row"),
        }
        Ok(BuiltQuery::new(sql, params))
    }

    fn build_delete_query(&self, spec: &SelectData) -> DbResult<BuiltQuery> {
        let mut sql = self.render_delete_head(&spec.tables)?;
        match self.render_where(&spec.filters)? {
            Some(clause) => {
                sql.push_str(" WHERE ");
                sql.push_str(&clause);
            }
            None => warn!(tables = ?spec.tables, "Delete without where clause touches every row"),
        }
        Ok(BuiltQuery::new(sql, Vec::new()))
    }

    fn build_select_query(&self, spec: &SelectData) -> DbResult<BuiltQuery> {
        let tables = self.render_tables(&spec.tables)?;
        let fields = if spec.fields.is_empty() {
            "*".to_string()
        } else {
            spec.fields.join(",")
        };

        let mut sql = format!("SELECT {} FROM {}", fields, tables);
        if let Some(clause) = self.render_where(&spec.filters)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        if !spec.group.is_empty() {
            for field in &spec.group {
                self.check_column_ref(field)?;
            }
            sql.push_str(" GROUP BY ");
            sql.push_str(&spec.group.join(","));
        }
        for entry in &spec.order {
            self.check_column_ref(&entry.key)?;
        }
        if let Some(order) = self.render_order(&spec.order) {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        if let Some(limit) = self.render_paging(spec.paging) {
            sql.push(' ');
            sql.push_str(&limit);
        }
        Ok(BuiltQuery::new(sql, Vec::new()))
    }

    /// Where fragment matching `value` exactly.
    ///
    /// A comma-separated value becomes an `in` list. A blank value yields an
    /// empty fragment.
    fn build_where_field_exact(&self, value: &str) -> String {
        let values: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        self.build_where_field_exact_with_slice(&values)
    }

    fn build_where_field_exact_with_slice(&self, values: &[&str]) -> String {
        match values {
            [] => String::new(),
            [single] => format!("={}", self.quote_literal(single)),
            many => {
                let list: Vec<String> = many.iter().map(|v| self.quote_literal(v)).collect();
                format!(" in ({})", list.join(","))
            }
        }
    }
}

/// MySQL and MariaDB.
///
/// Values are inlined as escaped, double-quoted literals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MySql;

impl Dialect for MySql {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("\"{}\"", escape_mysql_literal(value))
    }

    fn render_value(&self, value: &JsonValue, _params: &mut Vec<JsonValue>) -> String {
        match value {
            JsonValue::Null => "NULL".to_string(),
            other => self.quote_literal(&stringify_value(other)),
        }
    }

    fn render_order(&self, order: &[OrderData]) -> Option<String> {
        if order.is_empty() {
            return None;
        }
        let entries: Vec<String> = order
            .iter()
            .map(|o| format!("{} {}", o.key, o.direction.as_sql()))
            .collect();
        Some(entries.join(","))
    }

    fn render_paging(&self, paging: Paging) -> Option<String> {
        match paging {
            Paging::Unlimited => None,
            Paging::Count(count) => Some(format!("LIMIT {count}")),
            Paging::CountOffset(first, second) => Some(format!("LIMIT {first},{second}")),
        }
    }

    fn render_delete_head(&self, tables: &[String]) -> DbResult<String> {
        let rendered = self.render_tables(tables)?;
        let first = tables
            .first()
            .ok_or_else(|| DbError::invalid_input("table list is empty"))?;
        let mut parts = first.split_whitespace();
        let table = parts.next().unwrap_or_default();

        // Multi-table and aliased deletes name their target before FROM.
        match parts.next() {
            None if tables.len() == 1 => Ok(format!("DELETE FROM {rendered}")),
            Some(alias) => Ok(format!("DELETE {alias} FROM {rendered}")),
            None => Ok(format!(
                "DELETE {} FROM {}",
                self.quote_identifier(table)?,
                rendered
            )),
        }
    }
}

/// PostgreSQL.
///
/// String values are rendered as quoted literals, which stay untyped until
/// the server matches them to the column. Numbers, booleans and JSON
/// documents are bound to `$n` placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Postgres;

impl Dialect for Postgres {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn identifier_quote(&self) -> char {
        '"'
    }

    fn quote_literal(&self, value: &str) -> String {
        quote_postgres_literal(value)
    }

    fn render_value(&self, value: &JsonValue, params: &mut Vec<JsonValue>) -> String {
        match value {
            JsonValue::Null => "NULL".to_string(),
            JsonValue::String(text) => self.quote_literal(text),
            other => {
                params.push(other.clone());
                format!("${}", params.len())
            }
        }
    }

    /// Only the first entry is honored.
    fn render_order(&self, order: &[OrderData]) -> Option<String> {
        order
            .first()
            .map(|o| format!("{} {}", o.key, o.direction.as_sql()))
    }

    fn render_paging(&self, paging: Paging) -> Option<String> {
        match paging {
            Paging::Unlimited => None,
            Paging::Count(count) => Some(format!("LIMIT {count}")),
            Paging::CountOffset(count, offset) => Some(format!("LIMIT {count} OFFSET {offset}")),
        }
    }

    fn render_delete_head(&self, tables: &[String]) -> DbResult<String> {
        let (first, rest) = tables
            .split_first()
            .ok_or_else(|| DbError::invalid_input("table list is empty"))?;
        let mut sql = format!("DELETE FROM {}", self.render_table(first)?);
        if !rest.is_empty() {
            sql.push_str(" USING ");
            sql.push_str(&self.render_tables(rest)?);
        }
        Ok(sql)
    }
}

/// The dialect bound to a configuration.
///
/// Chosen once from the engine kind by [`crate::db::init_db_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    MySql(MySql),
    Postgres(Postgres),
}

impl Backend {
    pub fn for_type(db_type: DatabaseType) -> Self {
        match db_type {
            DatabaseType::MySQL => Backend::MySql(MySql),
            DatabaseType::PostgreSQL => Backend::Postgres(Postgres),
        }
    }

    /// Backend for a configured engine kind, if it is supported.
    pub fn for_kind(kind: &str) -> Option<Self> {
        DatabaseType::from_kind(kind).map(Self::for_type)
    }

    pub fn dialect(&self) -> &dyn Dialect {
        match self {
            Backend::MySql(d) => d,
            Backend::Postgres(d) => d,
        }
    }
}

impl Dialect for Backend {
    fn database_type(&self) -> DatabaseType {
        self.dialect().database_type()
    }

    fn identifier_quote(&self) -> char {
        self.dialect().identifier_quote()
    }

    fn quote_literal(&self, value: &str) -> String {
        self.dialect().quote_literal(value)
    }

    fn render_value(&self, value: &JsonValue, params: &mut Vec<JsonValue>) -> String {
        self.dialect().render_value(value, params)
    }

    fn render_order(&self, order: &[OrderData]) -> Option<String> {
        self.dialect().render_order(order)
    }

    fn render_paging(&self, paging: Paging) -> Option<String> {
        self.dialect().render_paging(paging)
    }

    fn render_delete_head(&self, tables: &[String]) -> DbResult<String> {
        self.dialect().render_delete_head(tables)
    }

    fn identifier(&self, name: &str) -> bool {
        self.dialect().identifier(name)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.database_type())
    }
}
