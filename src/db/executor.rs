//! Statement execution.
//!
//! This module runs the statements rendered by [`crate::db::dialect`]
//! directly against the shared pool:
//! - Inserts, updates and deletes return the affected row count
//! - Selects decode every row into a [`Row`] map, fully buffered
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific execution and row decoding
//! - `postgres`: PostgreSQL-specific execution and row decoding
//!
//! Both are generic over the sqlx executor so [`crate::db::Tx`] runs the
//! same code against its own connection.

use crate::db::dialect::{BuiltQuery, Dialect};
use crate::db::pool::{Database, DbPool};
use crate::error::{DbError, DbResult};
use crate::models::{FieldData, Row, SelectData, WhereData};
use std::time::Instant;
use tracing::debug;

impl Database {
    /// Insert one row and return the number of affected rows.
    pub async fn insert_data(&self, table: &str, data: &FieldData) -> DbResult<u64> {
        let query = self.backend().build_insert_query(table, data)?;
        self.execute_built(&query).await
    }

    /// Update rows matching `filters` and return the number of affected rows.
    pub async fn update_data(
        &self,
        table: &str,
        data: &FieldData,
        filters: &WhereData,
    ) -> DbResult<u64> {
        let query = self.backend().build_update_query(table, data, filters)?;
        self.execute_built(&query).await
    }

    /// Delete rows described by `spec` and return the number of affected rows.
    pub async fn delete_data(&self, spec: &SelectData) -> DbResult<u64> {
        let query = self.backend().build_delete_query(spec)?;
        self.execute_built(&query).await
    }

    /// Run a select and decode every returned row.
    pub async fn query_data(&self, spec: &SelectData) -> DbResult<Vec<Row>> {
        let query = self.backend().build_select_query(spec)?;
        self.fetch_built(&query).await
    }

    async fn execute_built(&self, query: &BuiltQuery) -> DbResult<u64> {
        let start = Instant::now();
        log_statement(query);
        let rows_affected = match self.pool() {
            DbPool::MySql(p) => mysql::execute(p, query).await,
            DbPool::Postgres(p) => postgres::execute(p, query).await,
        }
        .map_err(|e| e.with_time_limit(self.config().acquire_timeout_secs))?;
        debug!(
            rows_affected,
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Statement executed"
        );
        Ok(rows_affected)
    }

    async fn fetch_built(&self, query: &BuiltQuery) -> DbResult<Vec<Row>> {
        let start = Instant::now();
        log_statement(query);
        let rows = match self.pool() {
            DbPool::MySql(p) => mysql::fetch_all(p, query).await,
            DbPool::Postgres(p) => postgres::fetch_all(p, query).await,
        }
        .map_err(|e| e.with_time_limit(self.config().acquire_timeout_secs))?;
        debug!(
            rows = rows.len(),
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Query executed"
        );
        Ok(rows)
    }
}

/// Rendered SQL is only ever logged at debug level.
pub(crate) fn log_statement(query: &BuiltQuery) {
    debug!(sql = %query.sql, params = query.params.len(), "Executing statement");
}

fn execution_error(err: sqlx::Error) -> DbError {
    DbError::from(err)
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.

pub(crate) mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use crate::db::types::mysql::decode_row;
    use futures_util::TryStreamExt;
    use sqlx::mysql::MySqlRow;

    pub async fn execute<'c, E>(executor: E, query: &BuiltQuery) -> DbResult<u64>
    where
        E: sqlx::Executor<'c, Database = sqlx::MySql>,
    {
        // Inlined statements go over the text protocol; nothing to prepare.
        let result = if query.params.is_empty() {
            executor.execute(query.sql.as_str()).await
        } else {
            let mut q = sqlx::query(&query.sql);
            for param in &query.params {
                q = bind_mysql_param(q, param);
            }
            q.execute(executor).await
        };
        result.map(|r| r.rows_affected()).map_err(execution_error)
    }

    pub async fn fetch_all<'c, E>(executor: E, query: &BuiltQuery) -> DbResult<Vec<Row>>
    where
        E: sqlx::Executor<'c, Database = sqlx::MySql>,
    {
        let rows: Vec<MySqlRow> = if query.params.is_empty() {
            executor
                .fetch(query.sql.as_str())
                .try_collect()
                .await
                .map_err(execution_error)?
        } else {
            let mut q = sqlx::query(&query.sql);
            for param in &query.params {
                q = bind_mysql_param(q, param);
            }
            q.fetch(executor).try_collect().await.map_err(execution_error)?
        };
        Ok(rows.iter().map(decode_row).collect())
    }
}

pub(crate) mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use crate::db::types::postgres::decode_row;
    use futures_util::TryStreamExt;
    use sqlx::postgres::PgRow;

    pub async fn execute<'c, E>(executor: E, query: &BuiltQuery) -> DbResult<u64>
    where
        E: sqlx::Executor<'c, Database = sqlx::Postgres>,
    {
        let mut q = sqlx::query(&query.sql);
        for param in &query.params {
            q = bind_postgres_param(q, param);
        }
        q.execute(executor)
            .await
            .map(|r| r.rows_affected())
            .map_err(execution_error)
    }

    pub async fn fetch_all<'c, E>(executor: E, query: &BuiltQuery) -> DbResult<Vec<Row>>
    where
        E: sqlx::Executor<'c, Database = sqlx::Postgres>,
    {
        let mut q = sqlx::query(&query.sql);
        for param in &query.params {
            q = bind_postgres_param(q, param);
        }
        let rows: Vec<PgRow> = q.fetch(executor).try_collect().await.map_err(execution_error)?;
        Ok(rows.iter().map(decode_row).collect())
    }
}
