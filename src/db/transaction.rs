//! Explicit transactions.
//!
//! A [`Tx`] holds one pooled connection from `begin` until it is committed,
//! rolled back or dropped. Its mutating calls render SQL with the same
//! builders as [`Database`], then run it on the transaction's connection.
//! Nothing here rolls back on failure; the caller decides.

use crate::db::dialect::{Backend, BuiltQuery, Dialect};
use crate::db::executor::{log_statement, mysql, postgres};
use crate::db::pool::{Database, DbPool};
use crate::error::{DbError, DbResult};
use crate::models::{FieldData, Row, SelectData, WhereData};
use sqlx::{MySql, Postgres, Transaction};
use tracing::{debug, info, warn};

/// Database-specific transaction wrapper.
pub enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
}

impl DbTransaction {
    /// Commit the transaction.
    pub async fn commit(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(DbError::from),
        }
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(DbError::from),
        }
    }
}

/// An open transaction bound to a backend.
///
/// `commit` and `rollback` consume the value. Dropping it while still open
/// rolls back when the connection returns to the pool.
pub struct Tx {
    id: String,
    backend: Backend,
    inner: Option<DbTransaction>,
}

impl Tx {
    /// Begin a transaction on the database's pool.
    pub async fn begin(db: &Database) -> DbResult<Self> {
        let id = generate_transaction_id();
        if db.pool().is_closed() {
            return Err(DbError::transaction("connection pool is closed", id));
        }

        let limit = db.config().acquire_timeout_secs;
        let inner = match db.pool() {
            DbPool::MySql(pool) => pool.begin().await.map(DbTransaction::MySql),
            DbPool::Postgres(pool) => pool.begin().await.map(DbTransaction::Postgres),
        }
        .map_err(|e| DbError::from(e).with_time_limit(limit))?;

        info!(transaction_id = %id, db_type = %db.backend(), "Transaction started");
        Ok(Self {
            id,
            backend: db.backend(),
            inner: Some(inner),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub async fn insert_data(&mut self, table: &str, data: &FieldData) -> DbResult<u64> {
        let query = self.backend.build_insert_query(table, data)?;
        self.execute(&query).await
    }

    pub async fn update_data(
        &mut self,
        table: &str,
        data: &FieldData,
        filters: &WhereData,
    ) -> DbResult<u64> {
        let query = self.backend.build_update_query(table, data, filters)?;
        self.execute(&query).await
    }

    pub async fn delete_data(&mut self, spec: &SelectData) -> DbResult<u64> {
        let query = self.backend.build_delete_query(spec)?;
        self.execute(&query).await
    }

    /// Select inside the transaction, seeing its uncommitted writes.
    pub async fn query_data(&mut self, spec: &SelectData) -> DbResult<Vec<Row>> {
        let query = self.backend.build_select_query(spec)?;
        log_statement(&query);
        let result = match self.open()? {
            DbTransaction::MySql(tx) => mysql::fetch_all(&mut **tx, &query).await,
            DbTransaction::Postgres(tx) => postgres::fetch_all(&mut **tx, &query).await,
        };
        self.observe(result)
    }

    pub async fn commit(mut self) -> DbResult<()> {
        let inner = self.take()?;
        inner.commit().await?;
        info!(transaction_id = %self.id, "Transaction committed");
        Ok(())
    }

    pub async fn rollback(mut self) -> DbResult<()> {
        let inner = self.take()?;
        inner.rollback().await?;
        info!(transaction_id = %self.id, "Transaction rolled back");
        Ok(())
    }

    async fn execute(&mut self, query: &BuiltQuery) -> DbResult<u64> {
        log_statement(query);
        let result = match self.open()? {
            DbTransaction::MySql(tx) => mysql::execute(&mut **tx, query).await,
            DbTransaction::Postgres(tx) => postgres::execute(&mut **tx, query).await,
        };
        let rows_affected = self.observe(result)?;
        debug!(transaction_id = %self.id, rows_affected, "Statement executed in transaction");
        Ok(rows_affected)
    }

    fn open(&mut self) -> DbResult<&mut DbTransaction> {
        self.inner
            .as_mut()
            .ok_or_else(|| DbError::transaction("Transaction is no longer active", &self.id))
    }

    fn take(&mut self) -> DbResult<DbTransaction> {
        self.inner
            .take()
            .ok_or_else(|| DbError::transaction("Transaction is no longer active", &self.id))
    }

    fn observe<T>(&self, result: DbResult<T>) -> DbResult<T> {
        if let Err(e) = &result {
            warn!(transaction_id = %self.id, error = %e, "Statement failed in transaction");
        }
        result
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if self.inner.is_some() {
            warn!(
                transaction_id = %self.id,
                "Transaction dropped while open, rolling back"
            );
        }
    }
}

impl std::fmt::Debug for Tx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx")
            .field("id", &self.id)
            .field("backend", &self.backend)
            .field("open", &self.inner.is_some())
            .finish()
    }
}

/// Generate a unique transaction ID.
fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionConfig;

    #[test]
    fn test_transaction_id_format() {
        let id = generate_transaction_id();
        assert!(id.starts_with("tx_"));
        assert_eq!(id.len(), 35); // "tx_" + 32 hex chars
        assert_ne!(id, generate_transaction_id());
    }

    #[tokio::test]
    async fn test_begin_on_closed_pool_fails() {
        let mut config = ConnectionConfig::new("mysql", "127.0.0.1", 3306, "u", "p", "d");
        config.entity = Backend::for_kind("mysql");
        let db = Database::open_lazy(config).unwrap();
        db.pool().close().await;

        let err = Tx::begin(&db).await.unwrap_err();
        assert!(matches!(err, DbError::Transaction { .. }));
    }
}
