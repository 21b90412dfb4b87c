//! Cascading host deletion.
//!
//! Deleting a host removes its dependent rows from every child table and then
//! soft-marks the host row, all inside one transaction. The child tables are
//! listed in an explicit [`CascadePlan`]; no foreign-key cascade is assumed.
//!
//! The first failure, for any host, rolls the whole batch back.

use crate::db::{Database, Dialect, Tx};
use crate::error::{DbError, DbResult};
use crate::models::{FieldData, SelectData, WhereData, stringify_value};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::{error, info};

/// Layout of the `deletetime` value written when a root is soft-deleted.
pub const DELETE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Status written to a soft-deleted root.
pub const DELETED_STATUS: &str = "deleted";

/// One step of a cascade, run once per root identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeStep {
    /// Delete rows of `table` whose `column` holds the root identifier.
    ByRoot { table: String, column: String },
    /// Look up child keys of the root in `lookup_table`, then delete the rows
    /// of every table in `tables` whose `key_column` holds one of those keys.
    ByChildKey {
        lookup_table: String,
        root_column: String,
        key_column: String,
        tables: Vec<String>,
    },
}

impl CascadeStep {
    pub fn by_root(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ByRoot {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Tables this step deletes from, in order.
    pub fn tables(&self) -> Vec<&str> {
        match self {
            Self::ByRoot { table, .. } => vec![table.as_str()],
            Self::ByChildKey { tables, .. } => tables.iter().map(String::as_str).collect(),
        }
    }

    async fn run(&self, tx: &mut Tx, root_id: &str, report: &mut DeleteReport) -> DbResult<()> {
        let backend = tx.backend();
        match self {
            Self::ByRoot { table, column } => {
                let spec = SelectData::from_table(table.as_str())
                    .filter(column.as_str(), backend.build_where_field_exact_with_slice(&[root_id]));
                let deleted = tx
                    .delete_data(&spec)
                    .await
                    .map_err(|e| DbError::cascade(table.as_str(), root_id, e))?;
                report.record(table, deleted);
            }
            Self::ByChildKey {
                lookup_table,
                root_column,
                key_column,
                tables,
            } => {
                let lookup = SelectData::from_table(lookup_table.as_str())
                    .field(key_column.as_str())
                    .filter(
                        root_column.as_str(),
                        backend.build_where_field_exact_with_slice(&[root_id]),
                    );
                let rows = tx
                    .query_data(&lookup)
                    .await
                    .map_err(|e| DbError::cascade(lookup_table.as_str(), root_id, e))?;

                // Only the key column is selected; Postgres may fold its name.
                let keys: Vec<String> = rows
                    .iter()
                    .filter_map(|row| row.values().next())
                    .map(stringify_value)
                    .filter(|key| !key.is_empty())
                    .collect();
                for key in &keys {
                    let filter = backend.build_where_field_exact_with_slice(&[key.as_str()]);
                    for table in tables {
                        let spec = SelectData::from_table(table.as_str())
                            .filter(key_column.as_str(), filter.as_str());
                        let deleted = tx
                            .delete_data(&spec)
                            .await
                            .map_err(|e| DbError::cascade(table.as_str(), root_id, e))?;
                        report.record(table, deleted);
                    }
                }
            }
        }
        Ok(())
    }
}

/// The ordered dependent tables of a root table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadePlan {
    pub root_table: String,
    /// Column of the root table holding the identifier.
    pub root_column: String,
    pub steps: Vec<CascadeStep>,
}

impl CascadePlan {
    /// Dependents of a `host` row.
    pub fn host() -> Self {
        Self {
            root_table: "host".to_string(),
            root_column: "hostid".to_string(),
            steps: vec![
                CascadeStep::by_root("hostIP", "hostid"),
                CascadeStep::ByChildKey {
                    lookup_table: "command".to_string(),
                    root_column: "hostID".to_string(),
                    key_column: "commandID".to_string(),
                    tables: ["commandHistory", "commandParameters", "commandStatusHistory", "commandLogs"]
                        .into_iter()
                        .map(String::from)
                        .collect(),
                },
                CascadeStep::by_root("hostYum", "hostid"),
                CascadeStep::by_root("hostMAC", "hostid"),
            ],
        }
    }

    /// Every table the plan deletes from, in execution order.
    pub fn tables(&self) -> Vec<&str> {
        self.steps.iter().flat_map(CascadeStep::tables).collect()
    }
}

/// Outcome of a committed cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub transaction_id: String,
    /// Roots soft-marked as deleted.
    pub roots: Vec<String>,
    /// Rows deleted per child table.
    pub deleted_rows: BTreeMap<String, u64>,
}

impl DeleteReport {
    fn record(&mut self, table: &str, rows: u64) {
        *self.deleted_rows.entry(table.to_string()).or_default() += rows;
    }
}

/// Delete hosts and their dependents atomically.
pub async fn delete_hosts(db: &Database, host_ids: &[String]) -> DbResult<DeleteReport> {
    run_plan(db, &CascadePlan::host(), host_ids).await
}

/// Run `plan` for every identifier in one transaction.
///
/// Identifiers are trimmed; a blank one rejects the batch before the
/// transaction starts.
pub async fn run_plan(db: &Database, plan: &CascadePlan, ids: &[String]) -> DbResult<DeleteReport> {
    let ids = normalize_ids(ids)?;

    let mut tx = Tx::begin(db).await?;
    let mut report = DeleteReport {
        transaction_id: tx.id().to_string(),
        ..Default::default()
    };

    match apply(&mut tx, plan, &ids, &mut report).await {
        Ok(()) => {
            tx.commit().await?;
            info!(
                transaction_id = %report.transaction_id,
                roots = report.roots.len(),
                root_table = %plan.root_table,
                "Cascading delete committed"
            );
            Ok(report)
        }
        Err(e) => {
            error!(
                transaction_id = %report.transaction_id,
                error = %e,
                "Cascading delete failed, rolling back"
            );
            if let Err(rollback_err) = tx.rollback().await {
                error!(
                    transaction_id = %report.transaction_id,
                    error = %rollback_err,
                    "Rollback failed"
                );
            }
            Err(e)
        }
    }
}

fn normalize_ids(ids: &[String]) -> DbResult<Vec<String>> {
    if ids.is_empty() {
        return Err(DbError::invalid_input("no identifiers requested to delete"));
    }
    ids.iter()
        .map(|id| {
            let id = id.trim();
            if id.is_empty() {
                Err(DbError::invalid_input("identifier to delete is blank"))
            } else {
                Ok(id.to_string())
            }
        })
        .collect()
}

async fn apply(
    tx: &mut Tx,
    plan: &CascadePlan,
    ids: &[String],
    report: &mut DeleteReport,
) -> DbResult<()> {
    for id in ids {
        for step in &plan.steps {
            step.run(tx, id, report).await?;
        }
    }

    let deletetime = chrono::Local::now().format(DELETE_TIME_FORMAT).to_string();
    let mut data = FieldData::new();
    data.insert("status".to_string(), JsonValue::from(DELETED_STATUS));
    data.insert("deletetime".to_string(), JsonValue::from(deletetime));

    let step = format!("mark {} deleted", plan.root_table);
    for id in ids {
        let mut filters = WhereData::new();
        filters.insert(
            plan.root_column.clone(),
            tx.backend().build_where_field_exact_with_slice(&[id.as_str()]),
        );
        let updated = tx
            .update_data(&plan.root_table, &data, &filters)
            .await
            .map_err(|e| DbError::cascade(step.as_str(), id.as_str(), e))?;
        if updated == 0 {
            return Err(DbError::cascade(
                step.as_str(),
                id.as_str(),
                DbError::invalid_input(format!("no {} row matches {}", plan.root_table, id)),
            ));
        }
        report.roots.push(id.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Backend;
    use crate::models::ConnectionConfig;

    #[test]
    fn test_host_plan_order() {
        let plan = CascadePlan::host();
        assert_eq!(plan.root_table, "host");
        assert_eq!(
            plan.tables(),
            vec![
                "hostIP",
                "commandHistory",
                "commandParameters",
                "commandStatusHistory",
                "commandLogs",
                "hostYum",
                "hostMAC",
            ]
        );
    }

    #[test]
    fn test_normalize_ids() {
        let ids = vec![" 7 ".to_string(), "8".to_string()];
        assert_eq!(normalize_ids(&ids).unwrap(), vec!["7", "8"]);
        assert!(normalize_ids(&[]).is_err());
        assert!(normalize_ids(&["7".to_string(), "  ".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_blank_id_rejected_before_transaction() {
        let mut config = ConnectionConfig::new("mysql", "127.0.0.1", 3306, "u", "p", "d");
        config.entity = Backend::for_kind("mysql");
        let db = Database::open_lazy(config).unwrap();

        let err = delete_hosts(&db, &["".to_string()]).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert_eq!(db.pool().size(), 0);
        db.close().await;
    }

    #[test]
    fn test_report_accumulates() {
        let mut report = DeleteReport::default();
        report.record("hostIP", 2);
        report.record("hostIP", 1);
        assert_eq!(report.deleted_rows["hostIP"], 3);
    }
}
