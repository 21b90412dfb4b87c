//! Shared helpers for tests that need a live server.

#![allow(dead_code)]

use sqlgate::db::{Database, DbPool, init_db_config};
use sqlgate::models::{ConnectionConfig, SelectData};
use std::path::Path;
use url::Url;

/// Open a validated connection from a `mysql://` or `postgres://` URL held in
/// `var`. Returns `None` when the variable is unset.
pub async fn connect(var: &str) -> Option<Database> {
    let raw = match std::env::var(var) {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: {var} not set");
            return None;
        }
    };
    let url = Url::parse(&raw).expect("invalid test database URL");
    let kind = if url.scheme().starts_with("mysql") {
        "mysql"
    } else {
        "postgre"
    };
    let default_port = if kind == "mysql" { 3306 } else { 5432 };

    let mut config = ConnectionConfig::new(
        kind,
        url.host_str().expect("test database URL has no host"),
        u32::from(url.port().unwrap_or(default_port)),
        url.username(),
        url.password().unwrap_or(""),
        url.path().trim_start_matches('/'),
    );
    config.max_open_conns = 5;

    let (config, diagnostics) = init_db_config(config, Path::new(".")).await;
    assert!(!diagnostics.has_fatal(), "{diagnostics:?}");
    Some(Database::open(config).await.expect("failed to connect"))
}

/// Run a statement outside the builders (DDL, fixtures).
pub async fn exec(db: &Database, sql: &str) {
    match db.pool() {
        DbPool::MySql(p) => {
            sqlx::query(sql).execute(p).await.expect(sql);
        }
        DbPool::Postgres(p) => {
            sqlx::query(sql).execute(p).await.expect(sql);
        }
    }
}

pub async fn count_rows(db: &Database, table: &str) -> i64 {
    let rows = db
        .query_data(&SelectData::from_table(table).field("COUNT(*) AS n"))
        .await
        .expect("count failed");
    rows[0]["n"].as_i64().expect("count is not an integer")
}
