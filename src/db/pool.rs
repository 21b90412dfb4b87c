//! Connection pool management.
//!
//! This module opens the native pool for a validated [`ConnectionConfig`].
//! Database-specific pools (`MySqlPool`, `PgPool`) are used instead of
//! `AnyPool` to keep full type support.

use crate::db::dialect::{Backend, Dialect};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, DatabaseType, SslMode};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{MySqlPool, PgPool};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            DbPool::MySql(pool) => pool.is_closed(),
            DbPool::Postgres(pool) => pool.is_closed(),
        }
    }

    /// Number of connections currently held, idle or in use.
    pub fn size(&self) -> u32 {
        match self {
            DbPool::MySql(pool) => pool.size(),
            DbPool::Postgres(pool) => pool.size(),
        }
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySQL,
            DbPool::Postgres(_) => DatabaseType::PostgreSQL,
        }
    }
}

/// An opened database: the validated config, its bound backend and the pool.
///
/// Created by [`Database::open`] and released exactly once by
/// [`Database::close`]. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    config: Arc<ConnectionConfig>,
    backend: Backend,
    pool: DbPool,
}

impl Database {
    /// Open the pool for a validated configuration and ping it.
    pub async fn open(config: ConnectionConfig) -> DbResult<Self> {
        let backend = bound_backend(&config)?;
        let url = connection_url(&config, false)?;
        info!(
            db_type = %backend,
            url = %connection_url(&config, true)?,
            max_open_conns = config.max_open_conns,
            "Opening database connection"
        );

        let pool = match backend {
            Backend::MySql(_) => {
                let options = mysql_options(&url)?;
                let pool = mysql_pool_options(&config)
                    .connect_with(options)
                    .await
                    .map_err(|e| open_error(DatabaseType::MySQL, &e))?;
                DbPool::MySql(pool)
            }
            Backend::Postgres(_) => {
                let options = postgres_options(&url)?;
                let pool = postgres_pool_options(&config)
                    .connect_with(options)
                    .await
                    .map_err(|e| open_error(DatabaseType::PostgreSQL, &e))?;
                DbPool::Postgres(pool)
            }
        };

        let db = Self {
            config: Arc::new(config),
            backend,
            pool,
        };
        if let Err(e) = db.ping().await {
            db.pool.close().await;
            return Err(e);
        }

        info!(db_type = %backend, "Database connection opened");
        Ok(db)
    }

    /// Build the pool without connecting.
    ///
    /// No connection is made until the first statement runs, so the pool
    /// size stays zero for calls rejected before execution.
    pub fn open_lazy(config: ConnectionConfig) -> DbResult<Self> {
        let backend = bound_backend(&config)?;
        let url = connection_url(&config, false)?;
        let pool = match backend {
            Backend::MySql(_) => {
                DbPool::MySql(mysql_pool_options(&config).connect_lazy_with(mysql_options(&url)?))
            }
            Backend::Postgres(_) => DbPool::Postgres(
                postgres_pool_options(&config).connect_lazy_with(postgres_options(&url)?),
            ),
        };
        debug!(db_type = %backend, "Lazy database pool created");
        Ok(Self {
            config: Arc::new(config),
            backend,
            pool,
        })
    }

    /// Round-trip a trivial statement to prove the server is reachable.
    pub async fn ping(&self) -> DbResult<()> {
        let result = match &self.pool {
            DbPool::MySql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            DbPool::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        };
        result.map_err(|e| {
            DbError::connection(
                format!("Ping failed: {}", e),
                connection_suggestion(self.backend.database_type(), &e),
            )
        })
    }

    /// Close the pool. Warns, but still closes, if it was already closed.
    pub async fn close(self) {
        if self.pool.is_closed() {
            warn!(db_type = %self.backend, "Database connection is already closed");
        }
        self.pool.close().await;
        info!(db_type = %self.backend, "Database connection closed");
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl Backend {
    /// Open the native pool for `config`, which must carry this backend.
    pub async fn open_connection(&self, config: ConnectionConfig) -> DbResult<Database> {
        match config.entity {
            Some(bound) if bound == *self => Database::open(config).await,
            _ => Err(DbError::configuration(format!(
                "configuration is not bound to the {} backend",
                self
            ))),
        }
    }
}

fn bound_backend(config: &ConnectionConfig) -> DbResult<Backend> {
    config.entity.ok_or_else(|| {
        DbError::configuration("configuration has not been validated: no backend is bound")
    })
}

/// Build the native connection URL for `config`.
///
/// With `masked` set the password is replaced so the URL can be logged. TLS
/// parameters are omitted entirely when the mode is `disable`.
pub fn connection_url(config: &ConnectionConfig, masked: bool) -> DbResult<String> {
    let db_type = config.database_type().ok_or_else(|| {
        DbError::configuration(format!("database type '{}' is not supported", config.db_type))
    })?;
    let scheme = match db_type {
        DatabaseType::MySQL => "mysql",
        DatabaseType::PostgreSQL => "postgres",
    };

    let mut url = Url::parse(&format!("{}://localhost", scheme))
        .map_err(|e| DbError::internal(format!("Failed to build connection URL: {}", e)))?;
    let invalid = |what: &str| DbError::configuration(format!("invalid database {}", what));

    let host = config.host.trim();
    let host = match host.parse::<std::net::Ipv6Addr>() {
        Ok(_) => format!("[{}]", host),
        Err(_) => host.to_string(),
    };
    url.set_host(Some(&host)).map_err(|_| invalid("host"))?;
    let port = u16::try_from(config.port).map_err(|_| invalid("port"))?;
    url.set_port(Some(port)).map_err(|_| invalid("port"))?;
    url.set_username(&config.user).map_err(|_| invalid("user"))?;
    if !config.password.is_empty() {
        let password = if masked { "****" } else { config.password.as_str() };
        url.set_password(Some(password)).map_err(|_| invalid("password"))?;
    }
    url.set_path(&config.db_name);

    let mode = config.tls_mode();
    if !mode.is_disabled() {
        let mut query = url.query_pairs_mut();
        let names = match db_type {
            DatabaseType::MySQL => ["ssl-mode", "ssl-ca", "ssl-cert", "ssl-key"],
            DatabaseType::PostgreSQL => ["sslmode", "sslrootcert", "sslcert", "sslkey"],
        };
        let mode_param = match db_type {
            DatabaseType::MySQL => mode.mysql_param(),
            DatabaseType::PostgreSQL => mode.postgres_param(),
        };
        query.append_pair(names[0], mode_param);
        for (name, path) in names[1..]
            .iter()
            .zip([&config.ssl_ca, &config.ssl_cert, &config.ssl_key])
        {
            if let Some(path) = path {
                query.append_pair(name, &path.to_string_lossy());
            }
        }
    }

    Ok(url.to_string())
}

fn mysql_options(url: &str) -> DbResult<MySqlConnectOptions> {
    MySqlConnectOptions::from_str(url)
        .map(|o| o.charset("utf8mb4"))
        .map_err(|e| {
            DbError::connection(
                format!("Invalid MySQL connection parameters: {}", e),
                "Check host, port, credentials and TLS settings",
            )
        })
}

fn postgres_options(url: &str) -> DbResult<PgConnectOptions> {
    PgConnectOptions::from_str(url).map_err(|e| {
        DbError::connection(
            format!("Invalid PostgreSQL connection parameters: {}", e),
            "Check host, port, credentials and TLS settings",
        )
    })
}

fn mysql_pool_options(config: &ConnectionConfig) -> MySqlPoolOptions {
    MySqlPoolOptions::new()
        .max_connections(config.max_open_conns.max(1))
        .max_lifetime(Some(Duration::from_secs(config.conn_max_lifetime_secs)))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
}

fn postgres_pool_options(config: &ConnectionConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_open_conns.max(1))
        .max_lifetime(Some(Duration::from_secs(config.conn_max_lifetime_secs)))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
}

fn open_error(db_type: DatabaseType, error: &sqlx::Error) -> DbError {
    DbError::connection(
        format!("Failed to connect: {}", error),
        connection_suggestion(db_type, error),
    )
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the database user and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return format!(
            "Check the TLS material or set sslmode to {}",
            SslMode::Disable
        );
    }

    format!(
        "Verify the {} host and port (default port {})",
        db_type,
        db_type.default_port()
    )
}
