//! Configuration handling for the sqlgate binary.
//!
//! Connection parameters come from an optional JSON file, then CLI arguments
//! and environment variables, the latter overriding the file field by field.

use crate::error::{DbError, DbResult};
use crate::models::ConnectionConfig;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration for the sqlgate binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sqlgate",
    about = "Validate a MySQL/PostgreSQL connection and run maintenance operations against it",
    version,
    author
)]
pub struct Cli {
    /// JSON file holding the connection parameters
    #[arg(short, long, value_name = "FILE", env = "SQLGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database engine (mysql, postgre, postgres, postgresql)
    #[arg(long = "type", value_name = "KIND", env = "SQLGATE_DB_TYPE")]
    pub db_type: Option<String>,

    /// Database host name or IP address
    #[arg(long, env = "SQLGATE_DB_HOST")]
    pub host: Option<String>,

    /// Database port (defaults to the engine's standard port)
    #[arg(long, env = "SQLGATE_DB_PORT")]
    pub port: Option<u32>,

    #[arg(long, env = "SQLGATE_DB_USER")]
    pub user: Option<String>,

    /// Contains sensitive data - never log
    #[arg(long, env = "SQLGATE_DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long = "dbname", env = "SQLGATE_DB_NAME")]
    pub db_name: Option<String>,

    /// TLS mode (disable, prefer, require, verify-ca, verify-full)
    #[arg(long = "sslmode", env = "SQLGATE_DB_SSLMODE")]
    pub ssl_mode: Option<String>,

    /// CA certificate; relative paths resolve against the install directory
    #[arg(long = "sslca", env = "SQLGATE_DB_SSLCA")]
    pub ssl_ca: Option<PathBuf>,

    #[arg(long = "sslcert", env = "SQLGATE_DB_SSLCERT")]
    pub ssl_cert: Option<PathBuf>,

    #[arg(long = "sslkey", env = "SQLGATE_DB_SSLKEY")]
    pub ssl_key: Option<PathBuf>,

    /// Maximum open connections (values below 1 become 10)
    #[arg(long, env = "SQLGATE_DB_MAX_OPEN_CONNS")]
    pub max_open_conns: Option<u32>,

    #[arg(long, env = "SQLGATE_DB_MAX_IDLE_CONNS")]
    pub max_idle_conns: Option<u32>,

    /// Connection max lifetime in seconds
    #[arg(long, env = "SQLGATE_DB_CONN_MAX_LIFETIME")]
    pub conn_max_lifetime: Option<u64>,

    /// Pool acquire timeout in seconds
    #[arg(long, env = "SQLGATE_DB_ACQUIRE_TIMEOUT")]
    pub acquire_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "SQLGATE_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "SQLGATE_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Operation to run once the connection is open.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Validate the configuration, connect and ping
    Check,
    /// Select rows from a table and print them as JSON lines
    Query {
        /// Table to read
        table: String,
        /// Columns to return (default: all)
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Exact-match filter as column=value; a comma-separated value matches any of them
        #[arg(short = 'w', long = "where", value_name = "COLUMN=VALUE", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        /// Row limit, optionally followed by an offset: --limit 10 --limit 20
        #[arg(short, long, num_args = 1..=2)]
        limit: Vec<u64>,
    },
    /// Delete hosts and every dependent row in one transaction
    DeleteHosts {
        /// Host identifiers
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<String>,
    },
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    let (column, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUE, got '{s}'"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("missing column in '{s}'"));
    }
    Ok((column.to_string(), value.trim().to_string()))
}

impl Cli {
    /// Assemble the raw connection parameters.
    ///
    /// Starts from the JSON file when one is given, otherwise from empty
    /// values, then applies every flag that was set.
    pub fn into_connection_config(&self) -> DbResult<ConnectionConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => ConnectionConfig::new("", "", 0, "", "", ""),
        };

        if let Some(v) = &self.db_type {
            config.db_type = v.clone();
        }
        if let Some(v) = &self.host {
            config.host = v.clone();
        }
        if let Some(v) = self.port {
            config.port = v;
        }
        if let Some(v) = &self.user {
            config.user = v.clone();
        }
        if let Some(v) = &self.password {
            config.password = v.clone();
        }
        if let Some(v) = &self.db_name {
            config.db_name = v.clone();
        }
        if let Some(v) = &self.ssl_mode {
            config.ssl_mode = v.clone();
        }
        if self.ssl_ca.is_some() {
            config.ssl_ca = self.ssl_ca.clone();
        }
        if self.ssl_cert.is_some() {
            config.ssl_cert = self.ssl_cert.clone();
        }
        if self.ssl_key.is_some() {
            config.ssl_key = self.ssl_key.clone();
        }
        if let Some(v) = self.max_open_conns {
            config.max_open_conns = v;
        }
        if let Some(v) = self.max_idle_conns {
            config.max_idle_conns = v;
        }
        if let Some(v) = self.conn_max_lifetime {
            config.conn_max_lifetime_secs = v;
        }
        if let Some(v) = self.acquire_timeout {
            config.acquire_timeout_secs = v;
        }

        if config.port == 0 {
            if let Some(db_type) = config.database_type() {
                config.port = u32::from(db_type.default_port());
            }
        }
        Ok(config)
    }
}

/// Read connection parameters from a JSON file.
pub fn load_config_file(path: &Path) -> DbResult<ConnectionConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        DbError::configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| DbError::configuration(format!("invalid config file {}: {e}", path.display())))
}

/// Directory relative TLS paths are resolved against: the parent of the
/// directory holding the executable.
pub fn install_dir() -> DbResult<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| DbError::configuration(format!("cannot locate executable: {e}")))?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(".."))
}
