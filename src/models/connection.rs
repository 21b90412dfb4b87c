//! Connection-related data models.
//!
//! This module defines the connection parameters consumed by the validator
//! and the engine and TLS mode enumerations derived from them.

use crate::db::Backend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_CONN_MAX_LIFETIME_SECS: u64 = 300;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
}

impl DatabaseType {
    /// Every engine kind accepted in configuration, case-insensitively.
    pub const SUPPORTED_KINDS: &'static [&'static str] =
        &["postgre", "postgres", "postgresql", "mysql"];

    /// Parse an engine kind as written in configuration.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "postgre" | "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "mysql" => Some(Self::MySQL),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::PostgreSQL => 5432,
            Self::MySQL => 3306,
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// TLS mode for the client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    /// Canonical configuration spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }

    /// Value of the MySQL `ssl-mode` connection parameter.
    pub fn mysql_param(&self) -> &'static str {
        match self {
            Self::Disable => "DISABLED",
            Self::Prefer => "PREFERRED",
            Self::Require => "REQUIRED",
            Self::VerifyCa => "VERIFY_CA",
            Self::VerifyFull => "VERIFY_IDENTITY",
        }
    }

    /// Value of the PostgreSQL `sslmode` connection parameter.
    pub fn postgres_param(&self) -> &'static str {
        self.as_str()
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disable)
    }
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "disable" | "disabled" => Ok(Self::Disable),
            "prefer" | "preferred" => Ok(Self::Prefer),
            "require" | "required" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" | "verify-identity" => Ok(Self::VerifyFull),
            other => Err(format!("unknown ssl mode: {other}")),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection parameters plus the backend bound at validation time.
///
/// Deserialized from the raw configuration, then completed by
/// [`crate::db::init_db_config`]: `host_ip` and `entity` are filled in there
/// and never change afterwards.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Engine kind as written in configuration ("mysql", "postgre", ...).
    #[serde(rename = "type")]
    pub db_type: String,
    pub host: String,
    #[serde(skip)]
    pub host_ip: Option<IpAddr>,
    pub port: u32,
    #[serde(default)]
    pub user: String,
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, rename = "dbname")]
    pub db_name: String,
    /// Empty means "disable".
    #[serde(default, rename = "sslmode")]
    pub ssl_mode: String,
    #[serde(default, rename = "sslca")]
    pub ssl_ca: Option<PathBuf>,
    #[serde(default, rename = "sslcert")]
    pub ssl_cert: Option<PathBuf>,
    #[serde(default, rename = "sslkey")]
    pub ssl_key: Option<PathBuf>,
    /// Values below 1 are raised to 10 by the validator.
    #[serde(default, rename = "maxopenconns")]
    pub max_open_conns: u32,
    #[serde(default, rename = "maxidleconns")]
    pub max_idle_conns: u32,
    #[serde(default = "default_conn_max_lifetime", rename = "connmaxlifetime")]
    pub conn_max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout", rename = "acquiretimeout")]
    pub acquire_timeout_secs: u64,
    #[serde(skip)]
    pub entity: Option<Backend>,
}

fn default_conn_max_lifetime() -> u64 {
    DEFAULT_CONN_MAX_LIFETIME_SECS
}

fn default_acquire_timeout() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_SECS
}

impl ConnectionConfig {
    /// Create an unvalidated configuration with default TLS and pool settings.
    pub fn new(
        db_type: impl Into<String>,
        host: impl Into<String>,
        port: u32,
        user: impl Into<String>,
        password: impl Into<String>,
        db_name: impl Into<String>,
    ) -> Self {
        Self {
            db_type: db_type.into(),
            host: host.into(),
            host_ip: None,
            port,
            user: user.into(),
            password: password.into(),
            db_name: db_name.into(),
            ssl_mode: String::new(),
            ssl_ca: None,
            ssl_cert: None,
            ssl_key: None,
            max_open_conns: 0,
            max_idle_conns: 0,
            conn_max_lifetime_secs: DEFAULT_CONN_MAX_LIFETIME_SECS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            entity: None,
        }
    }

    /// Engine kind, if the configured string names a supported engine.
    pub fn database_type(&self) -> Option<DatabaseType> {
        DatabaseType::from_kind(&self.db_type)
    }

    /// Parsed TLS mode. Unset or unrecognised values read as `Disable`.
    pub fn tls_mode(&self) -> SslMode {
        self.ssl_mode.parse().unwrap_or_default()
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("host_ip", &self.host_ip)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"****")
            .field("db_name", &self.db_name)
            .field("ssl_mode", &self.ssl_mode)
            .field("ssl_ca", &self.ssl_ca)
            .field("ssl_cert", &self.ssl_cert)
            .field("ssl_key", &self.ssl_key)
            .field("max_open_conns", &self.max_open_conns)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("conn_max_lifetime_secs", &self.conn_max_lifetime_secs)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("entity", &self.entity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_from_kind() {
        assert_eq!(DatabaseType::from_kind("mysql"), Some(DatabaseType::MySQL));
        assert_eq!(DatabaseType::from_kind("MySQL"), Some(DatabaseType::MySQL));
        assert_eq!(
            DatabaseType::from_kind("postgre"),
            Some(DatabaseType::PostgreSQL)
        );
        assert_eq!(
            DatabaseType::from_kind("PostgreSQL"),
            Some(DatabaseType::PostgreSQL)
        );
        assert_eq!(DatabaseType::from_kind("oracle"), None);
        assert_eq!(DatabaseType::from_kind(""), None);
    }

    #[test]
    fn test_ssl_mode_parse() {
        assert_eq!("disable".parse::<SslMode>().unwrap(), SslMode::Disable);
        assert_eq!("REQUIRED".parse::<SslMode>().unwrap(), SslMode::Require);
        assert_eq!("verify_ca".parse::<SslMode>().unwrap(), SslMode::VerifyCa);
        assert_eq!(
            "verify-identity".parse::<SslMode>().unwrap(),
            SslMode::VerifyFull
        );
        assert!("sometimes".parse::<SslMode>().is_err());
    }

    #[test]
    fn test_ssl_mode_params() {
        assert_eq!(SslMode::VerifyFull.mysql_param(), "VERIFY_IDENTITY");
        assert_eq!(SslMode::VerifyFull.postgres_param(), "verify-full");
        assert!(SslMode::Disable.is_disabled());
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{"type":"mysql","host":"127.0.0.1","port":3306,"user":"sysadm","password":"secret","dbname":"sysadm"}"#,
        )
        .unwrap();
        assert_eq!(config.database_type(), Some(DatabaseType::MySQL));
        assert_eq!(config.ssl_mode, "");
        assert_eq!(config.tls_mode(), SslMode::Disable);
        assert_eq!(config.max_open_conns, 0);
        assert_eq!(config.conn_max_lifetime_secs, DEFAULT_CONN_MAX_LIFETIME_SECS);
        assert!(config.entity.is_none());
    }

    #[test]
    fn test_password_never_serialized_or_debugged() {
        let config = ConnectionConfig::new("mysql", "db.local", 3306, "u", "secret", "d");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
