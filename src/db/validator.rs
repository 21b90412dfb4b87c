//! Connection configuration validation.
//!
//! [`init_db_config`] checks a raw [`ConnectionConfig`], corrects what it
//! safely can and binds the [`Backend`] for the configured engine. Problems
//! are reported as [`Diagnostics`]; nothing here returns an error.

use crate::db::dialect::{Backend, Dialect};
use crate::models::{ConnectionConfig, DatabaseType, Diagnostics, SslMode};
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Pool limit applied when a configured limit is below 1.
pub const DEFAULT_POOL_LIMIT: u32 = 10;

/// Pool limits outside this range are accepted with a warning.
pub const RECOMMENDED_POOL_RANGE: std::ops::RangeInclusive<u32> = 10..=2000;

/// True when `kind` names a supported engine, ignoring case.
pub fn is_supported_db(kind: &str) -> bool {
    DatabaseType::SUPPORTED_KINDS
        .iter()
        .any(|k| k.eq_ignore_ascii_case(kind.trim()))
}

/// Validate `name` with the identifier rules of the engine `kind`.
///
/// Unsupported kinds never accept an identifier.
pub fn check_identifier(kind: &str, name: &str) -> bool {
    Backend::for_kind(kind).is_some_and(|backend| backend.identifier(name))
}

/// Resolve `file` against `base_dir` and check it can be opened for reading.
pub fn resolve_file(file: &Path, base_dir: &Path) -> io::Result<PathBuf> {
    let joined = if file.is_absolute() {
        file.to_path_buf()
    } else {
        base_dir.join(file)
    };
    let absolute = std::path::absolute(&joined)?;
    std::fs::File::open(&absolute)?;
    Ok(absolute)
}

/// Check and complete a connection configuration.
///
/// Relative TLS material paths are resolved against `base_dir`. Validation
/// stops at the first fatal diagnostic; the returned config then has no
/// bound entity or is otherwise unusable, and callers must not open it.
pub async fn init_db_config(
    mut config: ConnectionConfig,
    base_dir: &Path,
) -> (ConnectionConfig, Diagnostics) {
    let mut diags = Diagnostics::new();
    diags.debug("checking database configuration");

    // Engine kind
    let Some(db_type) = config.database_type() else {
        diags.fatal(format!(
            "database type '{}' is not supported (supported: {})",
            config.db_type,
            DatabaseType::SUPPORTED_KINDS.join(", ")
        ));
        return (config, diags);
    };
    config.entity = Some(Backend::for_type(db_type));
    diags.debug(format!("database type {} is valid", db_type));

    // Host
    let host = config.host.trim().to_string();
    if host.is_empty() {
        diags.fatal("database host is empty");
        return (config, diags);
    }
    match resolve_host(&host).await {
        Ok(ip) => {
            config.host_ip = Some(ip);
            diags.debug(format!("database host {} resolved to {}", host, ip));
        }
        Err(e) => {
            diags.fatal(format!(
                "can not get an ip address for database host {}: {}",
                host, e
            ));
            return (config, diags);
        }
    }

    // Port
    if config.port <= 1024 || config.port > 65535 {
        diags.fatal(format!(
            "database port {} must be greater than 1024 and at most 65535",
            config.port
        ));
        return (config, diags);
    }
    diags.debug(format!("database port {} is valid", config.port));

    // TLS
    check_tls(&mut config, base_dir, &mut diags);

    // Pool limits
    config.max_open_conns = check_pool_limit("max open connections", config.max_open_conns, &mut diags);
    config.max_idle_conns = check_pool_limit("max idle connections", config.max_idle_conns, &mut diags);

    diags.debug("all database configuration parameters have been checked");
    (config, diags)
}

async fn resolve_host(host: &str) -> io::Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    tokio::net::lookup_host((host, 0u16))
        .await?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "lookup returned no address"))
}

fn check_tls(config: &mut ConnectionConfig, base_dir: &Path, diags: &mut Diagnostics) {
    if config.ssl_mode.trim().is_empty() {
        diags.debug("sslmode is not set, using disable");
        config.ssl_mode = SslMode::Disable.to_string();
        return;
    }

    let mode = match config.ssl_mode.parse::<SslMode>() {
        Ok(mode) => mode,
        Err(e) => {
            diags.warning(format!("{}, connecting with sslmode disable", e));
            disable_tls(config);
            return;
        }
    };
    config.ssl_mode = mode.to_string();
    if mode.is_disabled() {
        return;
    }

    let resolve = |path: &Option<PathBuf>| -> Result<PathBuf, String> {
        let path = path.as_deref().ok_or_else(|| "not set".to_string())?;
        resolve_file(path, base_dir).map_err(|e| format!("{}: {}", path.display(), e))
    };

    match (
        resolve(&config.ssl_ca),
        resolve(&config.ssl_cert),
        resolve(&config.ssl_key),
    ) {
        (Ok(ca), Ok(cert), Ok(key)) => {
            config.ssl_ca = Some(ca);
            config.ssl_cert = Some(cert);
            config.ssl_key = Some(key);
            diags.debug("certificate files have been checked");
        }
        (ca, cert, key) => {
            let failures: Vec<String> = [("ca", ca), ("cert", cert), ("key", key)]
                .into_iter()
                .filter_map(|(name, r)| r.err().map(|e| format!("{} ({})", name, e)))
                .collect();
            diags.warning(format!(
                "sslmode is {} but certificate files are not readable: {}; connecting with sslmode disable",
                mode,
                failures.join(", ")
            ));
            disable_tls(config);
        }
    }
}

fn disable_tls(config: &mut ConnectionConfig) {
    config.ssl_mode = SslMode::Disable.to_string();
    config.ssl_ca = None;
    config.ssl_cert = None;
    config.ssl_key = None;
}

fn check_pool_limit(name: &str, value: u32, diags: &mut Diagnostics) -> u32 {
    let value = if value < 1 {
        diags.warning(format!(
            "{} is {}, it must be at least 1; using {}",
            name, value, DEFAULT_POOL_LIMIT
        ));
        DEFAULT_POOL_LIMIT
    } else {
        value
    };
    if !RECOMMENDED_POOL_RANGE.contains(&value) {
        diags.warning(format!(
            "{} is {}, it should be between {} and {}",
            name,
            value,
            RECOMMENDED_POOL_RANGE.start(),
            RECOMMENDED_POOL_RANGE.end()
        ));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use std::io::Write;

    fn config(kind: &str) -> ConnectionConfig {
        ConnectionConfig::new(kind, "127.0.0.1", 3306, "sysadm", "secret", "sysadm")
    }

    #[test]
    fn test_is_supported_db() {
        assert!(is_supported_db("mysql"));
        assert!(is_supported_db("Postgre"));
        assert!(is_supported_db("postgresql"));
        assert!(!is_supported_db("sqlite"));
        assert!(!is_supported_db(""));
    }

    #[test]
    fn test_check_identifier() {
        assert!(check_identifier("mysql", "host"));
        assert!(check_identifier("postgre", "valid_Table1"));
        assert!(!check_identifier("mysql", "bad name!"));
        assert!(!check_identifier("oracle", "host"));
    }

    #[tokio::test]
    async fn test_supported_kinds_bind_entity() {
        for kind in ["mysql", "MySQL", "postgre", "postgres", "postgresql"] {
            let (cfg, diags) = init_db_config(config(kind), Path::new("/")).await;
            assert!(!diags.has_fatal(), "{kind}: {:?}", diags);
            let expected = Backend::for_type(DatabaseType::from_kind(kind).unwrap());
            assert_eq!(cfg.entity, Some(expected));
        }
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_fatal() {
        for kind in ["oracle", "sqlite", ""] {
            let (cfg, diags) = init_db_config(config(kind), Path::new("/")).await;
            assert!(diags.has_fatal());
            assert!(cfg.entity.is_none());
        }
    }

    #[tokio::test]
    async fn test_host_checks() {
        let mut cfg = config("mysql");
        cfg.host = "  ".into();
        let (_, diags) = init_db_config(cfg, Path::new("/")).await;
        assert!(diags.has_fatal());

        let mut cfg = config("mysql");
        cfg.host = "::1".into();
        let (cfg, diags) = init_db_config(cfg, Path::new("/")).await;
        assert!(!diags.has_fatal());
        assert_eq!(cfg.host_ip, Some("::1".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_port_bounds() {
        for (port, fatal) in [(1024, true), (1025, false), (65535, false), (65536, true), (0, true)] {
            let mut cfg = config("postgre");
            cfg.port = port;
            let (_, diags) = init_db_config(cfg, Path::new("/")).await;
            assert_eq!(diags.has_fatal(), fatal, "port {port}");
        }
    }

    #[tokio::test]
    async fn test_validation_stops_at_first_fatal() {
        let mut cfg = config("mysql");
        cfg.port = 80;
        let (cfg, diags) = init_db_config(cfg, Path::new("/")).await;
        assert!(diags.has_fatal());
        assert_eq!(cfg.ssl_mode, "");
        assert_eq!(cfg.max_open_conns, 0);
    }

    #[tokio::test]
    async fn test_unset_sslmode_defaults_to_disable() {
        let (cfg, diags) = init_db_config(config("mysql"), Path::new("/")).await;
        assert_eq!(cfg.ssl_mode, "disable");
        assert!(diags.iter().all(|d| d.severity < Severity::Error));
    }

    #[tokio::test]
    async fn test_unreadable_cert_downgrades_tls() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("ca.pem");
        let key = dir.path().join("client-key.pem");
        std::fs::File::create(&ca).unwrap().write_all(b"ca").unwrap();
        std::fs::File::create(&key).unwrap().write_all(b"key").unwrap();

        let mut cfg = config("mysql");
        cfg.ssl_mode = "verify-ca".into();
        cfg.ssl_ca = Some(ca);
        cfg.ssl_cert = Some(PathBuf::from("missing-cert.pem"));
        cfg.ssl_key = Some(key);

        let (cfg, diags) = init_db_config(cfg, dir.path()).await;
        assert!(!diags.has_fatal());
        assert!(diags.has_warnings());
        assert_eq!(cfg.ssl_mode, "disable");
        assert!(cfg.ssl_ca.is_none());
        assert!(cfg.ssl_cert.is_none());
        assert!(cfg.ssl_key.is_none());
    }

    #[tokio::test]
    async fn test_readable_certs_resolved_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("certs")).unwrap();
        for name in ["ca.pem", "cert.pem", "key.pem"] {
            std::fs::write(dir.path().join("certs").join(name), b"pem").unwrap();
        }

        let mut cfg = config("postgre");
        cfg.ssl_mode = "REQUIRE".into();
        cfg.ssl_ca = Some(PathBuf::from("certs/ca.pem"));
        cfg.ssl_cert = Some(PathBuf::from("certs/cert.pem"));
        cfg.ssl_key = Some(PathBuf::from("certs/key.pem"));

        let (cfg, diags) = init_db_config(cfg, dir.path()).await;
        assert!(!diags.has_fatal());
        assert_eq!(cfg.ssl_mode, "require");
        let ca = cfg.ssl_ca.unwrap();
        assert!(ca.is_absolute());
        assert!(ca.ends_with("certs/ca.pem"));
        assert!(cfg.ssl_key.unwrap().is_absolute());
    }

    #[tokio::test]
    async fn test_unknown_sslmode_downgrades() {
        let mut cfg = config("mysql");
        cfg.ssl_mode = "sometimes".into();
        cfg.ssl_ca = Some(PathBuf::from("/etc/hostname"));
        let (cfg, diags) = init_db_config(cfg, Path::new("/")).await;
        assert!(diags.has_warnings());
        assert_eq!(cfg.ssl_mode, "disable");
        assert!(cfg.ssl_ca.is_none());
    }

    #[tokio::test]
    async fn test_pool_limits() {
        let (cfg, diags) = init_db_config(config("mysql"), Path::new("/")).await;
        assert_eq!(cfg.max_open_conns, DEFAULT_POOL_LIMIT);
        assert_eq!(cfg.max_idle_conns, DEFAULT_POOL_LIMIT);
        assert_eq!(diags.at_least(Severity::Warning).count(), 2);

        let mut raw = config("mysql");
        raw.max_open_conns = 5000;
        raw.max_idle_conns = 50;
        let (cfg, diags) = init_db_config(raw, Path::new("/")).await;
        assert_eq!(cfg.max_open_conns, 5000);
        assert_eq!(cfg.max_idle_conns, 50);
        assert_eq!(diags.at_least(Severity::Warning).count(), 1);
    }
}
