//! Error types for the data access layer.
//!
//! This module defines all error types using `thiserror`. Every variant maps
//! onto the diagnostic severity scale so callers can treat validation
//! diagnostics and runtime errors with one abort policy.

use crate::models::Severity;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Transaction error: {message} (transaction: {transaction_id})")]
    Transaction {
        message: String,
        transaction_id: String,
    },

    #[error(
        "Timeout: {operation} exceeded {}",
        .limit_secs.map_or_else(|| "its time limit".to_string(), |s| format!("{s}s"))
    )]
    Timeout {
        operation: String,
        /// Unknown when raised by the driver without pool context.
        limit_secs: Option<u64>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Cascade step '{step}' failed for {root}: {source}")]
    Cascade {
        step: String,
        root: String,
        #[source]
        source: Box<DbError>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    pub fn transaction(message: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            transaction_id: transaction_id.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, limit_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            limit_secs: Some(limit_secs),
        }
    }

    /// Fill in the limit of a timeout raised without one.
    pub(crate) fn with_time_limit(self, secs: u64) -> Self {
        match self {
            Self::Timeout {
                operation,
                limit_secs: None,
            } => Self::Timeout {
                operation,
                limit_secs: Some(secs),
            },
            other => other,
        }
    }

    /// Create an invalid input error. Raised before any SQL is sent.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap the failure of one cascade step with the step name and root record.
    pub fn cascade(step: impl Into<String>, root: impl Into<String>, source: DbError) -> Self {
        Self::Cascade {
            step: step.into(),
            root: root.into(),
            source: Box::new(source),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::Cascade { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// Check if this error is retryable. Retrying is left to the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } => true,
            Self::Cascade { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Severity of this error on the diagnostic scale.
    ///
    /// Connection and configuration failures are fatal: the dependent
    /// subsystem cannot start without them.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Connection { .. } | Self::Configuration { .. } => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection parameters and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::Timeout {
                operation: "connection pool acquire".to_string(),
                limit_secs: None,
            },
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reopen the database connection")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify the sslmode setting and certificate files",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => DbError::schema(
                format!("Type not found: {}", type_name),
                type_name.to_string(),
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::database(
            "Syntax error",
            Some("42601".to_string()),
            "Check SQL syntax",
        );
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
        assert_eq!(DbError::invalid_input("x").suggestion(), None);
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::timeout("query", 30).is_retryable());
        assert!(DbError::connection("err", "sugg").is_retryable());
        assert!(!DbError::invalid_input("empty payload").is_retryable());
    }

    #[test]
    fn test_connection_errors_are_fatal() {
        assert_eq!(DbError::connection("a", "b").severity(), Severity::Fatal);
        assert_eq!(DbError::configuration("bad").severity(), Severity::Fatal);
        assert_eq!(DbError::invalid_input("bad").severity(), Severity::Error);
        assert_eq!(
            DbError::database("boom", None, "x").severity(),
            Severity::Error
        );
    }

    #[test]
    fn test_cascade_error_keeps_source() {
        let inner = DbError::database("lock wait timeout", Some("HY000".into()), "retry later");
        let err = DbError::cascade("hostIP", "host 7", inner);
        let text = err.to_string();
        assert!(text.contains("hostIP"));
        assert!(text.contains("host 7"));
        assert!(text.contains("lock wait timeout"));
        assert_eq!(err.suggestion(), Some("retry later"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_pool_timeout_reports_configured_limit() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(!err.to_string().contains("30s"));
        let err = err.with_time_limit(12);
        assert_eq!(
            err.to_string(),
            "Timeout: connection pool acquire exceeded 12s"
        );
        assert!(err.is_retryable());

        let err = DbError::timeout("query", 5).with_time_limit(12);
        assert!(err.to_string().ends_with("5s"));
    }

    #[test]
    fn test_pool_closed_maps_to_connection() {
        let err: DbError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, DbError::Connection { .. }));
    }
}
