//! # Database Error Types
//!
//! Error types for storage operations, shared by both backends.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          MemoryStore                        │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ← Adds context and categorization                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  FiscalError (washpos-fiscal) ← Mapped to error code + status           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ErrorResponse JSON for the caller                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate document number
    /// - Duplicate (establishment, point of sale, sequence)
    /// - Provisioning an account twice
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation {
        field: String,
        value: String,
    },

    /// Another writer holds the database. Safe to retry the whole operation.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True when re-running the failed operation may succeed. The fiscal
    /// layer maps exactly these errors to a retryable conflict.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Conflict(_) | DbError::PoolExhausted)
    }
}

/// SQLite primary/extended result codes meaning "someone else holds the lock":
/// SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_LOCKED_SHAREDCACHE (262),
/// SQLITE_BUSY_RECOVERY (261), SQLITE_BUSY_SNAPSHOT (517).
const BUSY_CODES: &[&str] = &["5", "6", "261", "262", "517"];

fn is_busy(code: Option<&str>, message: &str) -> bool {
    code.is_some_and(|c| BUSY_CODES.contains(&c))
        || message.contains("database is locked")
        || message.contains("database table is locked")
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → busy/locked → Conflict, else constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                if is_busy(code.as_deref(), msg) {
                    DbError::Conflict(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<column>"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_detection() {
        assert!(is_busy(Some("5"), "anything"));
        assert!(is_busy(Some("517"), ""));
        assert!(is_busy(None, "database is locked"));
        assert!(!is_busy(Some("19"), "UNIQUE constraint failed: x.y"));
    }

    #[test]
    fn test_retryable() {
        assert!(DbError::Conflict("busy".into()).is_retryable());
        assert!(DbError::PoolExhausted.is_retryable());
        assert!(!DbError::not_found("Document", "x").is_retryable());
        assert!(!DbError::duplicate("document_number", "001-001-0000001").is_retryable());
    }
}
