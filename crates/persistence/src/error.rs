//! # Persistence Errors
//!
//! Error types for the Ledger Store, wrapping sqlx errors. SQLite lock
//! contention is classified as [`PersistenceError::Conflict`] so callers can
//! retry the whole transaction.

use optgate_core::CoreError;
use thiserror::Error;

/// SQLITE_BUSY
const SQLITE_BUSY: i32 = 5;
/// SQLITE_LOCKED
const SQLITE_LOCKED: i32 = 6;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    // === Database errors ===
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Write lock or snapshot contention; the transaction may be retried
    #[error("Concurrency conflict: {0}")]
    Conflict(String),

    // === Conversion errors ===
    #[error("Invalid stored value: {0}")]
    InvalidRow(#[from] CoreError),

    // === Configuration errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_foreign_key_violation() {
                return Self::ForeignKeyViolation(db_err.message().to_string());
            }

            let primary = db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);
            if matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
                || db_err.message().contains("database is locked")
            {
                return Self::Conflict(db_err.message().to_string());
            }
        }
        Self::Database(err)
    }
}

impl PersistenceError {
    /// Create NotFound error
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether retrying the enclosing transaction may succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, Self::ForeignKeyViolation(_))
    }
}
