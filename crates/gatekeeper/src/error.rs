//! Gatekeeper errors
//!
//! The caller-facing error taxonomy. Each variant maps to a stable wire code
//! via [`GatekeeperError::code`].

use optgate_core::{CoreError, DenialReason};
use optgate_persistence::PersistenceError;
use thiserror::Error;

/// Gatekeeper operation errors
#[derive(Debug, Error)]
pub enum GatekeeperError {
    // === Policy ===
    /// Compliance rejection. Never retry automatically.
    #[error("{reason}")]
    AdmissionDenied { reason: DenialReason },

    // === Input ===
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation error: {0}")]
    Validation(#[from] CoreError),

    // === Infrastructure ===
    #[error("Transient conflict after {attempts} attempts: {message}")]
    TransientConflict { attempts: u32, message: String },

    #[error("Persistence error: {0}")]
    Persistence(PersistenceError),
}

/// Result type alias for gatekeeper operations
pub type GatekeeperResult<T> = Result<T, GatekeeperError>;

impl From<PersistenceError> for GatekeeperError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Persistence(other),
        }
    }
}

impl From<sqlx::Error> for GatekeeperError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::from(err).into()
    }
}

impl GatekeeperError {
    pub fn denied(reason: DenialReason) -> Self {
        Self::AdmissionDenied { reason }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Stable code for wire responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::AdmissionDenied { reason } => reason.code(),
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::TransientConflict { .. } => "TRANSIENT_CONFLICT",
            Self::Persistence(_) => "INTERNAL",
        }
    }

    /// Whether the caller may retry the same request later.
    ///
    /// Denials are final for the current ledger state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientConflict { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::AdmissionDenied { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Lock contention inside a single attempt
    pub(crate) fn is_conflict(&self) -> bool {
        matches!(self, Self::Persistence(err) if err.is_conflict())
    }
}
