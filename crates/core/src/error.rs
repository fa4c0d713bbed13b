//! # Error Module
//!
//! Domain validation errors. These never involve I/O.

use thiserror::Error;

/// Core domain errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // === Destination errors ===
    #[error("Destination is empty")]
    EmptyDestination,

    #[error("Invalid destination '{value}': {reason}")]
    InvalidDestination { value: String, reason: String },

    // === Report errors ===
    #[error("Unknown outcome kind: {0}")]
    UnknownOutcome(String),

    #[error("Unknown reason code: {0}")]
    UnknownReasonCode(i64),

    // === Message errors ===
    #[error("Message body is empty")]
    EmptyBody,

    // === Id errors ===
    #[error("Invalid {entity} id: {value}")]
    InvalidId { entity: &'static str, value: String },
}

/// Result type alias with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn invalid_destination(value: &str, reason: &str) -> Self {
        Self::InvalidDestination {
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_id(entity: &'static str, value: &str) -> Self {
        Self::InvalidId {
            entity,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(CoreError::EmptyDestination.to_string(), "Destination is empty");
        assert_eq!(
            CoreError::UnknownReasonCode(12345).to_string(),
            "Unknown reason code: 12345"
        );

        let err = CoreError::invalid_destination("abc", "contains non-digit characters");
        assert!(err.to_string().contains("abc"));
        assert!(err.to_string().contains("non-digit"));
    }

    #[test]
    fn test_invalid_id() {
        let err = CoreError::invalid_id("message", "not-a-uuid");
        assert_eq!(err.to_string(), "Invalid message id: not-a-uuid");
    }
}
