//! # Error Types
//!
//! Domain-specific error types for washpos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  washpos-core (this file)                                               │
//! │  ├── CoreError        - Fiscal rule failures                            │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  washpos-vault  └── VaultError   - Key / envelope failures              │
//! │  washpos-db     └── DbError      - Storage failures                     │
//! │  washpos-fiscal └── FiscalError  - What callers see (with a code)       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → FiscalError → ErrorResponse        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Fiscal rule errors that are not policy verdicts.
///
/// Policy outcomes (quota, permit, modification window) are returned as
/// verdict structs, not errors, so callers can render the details.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The 7-digit sequence space of an establishment/point pair is used up.
    #[error("Sequence exhausted for {establishment_code}-{point_of_sale_code}")]
    SequenceExhausted {
        establishment_code: String,
        point_of_sale_code: String,
    },

    /// A stored document number does not follow `EEE-PPP-NNNNNNN`.
    #[error("Invalid document number '{0}'")]
    InvalidDocumentNumber(String),

    /// The document snapshot for an audit record could not be serialized.
    #[error("Audit snapshot could not be serialized: {0}")]
    AuditSnapshot(#[from] serde_json::Error),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. a code that is not 3 digits).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Two fields are inconsistent with each other.
    #[error("{field}: {reason}")]
    Inconsistent { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::SequenceExhausted {
            establishment_code: "001".to_string(),
            point_of_sale_code: "002".to_string(),
        };
        assert_eq!(err.to_string(), "Sequence exhausted for 001-002");

        let err = ValidationError::Required {
            field: "permit_number".to_string(),
        };
        assert_eq!(err.to_string(), "permit_number is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::MustBePositive {
            field: "monthly_limit".to_string(),
        }
        .into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_snapshot_error_converts_to_core_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let core_err: CoreError = json_err.into();
        assert!(matches!(core_err, CoreError::AuditSnapshot(_)));
        assert!(core_err.to_string().starts_with("Audit snapshot could not be serialized"));
    }
}
