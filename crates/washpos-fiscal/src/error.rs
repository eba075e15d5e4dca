//! # Fiscal Error Type
//!
//! Unified error type for every fiscal service, and the JSON body callers
//! render from it.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Fiscal Core                        │
//! │                                                                         │
//! │  Service call                                                           │
//! │       │                                                                 │
//! │       ├── policy verdict refused ─► UsageLimitExceeded / PermitInvalid  │
//! │       │                             / ModificationDenied        (403)   │
//! │       ├── bad input ──────────────► Validation                  (400)   │
//! │       ├── missing key / permit ───► Configuration               (400)   │
//! │       ├── DbError::NotFound ──────► NotFound                    (404)   │
//! │       ├── DbError::Conflict ──────► Conflict, retryable         (409)   │
//! │       └── anything else ──────────► Internal                    (500)   │
//! │                                                                         │
//! │  FiscalError ──► ErrorResponse { error, details, code, ...context }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Policy refusals are expected outcomes: they carry the verdict that
//! caused them so the response can say *why* (usage, days left, hours
//! elapsed). Only `Conflict` is worth retrying, and the core never does it
//! on its own.

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use washpos_core::{
    CoreError, PermitStatus, PermitVerdict, QuotaCheck, ValidationError, WindowDecision,
    MODIFICATION_WINDOW_HOURS,
};
use washpos_db::DbError;
use washpos_vault::VaultError;

use crate::config::ConfigError;

/// Errors returned by the fiscal services.
#[derive(Debug, Error)]
pub enum FiscalError {
    /// Quota gate refused the issuance.
    #[error("Usage limit exceeded: {}", quota_reason(.0))]
    UsageLimitExceeded(QuotaCheck),

    /// The fiscal permit blocks issuance.
    #[error("Fiscal permit invalid: {}", .0.error.as_deref().unwrap_or("blocked"))]
    PermitInvalid(PermitVerdict),

    /// The modification window guard refused an edit or delete.
    #[error("Modification denied: {}", window_reason(.0))]
    ModificationDenied(WindowDecision),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Missing or unusable configuration (key, permit codes, sequence space).
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A unique record already exists. Retrying will not help.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: String, id: String },

    /// Lost a race for the write lock. Retrying may succeed.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn quota_reason(check: &QuotaCheck) -> &'static str {
    check.reason.map(|r| r.code()).unwrap_or("UNKNOWN")
}

fn window_reason(decision: &WindowDecision) -> &'static str {
    decision.reason.map(|r| r.code()).unwrap_or("UNKNOWN")
}

/// Result type for fiscal operations.
pub type FiscalResult<T> = Result<T, FiscalError>;

// =============================================================================
// Error Codes
// =============================================================================

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Quota refused (403)
    UsageLimitExceeded,

    /// Permit ("timbrado") missing, incomplete or expired (403)
    #[serde(rename = "TIMBRADO_INVALID")]
    TimbradoInvalid,

    /// Modification window or role refused (403)
    FiscalComplianceViolation,

    /// Input validation failed (400)
    ValidationError,

    /// Configuration missing or unusable (400)
    ConfigurationError,

    /// Resource not found (404)
    NotFound,

    /// Write conflict or duplicate (409)
    Conflict,

    /// Internal error (500)
    Internal,
}

impl FiscalError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        FiscalError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            FiscalError::UsageLimitExceeded(_) => ErrorCode::UsageLimitExceeded,
            FiscalError::PermitInvalid(_) => ErrorCode::TimbradoInvalid,
            FiscalError::ModificationDenied(_) => ErrorCode::FiscalComplianceViolation,
            FiscalError::Validation(_) => ErrorCode::ValidationError,
            FiscalError::Configuration(_) => ErrorCode::ConfigurationError,
            FiscalError::NotFound { .. } => ErrorCode::NotFound,
            FiscalError::AlreadyExists { .. } | FiscalError::Conflict(_) => ErrorCode::Conflict,
            FiscalError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// HTTP-equivalent status.
    pub fn status(&self) -> u16 {
        match self.code() {
            ErrorCode::UsageLimitExceeded
            | ErrorCode::TimbradoInvalid
            | ErrorCode::FiscalComplianceViolation => 403,
            ErrorCode::ValidationError | ErrorCode::ConfigurationError => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::Internal => 500,
        }
    }

    /// True when the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FiscalError::Conflict(_))
    }

    /// Short title for the `error` field.
    fn title(&self) -> &'static str {
        match self {
            FiscalError::UsageLimitExceeded(_) => "Usage limit exceeded",
            FiscalError::PermitInvalid(_) => "Fiscal permit invalid",
            FiscalError::ModificationDenied(_) => "Fiscal compliance violation",
            FiscalError::Validation(_) => "Validation error",
            FiscalError::Configuration(_) => "Configuration error",
            FiscalError::NotFound { .. } => "Not found",
            FiscalError::AlreadyExists { .. } => "Already exists",
            FiscalError::Conflict(_) => "Conflict",
            FiscalError::Internal(_) => "Internal error",
        }
    }

    /// Human-readable detail for the `details` field.
    fn details(&self) -> String {
        match self {
            FiscalError::UsageLimitExceeded(check) => match check.reason {
                Some(reason) => reason.message().to_string(),
                None => "Usage limit exceeded".to_string(),
            },
            FiscalError::PermitInvalid(verdict) => verdict
                .error
                .clone()
                .unwrap_or_else(|| "Fiscal permit blocks issuance".to_string()),
            FiscalError::ModificationDenied(decision) => match decision.reason {
                Some(reason) => reason.message(),
                None => "Modification denied".to_string(),
            },
            FiscalError::Validation(e) => e.to_string(),
            FiscalError::Configuration(msg) | FiscalError::Conflict(msg) => msg.clone(),
            FiscalError::NotFound { entity, id } => format!("{} not found: {}", entity, id),
            FiscalError::AlreadyExists { entity, id } => {
                format!("{} already exists: {}", entity, id)
            }
            // Internal details stay in the logs.
            FiscalError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// Builds the response body.
    pub fn to_response(&self) -> ErrorResponse {
        let context = match self {
            FiscalError::UsageLimitExceeded(check) => Some(ErrorContext::Quota {
                current_usage: check.current_usage,
                limit: check.limit,
                days_until_reset: check.days_until_reset,
                reason: check.reason.map(|r| r.code().to_string()),
            }),
            FiscalError::PermitInvalid(verdict) => Some(ErrorContext::Permit {
                days_left: verdict.days_left,
                status: verdict.status,
            }),
            FiscalError::ModificationDenied(decision) => Some(ErrorContext::Window {
                hours_elapsed: decision.hours_elapsed,
                max_hours: MODIFICATION_WINDOW_HOURS,
                reason: decision.reason.map(|r| r.code().to_string()),
            }),
            _ => None,
        };

        ErrorResponse {
            error: self.title().to_string(),
            details: self.details(),
            code: self.code(),
            retryable: self.is_retryable(),
            context,
        }
    }
}

// =============================================================================
// Response Body
// =============================================================================

/// JSON body for a failed fiscal operation.
///
/// ```json
/// {
///   "error": "Usage limit exceeded",
///   "details": "Monthly document limit reached",
///   "code": "USAGE_LIMIT_EXCEEDED",
///   "currentUsage": 5,
///   "limit": 5,
///   "daysUntilReset": 12,
///   "reason": "LIMIT_REACHED"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
    #[serde(flatten)]
    pub context: Option<ErrorContext>,
}

/// Verdict fields merged into [`ErrorResponse`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ErrorContext {
    #[serde(rename_all = "camelCase")]
    Quota {
        current_usage: i64,
        limit: i64,
        days_until_reset: Option<i64>,
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Permit {
        days_left: Option<i64>,
        status: PermitStatus,
    },
    #[serde(rename_all = "camelCase")]
    Window {
        hours_elapsed: f64,
        max_hours: i64,
        reason: Option<String>,
    },
}

impl From<&FiscalError> for ErrorResponse {
    fn from(err: &FiscalError) -> Self {
        err.to_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// ## Error Mapping
/// ```text
/// DbError::NotFound         → NotFound
/// DbError::UniqueViolation  → AlreadyExists
/// DbError::is_retryable()   → Conflict (retryable)
/// Other                     → Internal (logged)
/// ```
impl From<DbError> for FiscalError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => FiscalError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => FiscalError::AlreadyExists {
                entity: field,
                id: value,
            },
            err if err.is_retryable() => {
                tracing::warn!(reason = %err, "Fiscal write conflict");
                FiscalError::Conflict("Another fiscal operation is in progress, retry".to_string())
            }
            other => {
                tracing::error!(error = %other, "Database operation failed");
                FiscalError::Internal(other.to_string())
            }
        }
    }
}

impl From<CoreError> for FiscalError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SequenceExhausted { .. } => FiscalError::Configuration(format!(
                "{}; a new establishment or point-of-sale code is required",
                err
            )),
            CoreError::InvalidDocumentNumber(number) => {
                tracing::error!(%number, "Stored document number is malformed");
                FiscalError::Internal(format!("Invalid document number '{}'", number))
            }
            CoreError::AuditSnapshot(e) => {
                tracing::error!(error = %e, "Audit snapshot serialization failed");
                FiscalError::Internal(format!("Audit snapshot could not be serialized: {}", e))
            }
            CoreError::Validation(e) => FiscalError::Validation(e),
        }
    }
}

impl From<VaultError> for FiscalError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::KeyTooShort { .. } | VaultError::KeyRequired(_) => {
                FiscalError::Configuration(err.to_string())
            }
            other => {
                tracing::error!(error = %other, "Credential vault failure");
                FiscalError::Internal(other.to_string())
            }
        }
    }
}

impl From<ConfigError> for FiscalError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Vault(vault) => FiscalError::from(vault),
            other => FiscalError::Configuration(other.to_string()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use washpos_core::{QuotaDenial, WindowDenial};

    #[test]
    fn test_quota_response_shape() {
        let err = FiscalError::UsageLimitExceeded(QuotaCheck {
            allowed: false,
            reason: Some(QuotaDenial::LimitReached),
            current_usage: 5,
            limit: 5,
            days_until_reset: Some(12),
        });

        assert_eq!(err.status(), 403);
        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["code"], "USAGE_LIMIT_EXCEEDED");
        assert_eq!(json["currentUsage"], 5);
        assert_eq!(json["limit"], 5);
        assert_eq!(json["daysUntilReset"], 12);
        assert_eq!(json["reason"], "LIMIT_REACHED");
        assert_eq!(json["details"], "Monthly document limit reached");
        assert!(json.get("retryable").is_none());
    }

    #[test]
    fn test_permit_response_shape() {
        let err = FiscalError::PermitInvalid(PermitVerdict {
            valid: false,
            blocks_issuance: true,
            days_left: Some(-1),
            error: Some("Fiscal permit expired 1 day(s) ago".to_string()),
            status: PermitStatus::Expired,
        });

        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["code"], "TIMBRADO_INVALID");
        assert_eq!(json["daysLeft"], -1);
        assert_eq!(json["status"], "expired");
    }

    #[test]
    fn test_window_response_shape() {
        let err = FiscalError::ModificationDenied(WindowDecision {
            allowed: false,
            reason: Some(WindowDenial::WindowElapsed),
            hours_elapsed: 25.0,
        });

        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["code"], "FISCAL_COMPLIANCE_VIOLATION");
        assert_eq!(json["hoursElapsed"], 25.0);
        assert_eq!(json["maxHours"], 24);
        assert_eq!(json["reason"], "WINDOW_ELAPSED");
    }

    #[test]
    fn test_conflict_is_retryable() {
        let err = FiscalError::from(DbError::Conflict("database is locked".into()));
        assert!(err.is_retryable());
        assert_eq!(err.status(), 409);
        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["code"], "CONFLICT");
        assert_eq!(json["retryable"], true);

        let dup = FiscalError::from(DbError::duplicate("account_usage.account_id", "a"));
        assert!(!dup.is_retryable());
        assert_eq!(dup.code(), ErrorCode::Conflict);
    }

    #[test]
    fn test_retryable_db_errors_stay_retryable() {
        let cases = [
            DbError::Conflict("database is locked".into()),
            DbError::PoolExhausted,
            DbError::not_found("FiscalDocument", "x"),
            DbError::duplicate("document_number", "001-001-0000001"),
            DbError::QueryFailed("syntax error".into()),
        ];
        for db_err in cases {
            let expected = db_err.is_retryable();
            assert_eq!(FiscalError::from(db_err).is_retryable(), expected);
        }
    }

    #[test]
    fn test_audit_snapshot_failure_is_internal() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = FiscalError::from(CoreError::AuditSnapshot(json_err));
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(err.status(), 500);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = FiscalError::from(DbError::QueryFailed("no such table: x".into()));
        assert_eq!(err.status(), 500);
        assert_eq!(err.to_response().details, "An internal error occurred");
    }

    #[test]
    fn test_key_errors_are_configuration() {
        let err = FiscalError::from(VaultError::KeyRequired("WASHPOS_ENCRYPTION_KEY"));
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
        assert_eq!(err.status(), 400);
    }
}
