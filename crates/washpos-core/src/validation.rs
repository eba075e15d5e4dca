//! # Validation Module
//!
//! Input validation for fiscal configuration and issuance requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin frontend                                                │
//! │  └── Basic format checks, immediate feedback                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  └── Permit invariants, codes, limits, amounts                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  └── NOT NULL, UNIQUE (document number, sequence), CHECK constraints    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Months, NaiveDate};

use crate::error::ValidationError;
use crate::types::FiscalPermit;
use crate::{MAX_PERMIT_BACKDATE_YEARS, MAX_TEXT_FIELD_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Code Validators
// =============================================================================

/// Validates an establishment or point-of-sale code: exactly 3 ASCII digits.
///
/// ## Example
/// ```rust
/// use washpos_core::validation::validate_code;
///
/// assert!(validate_code("establishment_code", "001").is_ok());
/// assert!(validate_code("establishment_code", "1").is_err());
/// assert!(validate_code("establishment_code", "00A").is_err());
/// ```
pub fn validate_code(field: &str, code: &str) -> ValidationResult<()> {
    if code.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be exactly 3 digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Permit Validators
// =============================================================================

/// Validates a permit before it is saved.
///
/// ## Rules
/// - Permit number, both dates and both codes are present
/// - Codes are 3 digits
/// - `valid_from < valid_to`
/// - `valid_from` is at most 5 years before `today`
pub fn validate_permit(permit: &FiscalPermit, today: NaiveDate) -> ValidationResult<()> {
    if permit.permit_number.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "permit_number".to_string(),
        });
    }

    if permit.permit_number.len() > MAX_TEXT_FIELD_LEN {
        return Err(ValidationError::TooLong {
            field: "permit_number".to_string(),
            max: MAX_TEXT_FIELD_LEN,
        });
    }

    let valid_from = permit.valid_from.ok_or_else(|| ValidationError::Required {
        field: "valid_from".to_string(),
    })?;
    let valid_to = permit.valid_to.ok_or_else(|| ValidationError::Required {
        field: "valid_to".to_string(),
    })?;

    validate_code("establishment_code", &permit.establishment_code)?;
    validate_code("point_of_sale_code", &permit.point_of_sale_code)?;

    if valid_from >= valid_to {
        return Err(ValidationError::Inconsistent {
            field: "valid_from".to_string(),
            reason: "must be before valid_to".to_string(),
        });
    }

    let earliest = today
        .checked_sub_months(Months::new(MAX_PERMIT_BACKDATE_YEARS * 12))
        .unwrap_or(NaiveDate::MIN);
    if valid_from < earliest {
        return Err(ValidationError::Inconsistent {
            field: "valid_from".to_string(),
            reason: format!(
                "cannot be more than {} years in the past",
                MAX_PERMIT_BACKDATE_YEARS
            ),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a monthly document limit (> 0).
pub fn validate_monthly_limit(limit: i64) -> ValidationResult<()> {
    if limit <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "monthly_limit".to_string(),
        });
    }

    Ok(())
}

/// Validates a document total in cents. Zero is allowed (courtesy washes).
pub fn validate_total_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "total_cents".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates an account identifier (non-empty, bounded).
pub fn validate_account_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "account_id".to_string(),
        });
    }

    if id.len() > MAX_TEXT_FIELD_LEN {
        return Err(ValidationError::TooLong {
            field: "account_id".to_string(),
            max: MAX_TEXT_FIELD_LEN,
        });
    }

    Ok(())
}

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use washpos_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn permit() -> FiscalPermit {
        FiscalPermit {
            permit_number: "12345678".to_string(),
            valid_from: Some(date(2026, 1, 1)),
            valid_to: Some(date(2026, 12, 31)),
            establishment_code: "001".to_string(),
            point_of_sale_code: "002".to_string(),
        }
    }

    #[test]
    fn test_validate_code() {
        assert!(validate_code("pos", "001").is_ok());
        assert!(validate_code("pos", "999").is_ok());
        assert!(validate_code("pos", "").is_err());
        assert!(validate_code("pos", "01").is_err());
        assert!(validate_code("pos", "0001").is_err());
        assert!(validate_code("pos", "0a1").is_err());
    }

    #[test]
    fn test_validate_permit_ok() {
        assert!(validate_permit(&permit(), date(2026, 6, 1)).is_ok());
    }

    #[test]
    fn test_validate_permit_missing_fields() {
        let mut p = permit();
        p.permit_number = "  ".to_string();
        assert!(matches!(
            validate_permit(&p, date(2026, 6, 1)),
            Err(ValidationError::Required { .. })
        ));

        let mut p = permit();
        p.valid_to = None;
        assert!(validate_permit(&p, date(2026, 6, 1)).is_err());
    }

    #[test]
    fn test_validate_permit_window_order() {
        let mut p = permit();
        p.valid_to = p.valid_from;
        assert!(matches!(
            validate_permit(&p, date(2026, 6, 1)),
            Err(ValidationError::Inconsistent { .. })
        ));
    }

    #[test]
    fn test_validate_permit_backdating() {
        let mut p = permit();
        p.valid_from = Some(date(2020, 1, 1));
        assert!(validate_permit(&p, date(2026, 6, 1)).is_err());

        p.valid_from = Some(date(2021, 6, 1));
        assert!(validate_permit(&p, date(2026, 6, 1)).is_ok());
    }

    #[test]
    fn test_validate_numbers() {
        assert!(validate_monthly_limit(1).is_ok());
        assert!(validate_monthly_limit(0).is_err());
        assert!(validate_total_cents(0).is_ok());
        assert!(validate_total_cents(-1).is_err());
    }

    #[test]
    fn test_validate_ids() {
        assert!(validate_account_id("acct-1").is_ok());
        assert!(validate_account_id("").is_err());
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("123").is_err());
    }
}
