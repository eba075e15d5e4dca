//! # Fiscal Permit Evaluation
//!
//! Decides whether the configured permit ("timbrado") allows invoicing on a
//! given date.
//!
//! ## Evaluation Order
//! ```text
//! evaluate(permit, as_of)
//!      │
//!      ├── no permit?                 → NotConfigured  (blocks)
//!      ├── missing number/dates/codes → Incomplete     (blocks)
//!      ├── as_of > valid_to?          → Expired        (blocks, days_left < 0)
//!      ├── days_left <= 30?           → ExpiringSoon   (does not block)
//!      └── otherwise                  → Valid
//! ```
//!
//! Pure: no clock, no storage. The caller supplies `as_of`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::FiscalPermit;
use crate::PERMIT_EXPIRY_WARNING_DAYS;

/// Caller-facing permit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PermitStatus {
    NotConfigured,
    Incomplete,
    Expired,
    ExpiringSoon,
    Valid,
}

/// Result of evaluating a permit against a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitVerdict {
    pub valid: bool,
    pub blocks_issuance: bool,
    /// `valid_to - as_of` in whole days; negative once expired.
    pub days_left: Option<i64>,
    pub error: Option<String>,
    pub status: PermitStatus,
}

impl PermitVerdict {
    fn blocking(status: PermitStatus, days_left: Option<i64>, error: impl Into<String>) -> Self {
        PermitVerdict {
            valid: false,
            blocks_issuance: true,
            days_left,
            error: Some(error.into()),
            status,
        }
    }
}

/// Evaluates `permit` as of `as_of`.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use washpos_core::permit::evaluate;
///
/// let verdict = evaluate(None, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
/// assert!(!verdict.valid);
/// assert!(verdict.blocks_issuance);
/// ```
pub fn evaluate(permit: Option<&FiscalPermit>, as_of: NaiveDate) -> PermitVerdict {
    let Some(permit) = permit else {
        return PermitVerdict::blocking(
            PermitStatus::NotConfigured,
            None,
            "Fiscal permit not configured",
        );
    };

    let missing = missing_fields(permit);
    if !missing.is_empty() {
        return PermitVerdict::blocking(
            PermitStatus::Incomplete,
            None,
            format!("Fiscal permit incomplete: missing {}", missing.join(", ")),
        );
    }

    // missing_fields() guarantees the window is present
    let (Some(_), Some(valid_to)) = (permit.valid_from, permit.valid_to) else {
        return PermitVerdict::blocking(PermitStatus::Incomplete, None, "Fiscal permit incomplete");
    };

    let days_left = (valid_to - as_of).num_days();

    if as_of > valid_to {
        return PermitVerdict::blocking(
            PermitStatus::Expired,
            Some(days_left),
            format!(
                "Fiscal permit {} expired {} day(s) ago",
                permit.permit_number,
                -days_left
            ),
        );
    }

    let status = if days_left <= PERMIT_EXPIRY_WARNING_DAYS {
        PermitStatus::ExpiringSoon
    } else {
        PermitStatus::Valid
    };

    PermitVerdict {
        valid: true,
        blocks_issuance: false,
        days_left: Some(days_left),
        error: None,
        status,
    }
}

fn missing_fields(permit: &FiscalPermit) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if permit.permit_number.trim().is_empty() {
        missing.push("permit_number");
    }
    if permit.valid_from.is_none() {
        missing.push("valid_from");
    }
    if permit.valid_to.is_none() {
        missing.push("valid_to");
    }
    if permit.establishment_code.trim().is_empty() {
        missing.push("establishment_code");
    }
    if permit.point_of_sale_code.trim().is_empty() {
        missing.push("point_of_sale_code");
    }
    missing
}

// =============================================================================
// Unit Tests
// =============================================================================
