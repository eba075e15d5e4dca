//! # Domain Types
//!
//! Records shared by every layer of the fiscal core.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  FiscalPermit   │   │  AccountUsage   │   │ FiscalDocument  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  permit_number  │   │  monthly_limit  │   │  document_number│       │
//! │  │  valid_from/to  │   │  period count   │   │  sequence       │       │
//! │  │  est / pos code │   │  period start   │   │  issued_at/by   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────────┐   ┌─────────────────┐   ┌───────────────┐     │
//! │  │IntegrationCredentials│  │   AuditRecord   │   │     Role      │     │
//! │  │  ─────────────────  │   │  ─────────────  │   │  Admin        │     │
//! │  │  envelopes only     │   │  actor, hours   │   │  User         │     │
//! │  │  mode, active       │   │  snapshot JSON  │   └───────────────┘     │
//! │  └─────────────────────┘   └─────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Roles and Actors
// =============================================================================

/// Role of the account performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Store administrator. The only role allowed to touch issued documents.
    Admin,
    /// Cashier / regular operator.
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["admin".to_string(), "user".to_string()],
            }),
        }
    }
}

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Actor { id: id.into(), role }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Actor::new(id, Role::Admin)
    }

    pub fn user(id: impl Into<String>) -> Self {
        Actor::new(id, Role::User)
    }
}

// =============================================================================
// Fiscal Permit (timbrado)
// =============================================================================

/// Tax permit authorising the business to issue invoices.
///
/// Dates are optional so that an incomplete record coming from
/// configuration can still be represented and reported as such.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FiscalPermit {
    /// Permit number printed on every invoice.
    pub permit_number: String,

    /// First day the permit is valid.
    #[ts(as = "Option<String>")]
    pub valid_from: Option<NaiveDate>,

    /// Last day the permit is valid (inclusive).
    #[ts(as = "Option<String>")]
    pub valid_to: Option<NaiveDate>,

    /// Establishment code, 3 digits ("001").
    pub establishment_code: String,

    /// Point-of-sale code, 3 digits ("001").
    pub point_of_sale_code: String,
}

// =============================================================================
// Account Usage
// =============================================================================

/// Per-account monthly invoicing quota state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AccountUsage {
    pub account_id: String,

    /// Documents allowed per calendar month. Always > 0.
    pub monthly_limit: i64,

    /// Documents issued in the current period.
    pub current_period_count: i64,

    /// When the current period started.
    #[ts(as = "String")]
    pub period_started_at: DateTime<Utc>,

    /// Hard expiry of the account subscription, if any.
    #[ts(as = "Option<String>")]
    pub account_expires_at: Option<DateTime<Utc>>,

    pub active: bool,

    pub blocked: bool,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl AccountUsage {
    /// Creates a fresh usage record whose period starts at `now`.
    pub fn new(account_id: impl Into<String>, monthly_limit: i64, now: DateTime<Utc>) -> Self {
        AccountUsage {
            account_id: account_id.into(),
            monthly_limit,
            current_period_count: 0,
            period_started_at: now,
            account_expires_at: None,
            active: true,
            blocked: false,
            updated_at: now,
        }
    }

    /// Remaining documents in the current period (never negative).
    pub fn remaining(&self) -> i64 {
        (self.monthly_limit - self.current_period_count).max(0)
    }
}

/// Partial update of an [`AccountUsage`] row. `None` leaves a column as is;
/// `account_expires_at: Some(None)` clears the expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsagePatch {
    pub monthly_limit: Option<i64>,
    pub current_period_count: Option<i64>,
    pub period_started_at: Option<DateTime<Utc>>,
    pub account_expires_at: Option<Option<DateTime<Utc>>>,
    pub active: Option<bool>,
    pub blocked: Option<bool>,
}

impl UsagePatch {
    /// Patch carrying the counter and period of `usage`, as left by a
    /// rollover and/or reservation.
    pub fn counters_of(usage: &AccountUsage) -> Self {
        UsagePatch {
            current_period_count: Some(usage.current_period_count),
            period_started_at: Some(usage.period_started_at),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.monthly_limit.is_none()
            && self.current_period_count.is_none()
            && self.period_started_at.is_none()
            && self.account_expires_at.is_none()
            && self.active.is_none()
            && self.blocked.is_none()
    }

    pub fn apply_to(&self, usage: &mut AccountUsage, now: DateTime<Utc>) {
        if let Some(limit) = self.monthly_limit {
            usage.monthly_limit = limit;
        }
        if let Some(count) = self.current_period_count {
            usage.current_period_count = count;
        }
        if let Some(started) = self.period_started_at {
            usage.period_started_at = started;
        }
        if let Some(expires) = self.account_expires_at {
            usage.account_expires_at = expires;
        }
        if let Some(active) = self.active {
            usage.active = active;
        }
        if let Some(blocked) = self.blocked {
            usage.blocked = blocked;
        }
        usage.updated_at = now;
    }
}

// =============================================================================
// Fiscal Document
// =============================================================================

/// An issued invoice.
///
/// `document_number`, `sequence`, `issued_at` and `permit_number_used` are
/// fixed at issuance. Only the sale fields can change, and only through the
/// modification window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FiscalDocument {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// `EEE-PPP-NNNNNNN`.
    pub document_number: String,

    pub establishment_code: String,

    pub point_of_sale_code: String,

    /// Numeric part of `document_number`.
    pub sequence: i64,

    /// Permit in force when the document was issued.
    pub permit_number_used: String,

    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,

    /// Issuing account. Absent on records created before attribution existed.
    pub issued_by: Option<String>,

    pub customer_name: Option<String>,

    pub vehicle_plate: Option<String>,

    /// Total in cents.
    pub total_cents: i64,

    pub notes: Option<String>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Editable sale fields of an issued document. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    pub customer_name: Option<String>,
    pub vehicle_plate: Option<String>,
    pub total_cents: Option<i64>,
    pub notes: Option<String>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.customer_name.is_none()
            && self.vehicle_plate.is_none()
            && self.total_cents.is_none()
            && self.notes.is_none()
    }

    /// Applies the patch, touching `updated_at` only.
    pub fn apply_to(&self, document: &mut FiscalDocument, now: DateTime<Utc>) {
        if let Some(name) = &self.customer_name {
            document.customer_name = Some(name.clone());
        }
        if let Some(plate) = &self.vehicle_plate {
            document.vehicle_plate = Some(plate.clone());
        }
        if let Some(total) = self.total_cents {
            document.total_cents = total;
        }
        if let Some(notes) = &self.notes {
            document.notes = Some(notes.clone());
        }
        document.updated_at = now;
    }
}

// =============================================================================
// Integration Credentials
// =============================================================================

/// Tax-authority integration environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMode {
    #[default]
    Testing,
    Production,
}

/// Stored tax-integration configuration.
///
/// The secret fields hold vault envelopes, never plaintext. This type is
/// never returned to API clients; see `CredentialsView`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct IntegrationCredentials {
    pub endpoint_url: String,
    pub auth_token: String,
    pub certificate_blob: Option<String>,
    pub certificate_password: Option<String>,
    pub mode: IntegrationMode,
    pub active: bool,
    pub last_test_status: Option<String>,
    pub last_test_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Audit
// =============================================================================

/// Kind of mutation attempted on an issued document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Edit,
    Delete,
}

/// Whether the guarded mutation went ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Granted,
    Denied,
}

/// One entry of the fiscal modification audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: String,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    pub document_id: String,
    pub document_number: String,
    pub actor_id: String,
    pub actor_role: Role,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
    pub hours_elapsed: f64,
    pub denial_reason: Option<String>,
    /// JSON of the document before the edit, or of the deleted document.
    pub snapshot: String,
}

impl AuditRecord {
    /// Parses the stored snapshot back into a document.
    pub fn snapshot_document(&self) -> Result<FiscalDocument, serde_json::Error> {
        serde_json::from_str(&self.snapshot)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn document() -> FiscalDocument {
        let issued = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        FiscalDocument {
            id: "doc-1".to_string(),
            document_number: "001-001-0000001".to_string(),
            establishment_code: "001".to_string(),
            point_of_sale_code: "001".to_string(),
            sequence: 1,
            permit_number_used: "12345678".to_string(),
            issued_at: issued,
            issued_by: Some("acct-1".to_string()),
            customer_name: None,
            vehicle_plate: Some("ABC123".to_string()),
            total_cents: 1500,
            notes: None,
            updated_at: issued,
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" USER ".parse::<Role>().unwrap(), Role::User);
        assert!("cashier".parse::<Role>().is_err());
    }

    #[test]
    fn test_patch_keeps_fiscal_fields() {
        let mut doc = document();
        let later = doc.issued_at + chrono::Duration::hours(2);
        let patch = DocumentPatch {
            customer_name: Some("Ana".to_string()),
            total_cents: Some(2000),
            ..Default::default()
        };

        patch.apply_to(&mut doc, later);

        assert_eq!(doc.customer_name.as_deref(), Some("Ana"));
        assert_eq!(doc.total_cents, 2000);
        assert_eq!(doc.vehicle_plate.as_deref(), Some("ABC123"));
        assert_eq!(doc.document_number, "001-001-0000001");
        assert_eq!(doc.updated_at, later);
    }

    #[test]
    fn test_audit_snapshot_roundtrip() {
        let doc = document();
        let record = AuditRecord {
            id: "a-1".to_string(),
            action: AuditAction::Delete,
            outcome: AuditOutcome::Granted,
            document_id: doc.id.clone(),
            document_number: doc.document_number.clone(),
            actor_id: "admin-1".to_string(),
            actor_role: Role::Admin,
            occurred_at: doc.issued_at,
            hours_elapsed: 1.0,
            denial_reason: None,
            snapshot: serde_json::to_string(&doc).unwrap(),
        };

        assert_eq!(record.snapshot_document().unwrap(), doc);
    }

    #[test]
    fn test_usage_remaining() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let mut usage = AccountUsage::new("acct", 5, now);
        usage.current_period_count = 7;
        assert_eq!(usage.remaining(), 0);
    }

    #[test]
    fn test_usage_patch() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let later = now + chrono::Duration::days(1);
        let mut usage = AccountUsage::new("acct", 5, now);
        usage.account_expires_at = Some(later);

        let patch = UsagePatch {
            blocked: Some(true),
            account_expires_at: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut usage, later);

        assert!(usage.blocked);
        assert_eq!(usage.account_expires_at, None);
        assert_eq!(usage.monthly_limit, 5);
        assert_eq!(usage.updated_at, later);
        assert!(UsagePatch::default().is_empty());
    }
}
