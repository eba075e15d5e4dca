//! # Modification Window
//!
//! Issued documents may be edited or deleted only by an administrator and
//! only within 24 hours of issuance.
//!
//! ```text
//! authorize(document, role, now)
//!      │
//!      ├── role != admin          → denied: InsufficientRole
//!      ├── hours_elapsed > 24     → denied: WindowElapsed
//!      └── otherwise              → allowed
//! ```
//!
//! Every call site must also append an [`AuditRecord`]; see
//! [`audit_record`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::types::{Actor, AuditAction, AuditOutcome, AuditRecord, FiscalDocument, Role};
use crate::MODIFICATION_WINDOW_HOURS;

/// Why a modification was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowDenial {
    InsufficientRole,
    WindowElapsed,
}

impl WindowDenial {
    pub fn code(&self) -> &'static str {
        match self {
            WindowDenial::InsufficientRole => "INSUFFICIENT_ROLE",
            WindowDenial::WindowElapsed => "WINDOW_ELAPSED",
        }
    }

    pub fn message(&self) -> String {
        match self {
            WindowDenial::InsufficientRole => {
                "Only administrators can modify issued fiscal documents".to_string()
            }
            WindowDenial::WindowElapsed => format!(
                "Fiscal documents can only be modified within {} hours of issuance",
                MODIFICATION_WINDOW_HOURS
            ),
        }
    }
}

/// Outcome of a modification-window check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct WindowDecision {
    pub allowed: bool,
    pub reason: Option<WindowDenial>,
    pub hours_elapsed: f64,
}

/// Hours between issuance and `now`, fractional.
pub fn hours_elapsed(issued_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - issued_at).num_milliseconds() as f64 / 3_600_000.0
}

/// Decides whether `role` may modify `document` at `now`.
pub fn authorize(document: &FiscalDocument, role: Role, now: DateTime<Utc>) -> WindowDecision {
    let hours = hours_elapsed(document.issued_at, now);

    let reason = if role != Role::Admin {
        Some(WindowDenial::InsufficientRole)
    } else if hours > MODIFICATION_WINDOW_HOURS as f64 {
        Some(WindowDenial::WindowElapsed)
    } else {
        None
    };

    WindowDecision {
        allowed: reason.is_none(),
        reason,
        hours_elapsed: hours,
    }
}

/// Builds the audit entry for a guarded edit or delete.
///
/// `snapshot` is the document as it was before the mutation (for deletes,
/// the full deleted document). Fails only when the snapshot cannot be
/// serialized; the record is never written without it.
pub fn audit_record(
    action: AuditAction,
    snapshot: &FiscalDocument,
    actor: &Actor,
    decision: &WindowDecision,
    now: DateTime<Utc>,
) -> CoreResult<AuditRecord> {
    Ok(AuditRecord {
        id: Uuid::new_v4().to_string(),
        action,
        outcome: if decision.allowed {
            AuditOutcome::Granted
        } else {
            AuditOutcome::Denied
        },
        document_id: snapshot.id.clone(),
        document_number: snapshot.document_number.clone(),
        actor_id: actor.id.clone(),
        actor_role: actor.role,
        occurred_at: now,
        hours_elapsed: decision.hours_elapsed,
        denial_reason: decision.reason.map(|r| r.code().to_string()),
        snapshot: serde_json::to_string(snapshot)?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
