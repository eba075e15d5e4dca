//! # Guarded Document Modification
//!
//! Edits and deletes of issued documents, behind the 24-hour window.
//!
//! ```text
//! edit / delete(id, actor, now)
//!     │
//!     ▼
//! begin tx ─► lock document ─► authorize(role, hours) ─► append audit
//!                                      │
//!                 ┌────── denied ──────┴────── granted ──────┐
//!                 ▼                                          ▼
//!        commit (audit only)                 mutate ─► release issuer's
//!        → FISCAL_COMPLIANCE_VIOLATION       usage (delete) ─► commit
//! ```
//!
//! Every attempt leaves an audit record, including refused ones. A granted
//! mutation and its audit record share a transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use washpos_core::validation::{validate_total_cents, validate_uuid};
use washpos_core::window::{audit_record, authorize};
use washpos_core::{
    Actor, AuditAction, AuditRecord, DocumentPatch, FiscalDocument, ValidationError,
    WindowDecision,
};
use washpos_db::{FiscalStore, FiscalTx};

use crate::error::{FiscalError, FiscalResult};
use crate::quota::UsageQuotaTracker;
use crate::tx::finish;

/// Outcome of a deletion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedDocument {
    pub document: FiscalDocument,
    /// Issuer's period count after the release; `None` when no usage was
    /// released (unknown issuer or unprovisioned account).
    pub usage_count: Option<i64>,
}

/// What a guarded transaction produced. A denial still commits its audit
/// record, so it travels as `Ok` until the transaction is finished.
enum Guarded<T> {
    Granted(T),
    Denied(WindowDecision),
}

impl<T> Guarded<T> {
    fn into_result(self) -> FiscalResult<T> {
        match self {
            Guarded::Granted(value) => Ok(value),
            Guarded::Denied(decision) => Err(FiscalError::ModificationDenied(decision)),
        }
    }
}

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn FiscalStore>,
}

impl DocumentService {
    pub fn new(store: Arc<dyn FiscalStore>) -> Self {
        DocumentService { store }
    }

    pub async fn get(&self, id: &str) -> FiscalResult<FiscalDocument> {
        self.store
            .fiscal_document(id)
            .await?
            .ok_or_else(|| FiscalError::not_found("FiscalDocument", id))
    }

    /// Audit entries of a document, oldest first. Survives deletion.
    pub async fn audit_trail(&self, document_id: &str) -> FiscalResult<Vec<AuditRecord>> {
        Ok(self.store.audit_trail(document_id).await?)
    }

    /// Applies `patch` to the sale fields of document `id`.
    pub async fn edit(
        &self,
        id: &str,
        patch: DocumentPatch,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> FiscalResult<FiscalDocument> {
        validate_uuid(id)?;
        if patch.is_empty() {
            return Err(ValidationError::Required {
                field: "patch".to_string(),
            }
            .into());
        }
        if let Some(total) = patch.total_cents {
            validate_total_cents(total)?;
        }

        let mut tx = self.store.begin().await?;
        let result = Self::edit_in(tx.as_mut(), id, &patch, actor, now).await;
        let document = finish(tx, result).await?.into_result()?;

        info!(
            document_number = %document.document_number,
            actor_id = %actor.id,
            "Fiscal document edited"
        );
        Ok(document)
    }

    /// Deletes document `id` and gives its quota back to the issuer.
    pub async fn delete(
        &self,
        id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> FiscalResult<DeletedDocument> {
        validate_uuid(id)?;

        let mut tx = self.store.begin().await?;
        let result = Self::delete_in(tx.as_mut(), id, actor, now).await;
        let deleted = finish(tx, result).await?.into_result()?;

        info!(
            document_number = %deleted.document.document_number,
            actor_id = %actor.id,
            usage_count = ?deleted.usage_count,
            "Fiscal document deleted"
        );
        Ok(deleted)
    }

    // =========================================================================
    // In-transaction stages
    // =========================================================================

    /// Locks the document, decides and records the attempt.
    async fn guard(
        tx: &mut dyn FiscalTx,
        action: AuditAction,
        id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> FiscalResult<(FiscalDocument, WindowDecision)> {
        let document = tx
            .lock_fiscal_document(id)
            .await?
            .ok_or_else(|| FiscalError::not_found("FiscalDocument", id))?;

        let decision = authorize(&document, actor.role, now);
        let record = audit_record(action, &document, actor, &decision, now)?;
        tx.append_audit(&record).await?;

        if !decision.allowed {
            warn!(
                document_number = %document.document_number,
                actor_id = %actor.id,
                role = actor.role.as_str(),
                action = ?action,
                reason = decision.reason.map(|r| r.code()).unwrap_or("UNKNOWN"),
                hours_elapsed = decision.hours_elapsed,
                "Fiscal document modification denied"
            );
        }
        Ok((document, decision))
    }

    async fn edit_in(
        tx: &mut dyn FiscalTx,
        id: &str,
        patch: &DocumentPatch,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> FiscalResult<Guarded<FiscalDocument>> {
        let (mut document, decision) = Self::guard(tx, AuditAction::Edit, id, actor, now).await?;
        if !decision.allowed {
            return Ok(Guarded::Denied(decision));
        }

        patch.apply_to(&mut document, now);
        tx.update_fiscal_document(&document).await?;
        Ok(Guarded::Granted(document))
    }

    async fn delete_in(
        tx: &mut dyn FiscalTx,
        id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> FiscalResult<Guarded<DeletedDocument>> {
        let (document, decision) = Self::guard(tx, AuditAction::Delete, id, actor, now).await?;
        if !decision.allowed {
            return Ok(Guarded::Denied(decision));
        }

        if !tx.delete_fiscal_document(id).await? {
            return Err(FiscalError::not_found("FiscalDocument", id));
        }

        let usage_count = match &document.issued_by {
            Some(issuer) => {
                let count =
                    UsageQuotaTracker::release_in(tx, issuer, document.issued_at, now).await?;
                if count.is_none() {
                    warn!(issuer = %issuer, "Issuer has no usage record, nothing released");
                }
                count
            }
            None => {
                debug!(
                    document_number = %document.document_number,
                    "Document has no recorded issuer, usage not released"
                );
                None
            }
        };

        Ok(Guarded::Granted(DeletedDocument {
            document,
            usage_count,
        }))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuance::{IssuanceService, IssueRequest};
    use crate::testing::{at, memory_store, seed, sqlite_store};
    use chrono::Duration;
    use washpos_core::{AuditOutcome, QuotaDenial, WindowDenial};

    fn request() -> IssueRequest {
        IssueRequest {
            account_id: "acct-1".to_string(),
            total_cents: 30_000,
            ..Default::default()
        }
    }

    async fn issued(store: &Arc<dyn FiscalStore>, now: DateTime<Utc>) -> FiscalDocument {
        IssuanceService::new(store.clone())
            .issue(request(), now)
            .await
            .unwrap()
            .document
    }

    #[tokio::test]
    async fn test_admin_edit_within_window() {
        let now = at(2026, 5, 10, 12);
        let store = sqlite_store().await;
        seed(&store, "acct-1", 10, now).await;
        let document = issued(&store, now).await;
        let service = DocumentService::new(store.clone());

        let patch = DocumentPatch {
            vehicle_plate: Some("XYZ 987".to_string()),
            ..Default::default()
        };
        let later = now + Duration::hours(23);
        let edited = service
            .edit(&document.id, patch, &Actor::admin("admin-1"), later)
            .await
            .unwrap();

        assert_eq!(edited.vehicle_plate.as_deref(), Some("XYZ 987"));
        assert_eq!(edited.document_number, document.document_number);
        assert_eq!(edited.updated_at, later);

        let trail = service.audit_trail(&document.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].outcome, AuditOutcome::Granted);
        assert_eq!(trail[0].snapshot_document().unwrap(), document);
    }

    #[tokio::test]
    async fn test_denied_attempts_are_audited() {
        let now = at(2026, 5, 10, 12);
        let store = memory_store();
        seed(&store, "acct-1", 10, now).await;
        let document = issued(&store, now).await;
        let service = DocumentService::new(store.clone());

        let patch = DocumentPatch {
            total_cents: Some(1),
            ..Default::default()
        };
        let err = service
            .edit(&document.id, patch.clone(), &Actor::user("cashier-1"), now)
            .await
            .unwrap_err();
        let FiscalError::ModificationDenied(decision) = &err else {
            panic!("expected window refusal, got {err:?}");
        };
        assert_eq!(decision.reason, Some(WindowDenial::InsufficientRole));

        let late = now + Duration::hours(25);
        let err = service
            .delete(&document.id, &Actor::admin("admin-1"), late)
            .await
            .unwrap_err();
        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["code"], "FISCAL_COMPLIANCE_VIOLATION");
        assert_eq!(json["reason"], "WINDOW_ELAPSED");
        assert_eq!(json["hoursElapsed"], 25.0);

        // Document untouched, both attempts recorded.
        assert_eq!(service.get(&document.id).await.unwrap(), document);
        let trail = service.audit_trail(&document.id).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert!(trail.iter().all(|r| r.outcome == AuditOutcome::Denied));
        assert_eq!(trail[0].denial_reason.as_deref(), Some("INSUFFICIENT_ROLE"));
        assert_eq!(trail[1].denial_reason.as_deref(), Some("WINDOW_ELAPSED"));
    }

    #[tokio::test]
    async fn test_delete_frees_quota() {
        let now = at(2026, 5, 10, 12);
        let store = memory_store();
        seed(&store, "acct-1", 1, now).await;
        let issuance = IssuanceService::new(store.clone());
        let service = DocumentService::new(store.clone());

        let first = issuance.issue(request(), now).await.unwrap().document;
        let err = issuance.issue(request(), now).await.unwrap_err();
        assert!(matches!(
            &err,
            FiscalError::UsageLimitExceeded(check) if check.reason == Some(QuotaDenial::LimitReached)
        ));

        let deleted = service
            .delete(&first.id, &Actor::admin("admin-1"), now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(deleted.usage_count, Some(0));
        assert!(matches!(
            service.get(&first.id).await,
            Err(FiscalError::NotFound { .. })
        ));

        let third = issuance.issue(request(), now + Duration::hours(2)).await.unwrap();
        // Deleted numbers are never reused.
        assert_eq!(third.document.document_number, "001-001-0000002");
        assert_eq!(third.usage_count, 1);

        let trail = service.audit_trail(&first.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, AuditAction::Delete);
        assert_eq!(trail[0].snapshot_document().unwrap(), first);
    }

    #[tokio::test]
    async fn test_prior_period_delete_keeps_usage() {
        let issued_at = at(2026, 4, 30, 23);
        let store = sqlite_store().await;
        seed(&store, "acct-1", 10, issued_at).await;
        let april = issued(&store, issued_at).await;

        // The May document opens a new period with count 1.
        let may_start = at(2026, 5, 1, 9);
        issued(&store, may_start).await;

        // Still inside the April document's 24h window.
        let now = at(2026, 5, 1, 10);
        let deleted = DocumentService::new(store.clone())
            .delete(&april.id, &Actor::admin("admin-1"), now)
            .await
            .unwrap();

        assert_eq!(deleted.usage_count, Some(1));
        let usage = store.account_usage("acct-1").await.unwrap().unwrap();
        assert_eq!(usage.current_period_count, 1);
        assert_eq!(usage.period_started_at, may_start);
    }

    #[tokio::test]
    async fn test_delete_without_issuer_skips_release() {
        let now = at(2026, 5, 10, 12);
        let store = memory_store();
        seed(&store, "acct-1", 10, now).await;
        let mut document = issued(&store, now).await;

        let mut tx = store.begin().await.unwrap();
        tx.delete_fiscal_document(&document.id).await.unwrap();
        document.issued_by = None;
        tx.create_fiscal_document(&document).await.unwrap();
        tx.commit().await.unwrap();

        let deleted = DocumentService::new(store.clone())
            .delete(&document.id, &Actor::admin("admin-1"), now)
            .await
            .unwrap();

        assert_eq!(deleted.usage_count, None);
        let usage = store.account_usage("acct-1").await.unwrap().unwrap();
        assert_eq!(usage.current_period_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let service = DocumentService::new(memory_store());
        let admin = Actor::admin("admin-1");
        let now = at(2026, 5, 10, 12);

        let err = service
            .delete("550e8400-e29b-41d4-a716-446655440000", &admin, now)
            .await
            .unwrap_err();
        assert!(matches!(err, FiscalError::NotFound { .. }));

        let err = service.delete("nope", &admin, now).await.unwrap_err();
        assert!(matches!(err, FiscalError::Validation(_)));

        let err = service
            .edit(
                "550e8400-e29b-41d4-a716-446655440000",
                DocumentPatch::default(),
                &admin,
                now,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FiscalError::Validation(_)));
    }
}
