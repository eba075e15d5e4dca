//! # SQLite Backend
//!
//! [`FiscalStore`] over a sqlx pool.
//!
//! ## Write Serialization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Issuance A                         Issuance B                          │
//! │  ──────────                         ──────────                          │
//! │  BEGIN                              BEGIN                               │
//! │  UPDATE fiscal_write_lock  ◄─ lock  UPDATE fiscal_write_lock            │
//! │  read usage / sequence                 │ waits (busy_timeout)           │
//! │  insert document                       │                                │
//! │  COMMIT  ──────────────────────────────┘                                │
//! │                                     read usage / sequence (sees A)      │
//! │                                     ...                                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! SQLite has no row locks. Writing first makes the transaction a writer
//! before it reads anything, so B blocks on the busy handler instead of
//! reading a snapshot that A is about to invalidate. A wait longer than
//! the busy timeout surfaces as [`DbError::Conflict`](crate::DbError).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use washpos_core::{
    AccountUsage, AuditRecord, FiscalDocument, FiscalPermit, IntegrationCredentials, UsagePatch,
};

use crate::error::{DbError, DbResult};
use crate::repository::{audit, credentials, document, permit, sequence, usage};
use crate::store::{FiscalStore, FiscalTx};

/// SQLite-backed fiscal store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Makes the transaction a writer before any read.
async fn claim_write_lock(conn: &mut SqliteConnection) -> DbResult<()> {
    let result = sqlx::query("UPDATE fiscal_write_lock SET touched_at = ?1 WHERE id = 1")
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::TransactionFailed(
            "fiscal_write_lock row missing; migrations not applied?".to_string(),
        ));
    }

    Ok(())
}

#[async_trait]
impl FiscalStore for SqliteStore {
    async fn begin(&self) -> DbResult<Box<dyn FiscalTx>> {
        let mut tx = self.pool.begin().await?;
        claim_write_lock(&mut tx).await?;
        debug!("Fiscal transaction started");
        Ok(Box::new(SqliteTx { tx }))
    }

    async fn fiscal_permit(&self) -> DbResult<Option<FiscalPermit>> {
        let mut conn = self.pool.acquire().await?;
        permit::active(&mut conn).await
    }

    async fn account_usage(&self, account_id: &str) -> DbResult<Option<AccountUsage>> {
        let mut conn = self.pool.acquire().await?;
        usage::get(&mut conn, account_id).await
    }

    async fn fiscal_document(&self, id: &str) -> DbResult<Option<FiscalDocument>> {
        let mut conn = self.pool.acquire().await?;
        document::get(&mut conn, id).await
    }

    async fn highest_sequence(
        &self,
        establishment_code: &str,
        point_of_sale_code: &str,
    ) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        sequence::highest(&mut conn, establishment_code, point_of_sale_code).await
    }

    async fn integration_credentials(&self) -> DbResult<Option<IntegrationCredentials>> {
        let mut conn = self.pool.acquire().await?;
        credentials::get(&mut conn).await
    }

    async fn audit_trail(&self, document_id: &str) -> DbResult<Vec<AuditRecord>> {
        let mut conn = self.pool.acquire().await?;
        audit::for_document(&mut conn, document_id).await
    }
}

/// An open SQLite write transaction.
pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl FiscalTx for SqliteTx {
    async fn fiscal_permit(&mut self) -> DbResult<Option<FiscalPermit>> {
        permit::active(&mut self.tx).await
    }

    async fn save_fiscal_permit(
        &mut self,
        fiscal_permit: &FiscalPermit,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        permit::insert(&mut self.tx, fiscal_permit, now).await
    }

    async fn lock_highest_sequence(
        &mut self,
        establishment_code: &str,
        point_of_sale_code: &str,
    ) -> DbResult<i64> {
        sequence::highest(&mut self.tx, establishment_code, point_of_sale_code).await
    }

    async fn set_highest_sequence(
        &mut self,
        establishment_code: &str,
        point_of_sale_code: &str,
        value: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sequence::advance(&mut self.tx, establishment_code, point_of_sale_code, value, now).await
    }

    async fn lock_account_usage(&mut self, account_id: &str) -> DbResult<Option<AccountUsage>> {
        usage::get(&mut self.tx, account_id).await
    }

    async fn insert_account_usage(&mut self, record: &AccountUsage) -> DbResult<()> {
        usage::insert(&mut self.tx, record).await
    }

    async fn update_account_usage(
        &mut self,
        account_id: &str,
        patch: &UsagePatch,
        now: DateTime<Utc>,
    ) -> DbResult<AccountUsage> {
        usage::update(&mut self.tx, account_id, patch, now).await
    }

    async fn lock_fiscal_document(&mut self, id: &str) -> DbResult<Option<FiscalDocument>> {
        document::get(&mut self.tx, id).await
    }

    async fn create_fiscal_document(&mut self, doc: &FiscalDocument) -> DbResult<()> {
        document::insert(&mut self.tx, doc).await
    }

    async fn update_fiscal_document(&mut self, doc: &FiscalDocument) -> DbResult<()> {
        document::update(&mut self.tx, doc).await
    }

    async fn delete_fiscal_document(&mut self, id: &str) -> DbResult<bool> {
        document::delete(&mut self.tx, id).await
    }

    async fn integration_credentials(&mut self) -> DbResult<Option<IntegrationCredentials>> {
        credentials::get(&mut self.tx).await
    }

    async fn save_integration_credentials(
        &mut self,
        record: &IntegrationCredentials,
    ) -> DbResult<()> {
        credentials::save(&mut self.tx, record).await
    }

    async fn append_audit(&mut self, record: &AuditRecord) -> DbResult<()> {
        audit::append(&mut self.tx, record).await
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::Conflict(msg) => DbError::Conflict(msg),
                other => DbError::TransactionFailed(other.to_string()),
            })?;
        debug!("Fiscal transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.tx.rollback().await?;
        debug!("Fiscal transaction rolled back");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, NaiveDate, TimeZone};
    use washpos_core::{AuditAction, AuditOutcome, IntegrationMode, Role};

    async fn store() -> SqliteStore {
        Database::new(DbConfig::in_memory()).await.unwrap().store()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap()
    }

    fn permit(number: &str) -> FiscalPermit {
        FiscalPermit {
            permit_number: number.to_string(),
            valid_from: NaiveDate::from_ymd_opt(2026, 1, 1),
            valid_to: NaiveDate::from_ymd_opt(2026, 12, 31),
            establishment_code: "001".to_string(),
            point_of_sale_code: "001".to_string(),
        }
    }

    fn document(id: &str, sequence: i64) -> FiscalDocument {
        FiscalDocument {
            id: id.to_string(),
            document_number: format!("001-001-{:07}", sequence),
            establishment_code: "001".to_string(),
            point_of_sale_code: "001".to_string(),
            sequence,
            permit_number_used: "12345678".to_string(),
            issued_at: now(),
            issued_by: Some("acct-1".to_string()),
            customer_name: None,
            vehicle_plate: Some("ABC123".to_string()),
            total_cents: 1500,
            notes: None,
            updated_at: now(),
        }
    }

    #[tokio::test]
    async fn test_permit_supersedes() {
        let store = store().await;
        assert!(store.fiscal_permit().await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        tx.save_fiscal_permit(&permit("111"), now()).await.unwrap();
        tx.save_fiscal_permit(&permit("222"), now()).await.unwrap();
        tx.commit().await.unwrap();

        let active = store.fiscal_permit().await.unwrap().unwrap();
        assert_eq!(active.permit_number, "222");
        assert_eq!(active.valid_to, NaiveDate::from_ymd_opt(2026, 12, 31));

        let mut conn = store.pool().acquire().await.unwrap();
        assert_eq!(permit::history_len(&mut conn).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sequence_counter_never_moves_back() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.lock_highest_sequence("001", "001").await.unwrap(), 0);
        tx.set_highest_sequence("001", "001", 5, now()).await.unwrap();
        tx.set_highest_sequence("001", "001", 3, now()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.highest_sequence("001", "001").await.unwrap(), 5);
        assert_eq!(store.highest_sequence("001", "002").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_highest_covers_documents_without_counter() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        tx.create_fiscal_document(&document("d-7", 7)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.highest_sequence("001", "001").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        tx.create_fiscal_document(&document("d-1", 1)).await.unwrap();
        tx.set_highest_sequence("001", "001", 1, now()).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.fiscal_document("d-1").await.unwrap().is_none());
        assert_eq!(store.highest_sequence("001", "001").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_number_rejected() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        tx.create_fiscal_document(&document("d-1", 1)).await.unwrap();
        let err = tx
            .create_fiscal_document(&document("d-2", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_usage_roundtrip_and_patch() {
        let store = store().await;
        let expires = now() + Duration::days(30);
        let mut record = AccountUsage::new("acct-1", 10, now());
        record.account_expires_at = Some(expires);

        let mut tx = store.begin().await.unwrap();
        tx.insert_account_usage(&record).await.unwrap();
        assert!(matches!(
            tx.insert_account_usage(&record).await,
            Err(DbError::UniqueViolation { .. })
        ));
        let patch = UsagePatch {
            current_period_count: Some(3),
            blocked: Some(true),
            ..Default::default()
        };
        let updated = tx
            .update_account_usage("acct-1", &patch, now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(updated.current_period_count, 3);
        let stored = store.account_usage("acct-1").await.unwrap().unwrap();
        assert_eq!(stored, updated);
        assert_eq!(stored.account_expires_at, Some(expires));
        assert!(stored.blocked);
    }

    #[tokio::test]
    async fn test_update_missing_usage_is_not_found() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        let err = tx
            .update_account_usage("ghost", &UsagePatch::default(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_document_update_and_delete() {
        let store = store().await;
        let mut doc = document("d-1", 1);

        let mut tx = store.begin().await.unwrap();
        tx.create_fiscal_document(&doc).await.unwrap();
        doc.customer_name = Some("Ana".to_string());
        doc.total_cents = 2500;
        tx.update_fiscal_document(&doc).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.fiscal_document("d-1").await.unwrap(), Some(doc));

        let mut tx = store.begin().await.unwrap();
        assert!(tx.delete_fiscal_document("d-1").await.unwrap());
        assert!(!tx.delete_fiscal_document("d-1").await.unwrap());
        tx.commit().await.unwrap();
        assert!(store.fiscal_document("d-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_credentials_single_row() {
        let store = store().await;
        let mut record = IntegrationCredentials {
            endpoint_url: "https://sifen.example/api".to_string(),
            auth_token: "sealed-token".to_string(),
            certificate_blob: None,
            certificate_password: None,
            mode: IntegrationMode::Testing,
            active: false,
            last_test_status: None,
            last_test_error: None,
            updated_at: now(),
        };

        let mut tx = store.begin().await.unwrap();
        tx.save_integration_credentials(&record).await.unwrap();
        record.mode = IntegrationMode::Production;
        record.certificate_password = Some("sealed-pass".to_string());
        tx.save_integration_credentials(&record).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.integration_credentials().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_audit_trail_order() {
        let store = store().await;
        let doc = document("d-1", 1);
        let entry = |id: &str, outcome, minutes| AuditRecord {
            id: id.to_string(),
            action: AuditAction::Edit,
            outcome,
            document_id: doc.id.clone(),
            document_number: doc.document_number.clone(),
            actor_id: "admin-1".to_string(),
            actor_role: Role::Admin,
            occurred_at: now() + Duration::minutes(minutes),
            hours_elapsed: 0.5,
            denial_reason: None,
            snapshot: "{}".to_string(),
        };

        let mut tx = store.begin().await.unwrap();
        tx.append_audit(&entry("a-2", AuditOutcome::Granted, 10))
            .await
            .unwrap();
        tx.append_audit(&entry("a-1", AuditOutcome::Denied, 5))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let trail = store.audit_trail("d-1").await.unwrap();
        let ids: Vec<_> = trail.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a-1", "a-2"]);
        assert_eq!(trail[0].outcome, AuditOutcome::Denied);
        assert_eq!(trail[1].actor_role, Role::Admin);
    }
}
