//! # In-Memory Backend
//!
//! [`FiscalStore`] over plain collections, for tests and demos.
//!
//! ```text
//! MemoryStore ── Arc<Mutex<MemoryState>>
//!                     │
//!   begin() ──────────┤ lock_owned()  (held until commit / rollback / drop)
//!                     ▼
//!   MemoryTx { guard, working: guard.clone() }
//!                     │
//!   commit()  ───────► *guard = working
//!   rollback() / drop ► working discarded
//! ```
//! Holding the owned guard for the whole transaction gives the same
//! one-writer-at-a-time guarantee as the SQLite backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use washpos_core::{
    AccountUsage, AuditRecord, FiscalDocument, FiscalPermit, IntegrationCredentials, UsagePatch,
};

use crate::error::{DbError, DbResult};
use crate::store::{FiscalStore, FiscalTx};

type PairKey = (String, String);

#[derive(Debug, Clone, Default)]
struct MemoryState {
    permits: Vec<FiscalPermit>,
    sequences: HashMap<PairKey, i64>,
    usage: HashMap<String, AccountUsage>,
    documents: HashMap<String, FiscalDocument>,
    credentials: Option<IntegrationCredentials>,
    audit: Vec<AuditRecord>,
}

impl MemoryState {
    fn highest_sequence(&self, establishment_code: &str, point_of_sale_code: &str) -> i64 {
        let counter = self
            .sequences
            .get(&(establishment_code.to_string(), point_of_sale_code.to_string()))
            .copied()
            .unwrap_or(0);

        let documents = self
            .documents
            .values()
            .filter(|d| {
                d.establishment_code == establishment_code
                    && d.point_of_sale_code == point_of_sale_code
            })
            .map(|d| d.sequence)
            .max()
            .unwrap_or(0);

        counter.max(documents)
    }

    fn audit_trail(&self, document_id: &str) -> Vec<AuditRecord> {
        let mut records: Vec<AuditRecord> = self
            .audit
            .iter()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        records.sort_by_key(|r| r.occurred_at);
        records
    }
}

/// In-memory fiscal store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl FiscalStore for MemoryStore {
    async fn begin(&self) -> DbResult<Box<dyn FiscalTx>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn fiscal_permit(&self) -> DbResult<Option<FiscalPermit>> {
        Ok(self.state.lock().await.permits.last().cloned())
    }

    async fn account_usage(&self, account_id: &str) -> DbResult<Option<AccountUsage>> {
        Ok(self.state.lock().await.usage.get(account_id).cloned())
    }

    async fn fiscal_document(&self, id: &str) -> DbResult<Option<FiscalDocument>> {
        Ok(self.state.lock().await.documents.get(id).cloned())
    }

    async fn highest_sequence(
        &self,
        establishment_code: &str,
        point_of_sale_code: &str,
    ) -> DbResult<i64> {
        Ok(self
            .state
            .lock()
            .await
            .highest_sequence(establishment_code, point_of_sale_code))
    }

    async fn integration_credentials(&self) -> DbResult<Option<IntegrationCredentials>> {
        Ok(self.state.lock().await.credentials.clone())
    }

    async fn audit_trail(&self, document_id: &str) -> DbResult<Vec<AuditRecord>> {
        Ok(self.state.lock().await.audit_trail(document_id))
    }
}

/// An open in-memory transaction.
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl FiscalTx for MemoryTx {
    async fn fiscal_permit(&mut self) -> DbResult<Option<FiscalPermit>> {
        Ok(self.working.permits.last().cloned())
    }

    async fn save_fiscal_permit(
        &mut self,
        permit: &FiscalPermit,
        _now: DateTime<Utc>,
    ) -> DbResult<()> {
        self.working.permits.push(permit.clone());
        Ok(())
    }

    async fn lock_highest_sequence(
        &mut self,
        establishment_code: &str,
        point_of_sale_code: &str,
    ) -> DbResult<i64> {
        Ok(self
            .working
            .highest_sequence(establishment_code, point_of_sale_code))
    }

    async fn set_highest_sequence(
        &mut self,
        establishment_code: &str,
        point_of_sale_code: &str,
        sequence: i64,
        _now: DateTime<Utc>,
    ) -> DbResult<()> {
        let counter = self
            .working
            .sequences
            .entry((establishment_code.to_string(), point_of_sale_code.to_string()))
            .or_insert(0);
        *counter = (*counter).max(sequence);
        Ok(())
    }

    async fn lock_account_usage(&mut self, account_id: &str) -> DbResult<Option<AccountUsage>> {
        Ok(self.working.usage.get(account_id).cloned())
    }

    async fn insert_account_usage(&mut self, usage: &AccountUsage) -> DbResult<()> {
        if self.working.usage.contains_key(&usage.account_id) {
            return Err(DbError::duplicate("account_usage.account_id", &usage.account_id));
        }
        self.working
            .usage
            .insert(usage.account_id.clone(), usage.clone());
        Ok(())
    }

    async fn update_account_usage(
        &mut self,
        account_id: &str,
        patch: &UsagePatch,
        now: DateTime<Utc>,
    ) -> DbResult<AccountUsage> {
        let usage = self
            .working
            .usage
            .get_mut(account_id)
            .ok_or_else(|| DbError::not_found("AccountUsage", account_id))?;
        patch.apply_to(usage, now);
        Ok(usage.clone())
    }

    async fn lock_fiscal_document(&mut self, id: &str) -> DbResult<Option<FiscalDocument>> {
        Ok(self.working.documents.get(id).cloned())
    }

    async fn create_fiscal_document(&mut self, document: &FiscalDocument) -> DbResult<()> {
        let clash = self.working.documents.values().any(|d| {
            d.document_number == document.document_number
                || (d.establishment_code == document.establishment_code
                    && d.point_of_sale_code == document.point_of_sale_code
                    && d.sequence == document.sequence)
        });
        if clash || self.working.documents.contains_key(&document.id) {
            return Err(DbError::duplicate(
                "fiscal_documents.document_number",
                &document.document_number,
            ));
        }

        self.working
            .documents
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn update_fiscal_document(&mut self, document: &FiscalDocument) -> DbResult<()> {
        let stored = self
            .working
            .documents
            .get_mut(&document.id)
            .ok_or_else(|| DbError::not_found("FiscalDocument", &document.id))?;

        stored.customer_name = document.customer_name.clone();
        stored.vehicle_plate = document.vehicle_plate.clone();
        stored.total_cents = document.total_cents;
        stored.notes = document.notes.clone();
        stored.updated_at = document.updated_at;
        Ok(())
    }

    async fn delete_fiscal_document(&mut self, id: &str) -> DbResult<bool> {
        Ok(self.working.documents.remove(id).is_some())
    }

    async fn integration_credentials(&mut self) -> DbResult<Option<IntegrationCredentials>> {
        Ok(self.working.credentials.clone())
    }

    async fn save_integration_credentials(
        &mut self,
        credentials: &IntegrationCredentials,
    ) -> DbResult<()> {
        self.working.credentials = Some(credentials.clone());
        Ok(())
    }

    async fn append_audit(&mut self, record: &AuditRecord) -> DbResult<()> {
        self.working.audit.push(record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_commit_publishes_rollback_discards() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_account_usage(&AccountUsage::new("a", 5, now()))
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        assert!(store.account_usage("a").await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        tx.insert_account_usage(&AccountUsage::new("a", 5, now()))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.account_usage("a").await.unwrap().unwrap().monthly_limit, 5);
    }

    #[tokio::test]
    async fn test_dropped_tx_is_rolled_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.set_highest_sequence("001", "001", 9, now()).await.unwrap();
        }
        assert_eq!(store.highest_sequence("001", "001").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transactions_are_exclusive() {
        let store = MemoryStore::new();
        let tx = store.begin().await.unwrap();

        let other = store.clone();
        let waiter = tokio::spawn(async move {
            let _tx = other.begin().await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        tx.commit().await.unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_sequence_counter_monotonic() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.set_highest_sequence("001", "001", 4, now()).await.unwrap();
        tx.set_highest_sequence("001", "001", 2, now()).await.unwrap();
        assert_eq!(tx.lock_highest_sequence("001", "001").await.unwrap(), 4);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_usage_update_is_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx
            .update_account_usage("ghost", &UsagePatch::default(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
