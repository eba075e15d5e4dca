//! # Fiscal Store
//!
//! The single persistence interface of the fiscal core. Business rules live
//! in `washpos-fiscal` exactly once; backends only differ in how they
//! satisfy these two traits.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Arc<dyn FiscalStore>                                                   │
//! │   ├── begin() ───────────────► Box<dyn FiscalTx>                        │
//! │   │                              ├── lock_account_usage / update        │
//! │   │                              ├── lock_highest_sequence / set        │
//! │   │                              ├── create / update / delete document  │
//! │   │                              ├── credentials get / save             │
//! │   │                              ├── append_audit                       │
//! │   │                              └── commit / rollback                  │
//! │   │                                                                     │
//! │   └── read-only lookups (permit, usage, document, audit trail, ...)     │
//! │                                                                         │
//! │  Backends:  SqliteStore (sqlx)        MemoryStore (tokio Mutex)         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! A `FiscalTx` is exclusive for writers from the moment `begin()` returns:
//! SQLite takes the database write lock with the transaction's first
//! statement, the memory backend holds an owned mutex guard. "Locked" reads
//! inside a transaction therefore cannot be invalidated by another issuance
//! before commit.
//!
//! Dropping a transaction without `commit` rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use washpos_core::{
    AccountUsage, AuditRecord, FiscalDocument, FiscalPermit, IntegrationCredentials, UsagePatch,
};

use crate::error::DbResult;

/// Entry point of a storage backend. Cheap to share behind an `Arc`.
#[async_trait]
pub trait FiscalStore: Send + Sync {
    /// Starts a serialized write transaction.
    async fn begin(&self) -> DbResult<Box<dyn FiscalTx>>;

    /// The active (most recently saved) fiscal permit.
    async fn fiscal_permit(&self) -> DbResult<Option<FiscalPermit>>;

    async fn account_usage(&self, account_id: &str) -> DbResult<Option<AccountUsage>>;

    async fn fiscal_document(&self, id: &str) -> DbResult<Option<FiscalDocument>>;

    /// Unlocked view of the highest sequence handed out for the pair.
    async fn highest_sequence(
        &self,
        establishment_code: &str,
        point_of_sale_code: &str,
    ) -> DbResult<i64>;

    async fn integration_credentials(&self) -> DbResult<Option<IntegrationCredentials>>;

    /// Audit entries of a document, oldest first.
    async fn audit_trail(&self, document_id: &str) -> DbResult<Vec<AuditRecord>>;
}

/// A serialized unit of work.
#[async_trait]
pub trait FiscalTx: Send {
    async fn fiscal_permit(&mut self) -> DbResult<Option<FiscalPermit>>;

    /// Stores `permit` as the new active permit. Previous permits are kept.
    async fn save_fiscal_permit(
        &mut self,
        permit: &FiscalPermit,
        now: DateTime<Utc>,
    ) -> DbResult<()>;

    /// Highest sequence handed out for the pair: the persisted counter, or
    /// the highest stored document when that is larger. `0` when unused.
    async fn lock_highest_sequence(
        &mut self,
        establishment_code: &str,
        point_of_sale_code: &str,
    ) -> DbResult<i64>;

    /// Moves the persisted counter forward. Never moves it back.
    async fn set_highest_sequence(
        &mut self,
        establishment_code: &str,
        point_of_sale_code: &str,
        sequence: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()>;

    async fn lock_account_usage(&mut self, account_id: &str) -> DbResult<Option<AccountUsage>>;

    /// Fails with `UniqueViolation` when the account already has a record.
    async fn insert_account_usage(&mut self, usage: &AccountUsage) -> DbResult<()>;

    /// Applies `patch` and returns the stored row. `NotFound` when missing.
    async fn update_account_usage(
        &mut self,
        account_id: &str,
        patch: &UsagePatch,
        now: DateTime<Utc>,
    ) -> DbResult<AccountUsage>;

    async fn lock_fiscal_document(&mut self, id: &str) -> DbResult<Option<FiscalDocument>>;

    /// Fails with `UniqueViolation` on a duplicate number or sequence.
    async fn create_fiscal_document(&mut self, document: &FiscalDocument) -> DbResult<()>;

    /// Writes the editable sale fields and `updated_at`.
    async fn update_fiscal_document(&mut self, document: &FiscalDocument) -> DbResult<()>;

    /// Returns whether a row was deleted.
    async fn delete_fiscal_document(&mut self, id: &str) -> DbResult<bool>;

    async fn integration_credentials(&mut self) -> DbResult<Option<IntegrationCredentials>>;

    async fn save_integration_credentials(
        &mut self,
        credentials: &IntegrationCredentials,
    ) -> DbResult<()>;

    async fn append_audit(&mut self, record: &AuditRecord) -> DbResult<()>;

    async fn commit(self: Box<Self>) -> DbResult<()>;

    async fn rollback(self: Box<Self>) -> DbResult<()>;
}
