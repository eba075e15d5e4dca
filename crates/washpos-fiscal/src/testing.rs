//! Fixtures shared by the service tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use washpos_core::{AccountUsage, FiscalPermit};
use washpos_db::{Database, DbConfig, FiscalStore, MemoryStore};
use washpos_vault::{CredentialVault, MasterKey, VaultConfig, MIN_KDF_ROUNDS};

pub(crate) const TEST_KEY: &str = "test-master-key-0123456789abcdef0123";

pub(crate) fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub(crate) fn memory_store() -> Arc<dyn FiscalStore> {
    Arc::new(MemoryStore::new())
}

pub(crate) async fn sqlite_store() -> Arc<dyn FiscalStore> {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    Arc::new(db.store())
}

/// A WAL file database in its own temp directory, for tests that need
/// several connections competing for the write lock.
pub(crate) struct FileDb {
    pub(crate) db: Database,
    _dir: TempDir,
}

impl FileDb {
    pub(crate) async fn open(configure: impl FnOnce(DbConfig) -> DbConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let config = configure(DbConfig::new(dir.path().join("fiscal.db")));
        let db = Database::new(config).await.unwrap();
        FileDb { db, _dir: dir }
    }

    pub(crate) fn store(&self) -> Arc<dyn FiscalStore> {
        Arc::new(self.db.store())
    }
}

/// Permit for 001/001, valid from a month before `today` for a year.
pub(crate) fn permit_for(today: NaiveDate) -> FiscalPermit {
    FiscalPermit {
        permit_number: "12345678".to_string(),
        valid_from: Some(today - Duration::days(30)),
        valid_to: Some(today + Duration::days(365)),
        establishment_code: "001".to_string(),
        point_of_sale_code: "001".to_string(),
    }
}

/// Stores a valid permit and provisions `account_id` with `limit`.
pub(crate) async fn seed(
    store: &Arc<dyn FiscalStore>,
    account_id: &str,
    limit: i64,
    now: DateTime<Utc>,
) {
    let mut tx = store.begin().await.unwrap();
    tx.save_fiscal_permit(&permit_for(now.date_naive()), now)
        .await
        .unwrap();
    tx.insert_account_usage(&AccountUsage::new(account_id, limit, now))
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

/// A vault with a configured key and the cheapest allowed derivation.
pub(crate) fn test_vault() -> CredentialVault {
    CredentialVault::with_config(
        MasterKey::configured(TEST_KEY).unwrap(),
        VaultConfig::default().kdf_rounds(MIN_KDF_ROUNDS),
    )
}
