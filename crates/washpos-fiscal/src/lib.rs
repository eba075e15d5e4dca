//! # washpos-fiscal: Fiscal Services
//!
//! The operations the POS calls to stay within fiscal rules: issue an
//! invoice, edit or delete one inside the modification window, administer
//! the permit, the quota and the integration credentials.
//!
//! ## Module Organization
//! ```text
//! washpos_fiscal/
//! ├── lib.rs          ◄─── You are here (FiscalServices bundle)
//! ├── config.rs       ◄─── Environment configuration
//! ├── error.rs        ◄─── FiscalError, ErrorResponse
//! ├── issuance.rs     ◄─── Quota → permit → number → document pipeline
//! ├── documents.rs    ◄─── Guarded edit / delete + audit
//! ├── quota.rs        ◄─── UsageQuotaTracker
//! ├── allocator.rs    ◄─── InvoiceNumberAllocator
//! ├── permits.rs      ◄─── Permit administration + issuance gate
//! └── credentials.rs  ◄─── Sealed integration credentials
//! ```
//!
//! ## Service Handles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FiscalServices                                                         │
//! │   ├── issuance     ─┐                                                   │
//! │   ├── documents     │                                                   │
//! │   ├── quota         ├──► Arc<dyn FiscalStore>  (SqliteStore / Memory)   │
//! │   ├── allocator     │                                                   │
//! │   ├── permits       │                                                   │
//! │   └── credentials  ─┘──► CredentialVault                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every service is a cheap `Clone` handle; each write operation is one
//! store transaction. Nothing here retries: callers check
//! [`FiscalError::is_retryable`].
//!
//! ## Example
//! ```rust,ignore
//! let config = FiscalConfig::from_env()?;
//! let (services, db) = FiscalServices::open(&config).await?;
//!
//! let issued = services.issuance.issue(request, Utc::now()).await?;
//! ```

pub mod allocator;
pub mod config;
pub mod credentials;
pub mod documents;
pub mod error;
pub mod issuance;
pub mod permits;
pub mod quota;

mod tx;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tracing::info;

use washpos_db::{Database, FiscalStore};
use washpos_vault::CredentialVault;

pub use allocator::InvoiceNumberAllocator;
pub use config::{ConfigError, Environment, FiscalConfig};
pub use credentials::{CredentialsService, DecryptedCredentials};
pub use documents::{DeletedDocument, DocumentService};
pub use error::{ErrorCode, ErrorResponse, FiscalError, FiscalResult};
pub use issuance::{IssuanceService, IssueRequest, IssuedDocument};
pub use permits::PermitService;
pub use quota::UsageQuotaTracker;

/// All fiscal services over one store.
#[derive(Clone)]
pub struct FiscalServices {
    pub issuance: IssuanceService,
    pub documents: DocumentService,
    pub quota: UsageQuotaTracker,
    pub allocator: InvoiceNumberAllocator,
    pub permits: PermitService,
    pub credentials: CredentialsService,
}

impl FiscalServices {
    pub fn new(store: Arc<dyn FiscalStore>, vault: CredentialVault) -> Self {
        FiscalServices {
            issuance: IssuanceService::new(store.clone()),
            documents: DocumentService::new(store.clone()),
            quota: UsageQuotaTracker::new(store.clone()),
            allocator: InvoiceNumberAllocator::new(store.clone()),
            permits: PermitService::new(store.clone()),
            credentials: CredentialsService::new(store, vault),
        }
    }

    /// Connects the SQLite database described by `config`, runs migrations
    /// and builds the services. The database handle is returned for
    /// shutdown and diagnostics.
    pub async fn open(config: &FiscalConfig) -> FiscalResult<(Self, Database)> {
        let vault = config.build_vault()?;
        let db = Database::new(config.db_config()).await?;

        info!(
            environment = config.environment.as_str(),
            key_source = vault.key_source().as_str(),
            "Fiscal services ready"
        );

        let store: Arc<dyn FiscalStore> = Arc::new(db.store());
        Ok((FiscalServices::new(store, vault), db))
    }
}

// =============================================================================
// End-to-end Tests
// =============================================================================
