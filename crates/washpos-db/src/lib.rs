//! # washpos-db: Persistence for the Fiscal Core
//!
//! One storage interface, two backends.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Fiscal Data Flow                                   │
//! │                                                                         │
//! │  washpos-fiscal service (IssuanceService::issue)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    washpos-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  FiscalStore  │    │  SqliteStore  │    │  Migrations  │  │   │
//! │  │   │  FiscalTx     │◄───│  MemoryStore  │    │  (embedded)  │  │   │
//! │  │   │  (store.rs)   │    │               │    │ 001_fiscal_  │  │   │
//! │  │   │               │    │  repository/* │    │   core.sql   │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   WASHPOS_DB_PATH (default ./washpos_fiscal.db)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - `FiscalStore` / `FiscalTx` traits
//! - [`sqlite`] - sqlx backend
//! - [`memory`] - In-memory backend
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - SQL per table
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use washpos_db::{Database, DbConfig, FiscalStore};
//!
//! let db = Database::new(DbConfig::new("path/to/fiscal.db")).await?;
//! let store: Arc<dyn FiscalStore> = Arc::new(db.store());
//!
//! let mut tx = store.begin().await?;
//! let highest = tx.lock_highest_sequence("001", "001").await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod sqlite;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use pool::{Database, DbConfig};
pub use sqlite::SqliteStore;
pub use store::{FiscalStore, FiscalTx};
