//! # Repository Module
//!
//! SQL for each fiscal table, as free functions over a SQLite connection.
//!
//! ## Why Connections, Not Pools
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SqliteTx (one issuance)                SqliteStore (read-only views)   │
//! │       │  &mut *transaction                    │  &mut *pool.acquire()   │
//! │       ▼                                       ▼                         │
//! │  ┌───────────────────────────────────────────────────────────────┐     │
//! │  │  repository::usage::get(conn, "acct-1")                        │     │
//! │  │  repository::sequence::highest(conn, "001", "001")             │     │
//! │  │  repository::document::insert(conn, &document)                 │     │
//! │  └───────────────────────────────────────────────────────────────┘     │
//! │                                                                         │
//! │  The same SQL runs inside and outside a transaction; the caller         │
//! │  decides which connection it goes through.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`permit`] - Fiscal permit history
//! - [`sequence`] - Per establishment/point counters
//! - [`usage`] - Account usage quota rows
//! - [`document`] - Issued fiscal documents
//! - [`credentials`] - Integration credential envelopes
//! - [`audit`] - Modification audit trail

pub mod audit;
pub mod credentials;
pub mod document;
pub mod permit;
pub mod sequence;
pub mod usage;
