//! # washpos-core: Pure Fiscal Rules for WashPOS
//!
//! The rules that decide whether an invoice may legally be issued, what
//! number it gets, and whether an issued invoice may still be touched.
//! Everything here is a pure function of its inputs, including "now".
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     WashPOS Fiscal Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 washpos-fiscal (services)                       │   │
//! │  │   issue_invoice, edit_document, delete_document, credentials    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ washpos-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌───────────┐ ┌──────────┐         │   │
//! │  │   │  permit  │ │  quota   │ │ numbering │ │  window  │         │   │
//! │  │   │ evaluate │ │ rollover │ │ EEE-PPP-N │ │ 24h/admin│         │   │
//! │  │   └──────────┘ └──────────┘ └───────────┘ └──────────┘         │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 washpos-db (storage collaborator)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (FiscalPermit, AccountUsage, FiscalDocument, ...)
//! - [`permit`] - Permit ("timbrado") validity evaluation
//! - [`quota`] - Monthly quota rollover and gating
//! - [`numbering`] - `EEE-PPP-NNNNNNN` document numbers
//! - [`window`] - 24-hour modification window and audit records
//! - [`validation`] - Input validation
//! - [`api`] - JSON shapes for the admin frontend
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use washpos_core::numbering::DocumentNumber;
//!
//! let number = DocumentNumber::next_after("001", "001", 41).unwrap();
//! assert_eq!(number.to_string(), "001-001-0000042");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod error;
pub mod numbering;
pub mod permit;
pub mod quota;
pub mod types;
pub mod validation;
pub mod window;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use numbering::DocumentNumber;
pub use permit::{PermitStatus, PermitVerdict};
pub use quota::{QuotaCheck, QuotaDenial};
pub use types::*;
pub use window::{WindowDecision, WindowDenial};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Hours after issuance during which an administrator may edit or delete.
pub const MODIFICATION_WINDOW_HOURS: i64 = 24;

/// A valid permit with this many days left or fewer is "expiring soon".
pub const PERMIT_EXPIRY_WARNING_DAYS: i64 = 30;

/// How far in the past a new permit's `valid_from` may lie.
pub const MAX_PERMIT_BACKDATE_YEARS: u32 = 5;

/// Largest sequence that fits the 7-digit field.
pub const MAX_SEQUENCE: i64 = 9_999_999;

/// Upper bound for free-text identifiers (permit number, account id).
pub const MAX_TEXT_FIELD_LEN: usize = 64;
