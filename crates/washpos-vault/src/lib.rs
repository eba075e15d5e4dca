//! # washpos-vault: Credential Encryption
//!
//! Protects tax-authority integration secrets (auth token, certificate,
//! certificate password) at rest.
//!
//! ## Storage Boundary
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Admin update request                                                   │
//! │       │  "new-token"                                                    │
//! │       ▼                                                                 │
//! │  CredentialVault::seal ──► "c2FsdA==:aXY=:dGFn:Y3Q=" ──► database       │
//! │                                                                         │
//! │  Integration client                                                     │
//! │       ▲                                                                 │
//! │       │  "new-token"                                                    │
//! │  CredentialVault::open ◄── "c2FsdA==:aXY=:dGFn:Y3Q=" ◄── database       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`vault`] - Seal / open with AES-256-GCM
//! - [`key`] - Master key sourcing and the insecure-default state
//! - [`envelope`] - `salt:iv:tag:ciphertext` format
//! - [`mask`] - Placeholders for "secret set, unchanged"
//! - [`error`] - Vault error types
//!
//! ## Example
//!
//! ```rust
//! use washpos_vault::{CredentialVault, MasterKey};
//!
//! let key = MasterKey::configured("an-operator-supplied-key-of-32+chars").unwrap();
//! let vault = CredentialVault::new(key);
//!
//! let sealed = vault.seal("api-token").unwrap();
//! assert_eq!(vault.open(&sealed), "api-token");
//! ```

pub mod envelope;
pub mod error;
pub mod key;
pub mod mask;
pub mod vault;

pub use envelope::is_envelope;
pub use error::{VaultError, VaultResult};
pub use key::{KeySource, MasterKey, ENCRYPTION_KEY_ENV, MIN_KEY_LEN};
pub use mask::{is_placeholder, mask_placeholder, DEFAULT_MASK_LEN, MASK_CHAR};
pub use vault::{CredentialVault, VaultConfig, DEFAULT_KDF_ROUNDS, MIN_KDF_ROUNDS};
