//! # Vault Error Types

use thiserror::Error;

/// Errors from key sourcing and the strict envelope API.
///
/// The lenient [`CredentialVault::open`](crate::CredentialVault::open) never
/// returns these; it falls back to the stored string instead.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A master key was configured but is too short to be used.
    #[error("Encryption key must be at least {min} characters (got {actual})")]
    KeyTooShort { min: usize, actual: usize },

    /// The insecure built-in key was refused (production environment).
    #[error("No encryption key configured; set {0}")]
    KeyRequired(&'static str),

    /// Value is not shaped `salt:iv:tag:ciphertext`.
    #[error("Value is not an encrypted envelope")]
    NotAnEnvelope,

    /// Four segments, but one of them is not valid base64 or has the wrong size.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Tag verification failed: wrong key, wrong context or tampered data.
    #[error("Envelope authentication failed")]
    AuthenticationFailed,

    /// Decrypted bytes are not UTF-8.
    #[error("Decrypted value is not valid UTF-8")]
    InvalidUtf8,

    /// The cipher refused to encrypt.
    #[error("Encryption failed")]
    EncryptionFailed,
}

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;
