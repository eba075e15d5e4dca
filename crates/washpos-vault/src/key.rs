//! # Master Key Sourcing
//!
//! ```text
//! WASHPOS_ENCRYPTION_KEY
//!      │
//!      ├── unset / blank      → built-in key, KeySource::InsecureDefault (warn!)
//!      ├── < 32 characters    → VaultError::KeyTooShort
//!      └── otherwise          → KeySource::Configured
//! ```
//!
//! The insecure default exists so development databases keep working
//! without setup. It is never silent: resolving it logs a warning and
//! [`KeySource`] lets startup diagnostics report it.

use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::error::{VaultError, VaultResult};

/// Environment variable holding the master key.
pub const ENCRYPTION_KEY_ENV: &str = "WASHPOS_ENCRYPTION_KEY";

/// Minimum master key length, in characters.
pub const MIN_KEY_LEN: usize = 32;

const INSECURE_DEFAULT_KEY: &str = "washpos-insecure-development-key-do-not-use";

/// Where the active master key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Supplied by the operator.
    Configured,
    /// Built-in development key. Anyone with the source can decrypt.
    InsecureDefault,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Configured => "configured",
            KeySource::InsecureDefault => "insecure_default",
        }
    }
}

/// The master key used to derive per-envelope data keys.
pub struct MasterKey {
    secret: SecretString,
    source: KeySource,
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl MasterKey {
    /// Resolves a key from an optional configured value.
    pub fn resolve(configured: Option<&str>) -> VaultResult<Self> {
        match configured.map(str::trim).filter(|v| !v.is_empty()) {
            None => {
                warn!(
                    env = ENCRYPTION_KEY_ENV,
                    "No encryption key configured: using the INSECURE built-in default key. \
                     Secrets stored now can be decrypted by anyone with the source code"
                );
                Ok(MasterKey {
                    secret: SecretString::new(INSECURE_DEFAULT_KEY.to_string()),
                    source: KeySource::InsecureDefault,
                })
            }
            Some(value) => MasterKey::configured(value),
        }
    }

    /// Reads [`ENCRYPTION_KEY_ENV`].
    pub fn from_env() -> VaultResult<Self> {
        let value = std::env::var(ENCRYPTION_KEY_ENV).ok();
        MasterKey::resolve(value.as_deref())
    }

    /// Uses an explicit operator-supplied key.
    pub fn configured(value: &str) -> VaultResult<Self> {
        let actual = value.chars().count();
        if actual < MIN_KEY_LEN {
            return Err(VaultError::KeyTooShort {
                min: MIN_KEY_LEN,
                actual,
            });
        }

        Ok(MasterKey {
            secret: SecretString::new(value.to_string()),
            source: KeySource::Configured,
        })
    }

    /// Refuses the insecure default (used in production).
    pub fn require_configured(self) -> VaultResult<Self> {
        match self.source {
            KeySource::Configured => Ok(self),
            KeySource::InsecureDefault => Err(VaultError::KeyRequired(ENCRYPTION_KEY_ENV)),
        }
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    pub fn is_insecure_default(&self) -> bool {
        self.source == KeySource::InsecureDefault
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        self.secret.expose_secret().as_bytes()
    }
}
