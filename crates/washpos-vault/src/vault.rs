//! # Credential Vault
//!
//! ## Seal
//! ```text
//! plaintext ──┬── "" ───────────────────────────────────────► ""
//!             │
//!             ▼
//!   salt = 32 random bytes, iv = 12 random bytes
//!   dek  = SHA-256 iterated (master ‖ salt), kdf_rounds times
//!   AES-256-GCM(dek, iv, aad = CONTEXT) → ciphertext ‖ tag
//!             │
//!             ▼
//!   base64(salt):base64(iv):base64(tag):base64(ciphertext)
//! ```
//!
//! ## Open (lenient)
//! ```text
//! value ──┬── ""                          → ""
//!         ├── not 4 segments              → value   (legacy plaintext)
//!         ├── bad base64 / sizes          → value   (debug!)
//!         ├── tag verification fails      → value   (warn!)
//!         └── ok                          → plaintext
//! ```
//! Returning the stored value keeps records written before encryption was
//! introduced readable, and lets callers notice an unexpected value instead
//! of crashing. [`CredentialVault::try_open`] is the strict variant.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::envelope::{Envelope, NONCE_SIZE, SALT_SIZE, TAG_SIZE};
use crate::error::{VaultError, VaultResult};
use crate::key::{KeySource, MasterKey};

/// Associated data bound into every envelope.
const CONTEXT: &[u8] = b"washpos:integration-credentials:v1";

const KEY_SIZE: usize = 32;

/// Default key-derivation rounds.
pub const DEFAULT_KDF_ROUNDS: u32 = 100_000;

/// Lower bound for key-derivation rounds.
pub const MIN_KDF_ROUNDS: u32 = 10_000;

/// Vault tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultConfig {
    pub kdf_rounds: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        VaultConfig {
            kdf_rounds: DEFAULT_KDF_ROUNDS,
        }
    }
}

impl VaultConfig {
    /// Sets the derivation rounds, never below [`MIN_KDF_ROUNDS`].
    pub fn kdf_rounds(mut self, rounds: u32) -> Self {
        if rounds < MIN_KDF_ROUNDS {
            warn!(
                requested = rounds,
                minimum = MIN_KDF_ROUNDS,
                "KDF rounds below minimum, using minimum"
            );
        }
        self.kdf_rounds = rounds.max(MIN_KDF_ROUNDS);
        self
    }
}

/// Seals and opens integration secrets. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CredentialVault {
    key: Arc<MasterKey>,
    config: VaultConfig,
}

impl CredentialVault {
    pub fn new(key: MasterKey) -> Self {
        CredentialVault::with_config(key, VaultConfig::default())
    }

    pub fn with_config(key: MasterKey, config: VaultConfig) -> Self {
        CredentialVault {
            key: Arc::new(key),
            config,
        }
    }

    pub fn key_source(&self) -> KeySource {
        self.key.source()
    }

    /// True when running on the built-in development key.
    pub fn is_insecure_default(&self) -> bool {
        self.key.is_insecure_default()
    }

    pub fn config(&self) -> VaultConfig {
        self.config
    }

    /// Encrypts `plaintext` into an envelope. Empty input stays empty.
    pub fn seal(&self, plaintext: &str) -> VaultResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut salt = [0u8; SALT_SIZE];
        let mut iv = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut iv);

        let cipher = self.cipher_for(&salt);
        let mut sealed = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: CONTEXT,
                },
            )
            .map_err(|_| VaultError::EncryptionFailed)?;

        let tag = sealed.split_off(sealed.len() - TAG_SIZE);

        Ok(Envelope {
            salt: salt.to_vec(),
            iv: iv.to_vec(),
            tag,
            ciphertext: sealed,
        }
        .encode())
    }

    /// Decrypts an envelope, falling back to the input on any failure.
    pub fn open(&self, value: &str) -> String {
        if value.is_empty() {
            return String::new();
        }

        match self.try_open(value) {
            Ok(plaintext) => plaintext,
            Err(VaultError::NotAnEnvelope) => value.to_string(),
            Err(VaultError::MalformedEnvelope(reason)) => {
                debug!(%reason, "Value looks like an envelope but does not decode, treating as plaintext");
                value.to_string()
            }
            Err(err) => {
                warn!(error = %err, "Could not decrypt stored secret, returning stored value unchanged");
                value.to_string()
            }
        }
    }

    /// Decrypts an envelope, reporting every failure.
    pub fn try_open(&self, value: &str) -> VaultResult<String> {
        if value.is_empty() {
            return Ok(String::new());
        }

        let envelope = Envelope::decode(value)?;
        let cipher = self.cipher_for(&envelope.salt);

        let mut combined = envelope.ciphertext;
        combined.extend_from_slice(&envelope.tag);

        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&envelope.iv),
                Payload {
                    msg: &combined,
                    aad: CONTEXT,
                },
            )
            .map_err(|_| VaultError::AuthenticationFailed)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::InvalidUtf8)
    }

    fn cipher_for(&self, salt: &[u8]) -> Aes256Gcm {
        let key = derive_key(self.key.bytes(), salt, self.config.kdf_rounds);
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key))
    }
}

/// Iterated SHA-256 over the master key and salt.
fn derive_key(master: &[u8], salt: &[u8], rounds: u32) -> [u8; KEY_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(master);
    hasher.update(salt);
    let mut result = hasher.finalize_reset();

    for _ in 0..rounds {
        hasher.update(result);
        hasher.update(salt);
        result = hasher.finalize_reset();
    }

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&result[..KEY_SIZE]);
    key
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::is_envelope;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn vault_with(key: &str) -> CredentialVault {
        CredentialVault::with_config(
            MasterKey::configured(key).unwrap(),
            VaultConfig::default().kdf_rounds(MIN_KDF_ROUNDS),
        )
    }

    fn vault() -> CredentialVault {
        vault_with("0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn test_roundtrip() {
        let v = vault();
        let long = "x".repeat(4096);
        for plaintext in ["token-123", "ñandú ✓", "a:b:c:d", long.as_str()] {
            let sealed = v.seal(plaintext).unwrap();
            assert!(is_envelope(&sealed));
            assert_ne!(sealed, plaintext);
            assert_eq!(v.open(&sealed), plaintext);
        }
    }

    #[test]
    fn test_empty_passthrough() {
        let v = vault();
        assert_eq!(v.seal("").unwrap(), "");
        assert_eq!(v.open(""), "");
        assert_eq!(v.try_open("").unwrap(), "");
    }

    #[test]
    fn test_fresh_salt_and_iv_per_seal() {
        let v = vault();
        let a = v.seal("same").unwrap();
        let b = v.seal("same").unwrap();
        assert_ne!(a, b);
        assert_eq!(v.open(&a), v.open(&b));
    }

    #[test]
    fn test_malformed_returns_input() {
        let v = vault();
        for value in ["legacy-plain-token", "a:b", "a:b:c:d:e", "http://host:8080/x:y"] {
            assert_eq!(v.open(value), value);
        }
    }

    #[test]
    fn test_tampered_tag_returns_input() {
        let v = vault();
        let sealed = v.seal("secret").unwrap();
        let mut parts: Vec<String> = sealed.split(':').map(String::from).collect();
        let mut tag = BASE64.decode(&parts[2]).unwrap();
        tag[0] ^= 0xff;
        parts[2] = BASE64.encode(tag);
        let tampered = parts.join(":");

        assert_eq!(v.open(&tampered), tampered);
        assert!(matches!(
            v.try_open(&tampered),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_wrong_key_returns_input() {
        let sealed = vault().seal("secret").unwrap();
        let other = vault_with("ffffffffffffffffffffffffffffffff");
        assert_eq!(other.open(&sealed), sealed);
    }

    #[test]
    fn test_try_open_reports_shape() {
        assert!(matches!(
            vault().try_open("plain"),
            Err(VaultError::NotAnEnvelope)
        ));
    }

    #[test]
    fn test_insecure_default_is_observable() {
        let v = CredentialVault::new(MasterKey::resolve(None).unwrap());
        assert!(v.is_insecure_default());
        assert_eq!(v.key_source(), KeySource::InsecureDefault);
    }

    #[test]
    fn test_kdf_rounds_floor() {
        assert_eq!(VaultConfig::default().kdf_rounds(10).kdf_rounds, MIN_KDF_ROUNDS);
        assert_eq!(VaultConfig::default().kdf_rounds, DEFAULT_KDF_ROUNDS);
    }
}
