//! # Envelope Format
//!
//! ```text
//! base64(salt) : base64(iv) : base64(authTag) : base64(ciphertext)
//!   32 bytes      12 bytes      16 bytes          len(plaintext)
//! ```
//!
//! Standard base64 never contains `:`, so exactly four segments is what
//! tells an envelope apart from a legacy plaintext value.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::{VaultError, VaultResult};

pub(crate) const SALT_SIZE: usize = 32;
pub(crate) const NONCE_SIZE: usize = 12;
pub(crate) const TAG_SIZE: usize = 16;

const SEPARATOR: char = ':';

/// Decoded envelope parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Envelope {
    pub salt: Vec<u8>,
    pub iv: Vec<u8>,
    pub tag: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn encode(&self) -> String {
        [
            BASE64.encode(&self.salt),
            BASE64.encode(&self.iv),
            BASE64.encode(&self.tag),
            BASE64.encode(&self.ciphertext),
        ]
        .join(":")
    }

    pub fn decode(value: &str) -> VaultResult<Self> {
        let segments: Vec<&str> = value.split(SEPARATOR).collect();
        let [salt, iv, tag, ciphertext] = segments.as_slice() else {
            return Err(VaultError::NotAnEnvelope);
        };

        let envelope = Envelope {
            salt: decode_segment("salt", salt)?,
            iv: decode_segment("iv", iv)?,
            tag: decode_segment("tag", tag)?,
            ciphertext: decode_segment("ciphertext", ciphertext)?,
        };

        check_len("salt", &envelope.salt, SALT_SIZE)?;
        check_len("iv", &envelope.iv, NONCE_SIZE)?;
        check_len("tag", &envelope.tag, TAG_SIZE)?;

        Ok(envelope)
    }
}

/// Cheap shape check: four colon-separated segments.
pub fn is_envelope(value: &str) -> bool {
    value.split(SEPARATOR).count() == 4
}

fn decode_segment(name: &str, segment: &str) -> VaultResult<Vec<u8>> {
    BASE64
        .decode(segment)
        .map_err(|e| VaultError::MalformedEnvelope(format!("{}: {}", name, e)))
}

fn check_len(name: &str, bytes: &[u8], expected: usize) -> VaultResult<()> {
    if bytes.len() != expected {
        return Err(VaultError::MalformedEnvelope(format!(
            "{} must be {} bytes, got {}",
            name,
            expected,
            bytes.len()
        )));
    }
    Ok(())
}
