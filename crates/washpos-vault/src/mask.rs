//! # Secret Placeholders
//!
//! Read views show a stored secret as a run of bullets. When the client
//! sends that same mask back in an update, the stored envelope is kept as
//! is: the stored secret is never transmitted or re-encrypted.

/// Character used for masks.
pub const MASK_CHAR: char = '•';

/// Mask length used by read views.
pub const DEFAULT_MASK_LEN: usize = 8;

/// A mask of `len` bullets (at least one).
pub fn mask_placeholder(len: usize) -> String {
    std::iter::repeat(MASK_CHAR).take(len.max(1)).collect()
}

/// True when `value` is a mask rather than a real replacement secret.
pub fn is_placeholder(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c == MASK_CHAR)
}
