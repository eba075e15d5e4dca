//! # Fiscal Document Numbers
//!
//! Format and arithmetic for `EEE-PPP-NNNNNNN` invoice numbers.
//!
//! ```text
//!   001 - 002 - 0000457
//!    │     │       └── sequence, zero-padded to 7 digits (1..=9_999_999)
//!    │     └────────── point-of-sale code
//!    └──────────────── establishment code
//! ```
//!
//! The sequence is per `(establishment, point)` pair. Computing the next
//! number is pure; reading and locking the highest issued sequence is the
//! storage layer's job and must happen inside the issuance transaction.

use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::validation::validate_code;
use crate::MAX_SEQUENCE;

/// A parsed fiscal document number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentNumber {
    establishment_code: String,
    point_of_sale_code: String,
    sequence: i64,
}

impl DocumentNumber {
    /// Builds a number, validating codes and sequence range.
    pub fn new(
        establishment_code: &str,
        point_of_sale_code: &str,
        sequence: i64,
    ) -> CoreResult<Self> {
        validate_code("establishment_code", establishment_code)?;
        validate_code("point_of_sale_code", point_of_sale_code)?;

        if !(1..=MAX_SEQUENCE).contains(&sequence) {
            return Err(CoreError::InvalidDocumentNumber(format!(
                "{}-{}-{}",
                establishment_code, point_of_sale_code, sequence
            )));
        }

        Ok(DocumentNumber {
            establishment_code: establishment_code.to_string(),
            point_of_sale_code: point_of_sale_code.to_string(),
            sequence,
        })
    }

    /// The number following `highest` for the pair. `highest = 0` means
    /// nothing has been issued yet, so the first number is 1.
    pub fn next_after(
        establishment_code: &str,
        point_of_sale_code: &str,
        highest: i64,
    ) -> CoreResult<Self> {
        let next = highest.max(0) + 1;
        if next > MAX_SEQUENCE {
            return Err(CoreError::SequenceExhausted {
                establishment_code: establishment_code.to_string(),
                point_of_sale_code: point_of_sale_code.to_string(),
            });
        }

        DocumentNumber::new(establishment_code, point_of_sale_code, next)
    }

    pub fn establishment_code(&self) -> &str {
        &self.establishment_code
    }

    pub fn point_of_sale_code(&self) -> &str {
        &self.point_of_sale_code
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:07}",
            self.establishment_code, self.point_of_sale_code, self.sequence
        )
    }
}

impl FromStr for DocumentNumber {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidDocumentNumber(s.to_string());

        let mut parts = s.split('-');
        let (Some(est), Some(pos), Some(seq), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        if seq.len() != 7 || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let sequence: i64 = seq.parse().map_err(|_| invalid())?;

        DocumentNumber::new(est, pos, sequence).map_err(|_| invalid())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
