//! # Invoice Number Allocator
//!
//! Hands out `EEE-PPP-NNNNNNN` numbers, strictly increasing per
//! establishment / point-of-sale pair.
//!
//! ```text
//!   tx (write lock held)
//!    │
//!    ├── lock_highest_sequence(EEE, PPP) ── max(counter, issued documents)
//!    ├── DocumentNumber::next_after(highest)      (> 9 999 999 → exhausted)
//!    └── set_highest_sequence(EEE, PPP, n)        (counter never moves back)
//! ```
//!
//! Two concurrent allocations cannot read the same highest sequence: the
//! read happens inside a transaction that already owns the write lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use washpos_core::validation::validate_code;
use washpos_core::DocumentNumber;
use washpos_db::{FiscalStore, FiscalTx};

use crate::error::FiscalResult;
use crate::tx::finish;

#[derive(Clone)]
pub struct InvoiceNumberAllocator {
    store: Arc<dyn FiscalStore>,
}

impl InvoiceNumberAllocator {
    pub fn new(store: Arc<dyn FiscalStore>) -> Self {
        InvoiceNumberAllocator { store }
    }

    /// Reserves the next number in its own transaction.
    ///
    /// The number is consumed even if no document is ever written with it.
    pub async fn next(
        &self,
        establishment_code: &str,
        point_of_sale_code: &str,
    ) -> FiscalResult<DocumentNumber> {
        validate_code("establishment_code", establishment_code)?;
        validate_code("point_of_sale_code", point_of_sale_code)?;

        let mut tx = self.store.begin().await?;
        let result = Self::next_in(tx.as_mut(), establishment_code, point_of_sale_code, Utc::now()).await;
        finish(tx, result).await
    }

    /// The number `next` would return right now. Reserves nothing.
    pub async fn peek_next(
        &self,
        establishment_code: &str,
        point_of_sale_code: &str,
    ) -> FiscalResult<DocumentNumber> {
        let highest = self
            .store
            .highest_sequence(establishment_code, point_of_sale_code)
            .await?;
        Ok(DocumentNumber::next_after(
            establishment_code,
            point_of_sale_code,
            highest,
        )?)
    }

    pub(crate) async fn next_in(
        tx: &mut dyn FiscalTx,
        establishment_code: &str,
        point_of_sale_code: &str,
        now: DateTime<Utc>,
    ) -> FiscalResult<DocumentNumber> {
        let highest = tx
            .lock_highest_sequence(establishment_code, point_of_sale_code)
            .await?;

        let number = DocumentNumber::next_after(establishment_code, point_of_sale_code, highest)?;

        tx.set_highest_sequence(
            establishment_code,
            point_of_sale_code,
            number.sequence(),
            now,
        )
        .await?;

        debug!(%number, highest, "Document number allocated");
        Ok(number)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
