//! # Issuance Pipeline
//!
//! Issues one fiscal document as a single transaction.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  IssueRequest                                                           │
//! │      │ validate                                                         │
//! │      ▼                                                                  │
//! │  begin tx ─────────────────────────────────── (write lock acquired)     │
//! │      │                                                                  │
//! │      ├─ 1. quota gate      lock usage, rollover   → USAGE_LIMIT_EXCEEDED│
//! │      ├─ 2. permit gate     active permit          → TIMBRADO_INVALID    │
//! │      ├─ 3. allocate        EEE-PPP-NNNNNNN from the permit's codes      │
//! │      │        └─► IssuanceContext { quota, permit, verdict, n }         │
//! │      ├─ 4. insert document                                              │
//! │      └─ 5. commit usage    count + 1                                    │
//! │      │                                                                  │
//! │  commit ◄── Ok          rollback ◄── any Err                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A refused gate leaves nothing behind: no number is consumed and the
//! usage count is unchanged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use washpos_core::api::PermitStatusResponse;
use washpos_core::validation::{validate_account_id, validate_total_cents};
use washpos_core::{DocumentNumber, FiscalDocument, FiscalPermit, PermitVerdict, QuotaCheck};
use washpos_db::{FiscalStore, FiscalTx};

use crate::allocator::InvoiceNumberAllocator;
use crate::error::FiscalResult;
use crate::permits::PermitService;
use crate::quota::UsageQuotaTracker;
use crate::tx::finish;

/// A request to issue a fiscal document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    /// Issuing account. Its quota is consumed and it becomes `issued_by`.
    pub account_id: String,
    pub customer_name: Option<String>,
    pub vehicle_plate: Option<String>,
    pub total_cents: i64,
    pub notes: Option<String>,
}

/// Result of a successful issuance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedDocument {
    pub document: FiscalDocument,
    /// Period count after this document.
    pub usage_count: i64,
    pub limit: i64,
    pub permit: PermitStatusResponse,
}

/// Outputs of the gates, carried into the write stages.
#[derive(Debug)]
struct IssuanceContext {
    quota: QuotaCheck,
    permit: FiscalPermit,
    verdict: PermitVerdict,
    number: DocumentNumber,
}

impl IssuanceContext {
    fn document(&self, request: &IssueRequest, now: DateTime<Utc>) -> FiscalDocument {
        FiscalDocument {
            id: Uuid::new_v4().to_string(),
            document_number: self.number.to_string(),
            establishment_code: self.number.establishment_code().to_string(),
            point_of_sale_code: self.number.point_of_sale_code().to_string(),
            sequence: self.number.sequence(),
            permit_number_used: self.permit.permit_number.clone(),
            issued_at: now,
            issued_by: Some(request.account_id.clone()),
            customer_name: request.customer_name.clone(),
            vehicle_plate: request.vehicle_plate.clone(),
            total_cents: request.total_cents,
            notes: request.notes.clone(),
            updated_at: now,
        }
    }
}

#[derive(Clone)]
pub struct IssuanceService {
    store: Arc<dyn FiscalStore>,
}

impl IssuanceService {
    pub fn new(store: Arc<dyn FiscalStore>) -> Self {
        IssuanceService { store }
    }

    /// Issues a document for `request.account_id` at `now`.
    pub async fn issue(
        &self,
        request: IssueRequest,
        now: DateTime<Utc>,
    ) -> FiscalResult<IssuedDocument> {
        validate_account_id(&request.account_id)?;
        validate_total_cents(request.total_cents)?;

        let mut tx = self.store.begin().await?;
        let result = Self::run(tx.as_mut(), &request, now).await;
        let issued = finish(tx, result).await?;

        info!(
            document_number = %issued.document.document_number,
            account_id = %request.account_id,
            usage_count = issued.usage_count,
            limit = issued.limit,
            "Fiscal document issued"
        );
        Ok(issued)
    }

    async fn run(
        tx: &mut dyn FiscalTx,
        request: &IssueRequest,
        now: DateTime<Utc>,
    ) -> FiscalResult<IssuedDocument> {
        let context = Self::gate(tx, request, now).await?;

        let document = context.document(request, now);
        tx.create_fiscal_document(&document).await?;

        let usage_count = UsageQuotaTracker::commit_in(tx, &request.account_id, now).await?;

        Ok(IssuedDocument {
            document,
            usage_count,
            limit: context.quota.limit,
            permit: PermitStatusResponse::from(&context.verdict),
        })
    }

    /// Stages 1-3.
    async fn gate(
        tx: &mut dyn FiscalTx,
        request: &IssueRequest,
        now: DateTime<Utc>,
    ) -> FiscalResult<IssuanceContext> {
        let (quota, _) = UsageQuotaTracker::gate_in(tx, &request.account_id, now).await?;
        let (permit, verdict) = PermitService::gate_in(tx, now.date_naive()).await?;
        let number = InvoiceNumberAllocator::next_in(
            tx,
            &permit.establishment_code,
            &permit.point_of_sale_code,
            now,
        )
        .await?;

        tracing::debug!(
            %number,
            current_usage = quota.current_usage,
            permit_status = ?verdict.status,
            "Issuance gates passed"
        );

        Ok(IssuanceContext {
            quota,
            permit,
            verdict,
            number,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
