//! # Usage Quota Tracker
//!
//! Monthly per-account document quota.
//!
//! ```text
//! check_and_reserve ─┐
//! commit ────────────┼─► lock usage ─► rollover? ─► gate ─► (+1 / -1) ─► persist
//! release ───────────┘        (one transaction, rollover persisted with it)
//! ```
//!
//! Gating order, first failure wins: not provisioned → inactive → blocked →
//! expired → limit reached. The rules live in `washpos_core::quota`; this
//! module applies them under the store's write lock.
//!
//! The `*_in` associated functions run inside a caller's transaction so the
//! issuance pipeline and document deletion share one unit of work.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use washpos_core::quota::{apply_rollover, evaluate_quota, release_applies};
use washpos_core::validation::{validate_account_id, validate_monthly_limit};
use washpos_core::{AccountUsage, QuotaCheck, UsagePatch};
use washpos_db::{FiscalStore, FiscalTx};

use crate::error::{FiscalError, FiscalResult};
use crate::tx::finish;

/// Tracks and enforces monthly document quotas.
#[derive(Clone)]
pub struct UsageQuotaTracker {
    store: Arc<dyn FiscalStore>,
}

impl UsageQuotaTracker {
    pub fn new(store: Arc<dyn FiscalStore>) -> Self {
        UsageQuotaTracker { store }
    }

    // =========================================================================
    // Quota operations
    // =========================================================================

    /// Rolls the period over if due and reports whether one more document
    /// may be issued. Does not consume quota.
    pub async fn check_and_reserve(
        &self,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> FiscalResult<QuotaCheck> {
        let mut tx = self.store.begin().await?;
        let result = Self::check_in(tx.as_mut(), account_id, now)
            .await
            .map(|(check, _)| check);
        finish(tx, result).await
    }

    /// Consumes one document of quota. Returns the new period count.
    pub async fn commit(&self, account_id: &str, now: DateTime<Utc>) -> FiscalResult<i64> {
        let mut tx = self.store.begin().await?;
        let result = Self::commit_in(tx.as_mut(), account_id, now).await;
        finish(tx, result).await
    }

    /// Gives back the quota of a deleted document issued at `issued_at`.
    ///
    /// Documents from a closed period leave the count unchanged, and the
    /// count never drops below zero. Returns the period count afterwards.
    pub async fn release(
        &self,
        account_id: &str,
        issued_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> FiscalResult<i64> {
        let mut tx = self.store.begin().await?;
        let result = Self::release_in(tx.as_mut(), account_id, issued_at, now)
            .await
            .and_then(|count| count.ok_or_else(|| FiscalError::not_found("AccountUsage", account_id)));
        finish(tx, result).await
    }

    /// Read-only view of an account's usage record.
    pub async fn usage(&self, account_id: &str) -> FiscalResult<Option<AccountUsage>> {
        Ok(self.store.account_usage(account_id).await?)
    }

    // =========================================================================
    // In-transaction stages
    // =========================================================================

    /// Locks the usage record, persists a due rollover and evaluates the
    /// gate.
    pub(crate) async fn check_in(
        tx: &mut dyn FiscalTx,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> FiscalResult<(QuotaCheck, Option<AccountUsage>)> {
        let mut usage = tx.lock_account_usage(account_id).await?;

        if let Some(current) = usage.as_mut() {
            let previous_count = current.current_period_count;
            if apply_rollover(current, now) {
                *current = tx
                    .update_account_usage(account_id, &UsagePatch::counters_of(current), now)
                    .await?;
                info!(account_id, previous_count, "Usage period rolled over");
            }
        }

        let check = evaluate_quota(usage.as_ref(), now);
        debug!(
            account_id,
            allowed = check.allowed,
            current_usage = check.current_usage,
            limit = check.limit,
            "Quota checked"
        );
        Ok((check, usage))
    }

    /// Like [`check_in`](Self::check_in), but a refusal is an error.
    pub(crate) async fn gate_in(
        tx: &mut dyn FiscalTx,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> FiscalResult<(QuotaCheck, AccountUsage)> {
        match Self::check_in(tx, account_id, now).await? {
            (check, Some(usage)) if check.allowed => Ok((check, usage)),
            (check, _) => {
                warn!(
                    account_id,
                    reason = check.reason.map(|r| r.code()).unwrap_or("UNKNOWN"),
                    current_usage = check.current_usage,
                    limit = check.limit,
                    "Quota gate refused"
                );
                Err(FiscalError::UsageLimitExceeded(check))
            }
        }
    }

    pub(crate) async fn commit_in(
        tx: &mut dyn FiscalTx,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> FiscalResult<i64> {
        let (_, usage) = Self::gate_in(tx, account_id, now).await?;

        let patch = UsagePatch {
            current_period_count: Some(usage.current_period_count + 1),
            ..Default::default()
        };
        let updated = tx.update_account_usage(account_id, &patch, now).await?;
        Ok(updated.current_period_count)
    }

    /// `None` when the account has no usage record.
    pub(crate) async fn release_in(
        tx: &mut dyn FiscalTx,
        account_id: &str,
        issued_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> FiscalResult<Option<i64>> {
        let Some(mut usage) = tx.lock_account_usage(account_id).await? else {
            return Ok(None);
        };

        let mut changed = apply_rollover(&mut usage, now);
        if !release_applies(&usage, issued_at) {
            debug!(account_id, %issued_at, "Document from a closed period, usage unchanged");
        } else if usage.current_period_count > 0 {
            usage.current_period_count -= 1;
            changed = true;
        }

        if changed {
            usage = tx
                .update_account_usage(account_id, &UsagePatch::counters_of(&usage), now)
                .await?;
        }

        Ok(Some(usage.current_period_count))
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Creates the usage record of a new account.
    pub async fn provision(
        &self,
        account_id: &str,
        monthly_limit: i64,
        account_expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> FiscalResult<AccountUsage> {
        validate_account_id(account_id)?;
        validate_monthly_limit(monthly_limit)?;

        let mut usage = AccountUsage::new(account_id, monthly_limit, now);
        usage.account_expires_at = account_expires_at;

        let mut tx = self.store.begin().await?;
        let result = tx
            .insert_account_usage(&usage)
            .await
            .map_err(FiscalError::from);
        finish(tx, result).await?;

        info!(account_id, monthly_limit, "Account usage provisioned");
        Ok(usage)
    }

    pub async fn set_limit(
        &self,
        account_id: &str,
        monthly_limit: i64,
        now: DateTime<Utc>,
    ) -> FiscalResult<AccountUsage> {
        validate_monthly_limit(monthly_limit)?;
        self.apply(
            account_id,
            UsagePatch {
                monthly_limit: Some(monthly_limit),
                ..Default::default()
            },
            now,
        )
        .await
    }

    pub async fn set_blocked(
        &self,
        account_id: &str,
        blocked: bool,
        now: DateTime<Utc>,
    ) -> FiscalResult<AccountUsage> {
        self.apply(
            account_id,
            UsagePatch {
                blocked: Some(blocked),
                ..Default::default()
            },
            now,
        )
        .await
    }

    pub async fn set_active(
        &self,
        account_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> FiscalResult<AccountUsage> {
        self.apply(
            account_id,
            UsagePatch {
                active: Some(active),
                ..Default::default()
            },
            now,
        )
        .await
    }

    async fn apply(
        &self,
        account_id: &str,
        patch: UsagePatch,
        now: DateTime<Utc>,
    ) -> FiscalResult<AccountUsage> {
        let mut tx = self.store.begin().await?;
        let result = tx
            .update_account_usage(account_id, &patch, now)
            .await
            .map_err(FiscalError::from);
        let usage = finish(tx, result).await?;

        info!(
            account_id,
            monthly_limit = usage.monthly_limit,
            active = usage.active,
            blocked = usage.blocked,
            "Account usage updated"
        );
        Ok(usage)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
