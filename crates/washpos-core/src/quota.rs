//! # Usage Quota Rules
//!
//! Monthly document quota: period rollover, gating order and release rules.
//!
//! ## Period Model
//! ```text
//! period index = year * 12 + month      (UTC calendar)
//!
//!   period_started_at: 2026-03-14  → index 24315
//!   now:               2026-04-02  → index 24316   diff >= 1 → rollover
//!
//! rollover: current_period_count = 0, period_started_at = now
//! ```
//!
//! ## Gating Order
//! The first failing condition wins:
//! `not provisioned → inactive → blocked → expired → limit reached`.
//!
//! Rollover must be applied (and persisted in the same transaction) before
//! [`evaluate_quota`] runs, otherwise a stale count at the month boundary
//! could refuse or admit the wrong request.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::AccountUsage;

/// Why a quota check refused the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotaDenial {
    /// No usage record exists for the account.
    AccountNotProvisioned,
    AccountInactive,
    AccountBlocked,
    AccountExpired,
    LimitReached,
}

impl QuotaDenial {
    /// Stable machine-readable reason.
    pub fn code(&self) -> &'static str {
        match self {
            QuotaDenial::AccountNotProvisioned => "ACCOUNT_NOT_PROVISIONED",
            QuotaDenial::AccountInactive => "ACCOUNT_INACTIVE",
            QuotaDenial::AccountBlocked => "ACCOUNT_BLOCKED",
            QuotaDenial::AccountExpired => "ACCOUNT_EXPIRED",
            QuotaDenial::LimitReached => "LIMIT_REACHED",
        }
    }

    /// Human-readable detail.
    pub fn message(&self) -> &'static str {
        match self {
            QuotaDenial::AccountNotProvisioned => "Account has no invoicing plan configured",
            QuotaDenial::AccountInactive => "Account is inactive",
            QuotaDenial::AccountBlocked => "Account is blocked",
            QuotaDenial::AccountExpired => "Account subscription has expired",
            QuotaDenial::LimitReached => "Monthly document limit reached",
        }
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCheck {
    pub allowed: bool,
    pub reason: Option<QuotaDenial>,
    pub current_usage: i64,
    pub limit: i64,
    pub days_until_reset: Option<i64>,
}

/// Calendar-month index of a timestamp.
pub fn period_index(at: DateTime<Utc>) -> i64 {
    i64::from(at.year()) * 12 + i64::from(at.month0())
}

/// True when `now` is at least one calendar month past the period start.
pub fn needs_rollover(usage: &AccountUsage, now: DateTime<Utc>) -> bool {
    period_index(now) - period_index(usage.period_started_at) >= 1
}

/// Resets the period when the month has advanced. Returns whether it did.
pub fn apply_rollover(usage: &mut AccountUsage, now: DateTime<Utc>) -> bool {
    if !needs_rollover(usage, now) {
        return false;
    }

    usage.current_period_count = 0;
    usage.period_started_at = now;
    usage.updated_at = now;
    true
}

/// Whole days from `now`'s date to the first day of the next month.
pub fn days_until_reset(now: DateTime<Utc>) -> i64 {
    let today = now.date_naive();
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };

    match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(next) => (next - today).num_days(),
        None => 0,
    }
}

/// Applies the gating order to an already rolled-over usage record.
pub fn evaluate_quota(usage: Option<&AccountUsage>, now: DateTime<Utc>) -> QuotaCheck {
    let Some(usage) = usage else {
        return QuotaCheck {
            allowed: false,
            reason: Some(QuotaDenial::AccountNotProvisioned),
            current_usage: 0,
            limit: 0,
            days_until_reset: None,
        };
    };

    let reason = if !usage.active {
        Some(QuotaDenial::AccountInactive)
    } else if usage.blocked {
        Some(QuotaDenial::AccountBlocked)
    } else if usage.account_expires_at.is_some_and(|expires| now > expires) {
        Some(QuotaDenial::AccountExpired)
    } else if usage.current_period_count >= usage.monthly_limit {
        Some(QuotaDenial::LimitReached)
    } else {
        None
    };

    QuotaCheck {
        allowed: reason.is_none(),
        reason,
        current_usage: usage.current_period_count,
        limit: usage.monthly_limit,
        days_until_reset: Some(days_until_reset(now)),
    }
}

/// Whether deleting a document issued at `issued_at` gives quota back.
///
/// Documents from a closed period were already accounted for there.
pub fn release_applies(usage: &AccountUsage, issued_at: DateTime<Utc>) -> bool {
    issued_at >= usage.period_started_at
}

// =============================================================================
// Unit Tests
// =============================================================================
