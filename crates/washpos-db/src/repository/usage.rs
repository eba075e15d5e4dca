//! # Usage Repository
//!
//! `account_usage` rows. Updates read the row, apply a [`UsagePatch`] in
//! Rust and write every column back; callers hold the write lock, so the
//! read cannot go stale between the two statements.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use washpos_core::{AccountUsage, UsagePatch};

pub async fn get(conn: &mut SqliteConnection, account_id: &str) -> DbResult<Option<AccountUsage>> {
    let usage = sqlx::query_as::<_, AccountUsage>(
        r#"
        SELECT
            account_id,
            monthly_limit,
            current_period_count,
            period_started_at,
            account_expires_at,
            active,
            blocked,
            updated_at
        FROM account_usage
        WHERE account_id = ?1
        "#,
    )
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(usage)
}

pub async fn insert(conn: &mut SqliteConnection, usage: &AccountUsage) -> DbResult<()> {
    debug!(account_id = %usage.account_id, limit = usage.monthly_limit, "Provisioning account usage");

    sqlx::query(
        r#"
        INSERT INTO account_usage (
            account_id, monthly_limit, current_period_count, period_started_at,
            account_expires_at, active, blocked, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&usage.account_id)
    .bind(usage.monthly_limit)
    .bind(usage.current_period_count)
    .bind(usage.period_started_at)
    .bind(usage.account_expires_at)
    .bind(usage.active)
    .bind(usage.blocked)
    .bind(usage.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|err| match DbError::from(err) {
        DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
            field,
            value: usage.account_id.clone(),
        },
        other => other,
    })?;

    Ok(())
}

pub async fn update(
    conn: &mut SqliteConnection,
    account_id: &str,
    patch: &UsagePatch,
    now: DateTime<Utc>,
) -> DbResult<AccountUsage> {
    let mut usage = get(conn, account_id)
        .await?
        .ok_or_else(|| DbError::not_found("AccountUsage", account_id))?;

    patch.apply_to(&mut usage, now);

    sqlx::query(
        r#"
        UPDATE account_usage SET
            monthly_limit = ?2,
            current_period_count = ?3,
            period_started_at = ?4,
            account_expires_at = ?5,
            active = ?6,
            blocked = ?7,
            updated_at = ?8
        WHERE account_id = ?1
        "#,
    )
    .bind(&usage.account_id)
    .bind(usage.monthly_limit)
    .bind(usage.current_period_count)
    .bind(usage.period_started_at)
    .bind(usage.account_expires_at)
    .bind(usage.active)
    .bind(usage.blocked)
    .bind(usage.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(usage)
}
