//! # Permit Repository
//!
//! `fiscal_permits` is append-only. The row with the highest id is the
//! active permit; older rows stay as history.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use washpos_core::FiscalPermit;

/// The active permit, if one was ever saved.
pub async fn active(conn: &mut SqliteConnection) -> DbResult<Option<FiscalPermit>> {
    let permit = sqlx::query_as::<_, FiscalPermit>(
        r#"
        SELECT permit_number, valid_from, valid_to, establishment_code, point_of_sale_code
        FROM fiscal_permits
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(&mut *conn)
    .await?;

    Ok(permit)
}

/// Appends `permit`, superseding the current one.
pub async fn insert(
    conn: &mut SqliteConnection,
    permit: &FiscalPermit,
    now: DateTime<Utc>,
) -> DbResult<()> {
    debug!(permit_number = %permit.permit_number, "Saving fiscal permit");

    sqlx::query(
        r#"
        INSERT INTO fiscal_permits (
            permit_number, valid_from, valid_to,
            establishment_code, point_of_sale_code, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&permit.permit_number)
    .bind(permit.valid_from)
    .bind(permit.valid_to)
    .bind(&permit.establishment_code)
    .bind(&permit.point_of_sale_code)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Number of permits ever saved.
pub async fn history_len(conn: &mut SqliteConnection) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fiscal_permits")
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}
