//! # Sequence Repository
//!
//! Highest fiscal sequence per establishment / point of sale.
//!
//! ```text
//! highest = MAX(fiscal_sequences.last_sequence, MAX(fiscal_documents.sequence))
//! ```
//! The counter alone is authoritative once written; the document scan
//! covers databases whose documents predate the counter table.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::error::DbResult;

pub async fn highest(
    conn: &mut SqliteConnection,
    establishment_code: &str,
    point_of_sale_code: &str,
) -> DbResult<i64> {
    let counter: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT last_sequence
        FROM fiscal_sequences
        WHERE establishment_code = ?1 AND point_of_sale_code = ?2
        "#,
    )
    .bind(establishment_code)
    .bind(point_of_sale_code)
    .fetch_optional(&mut *conn)
    .await?;

    let documents: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT MAX(sequence)
        FROM fiscal_documents
        WHERE establishment_code = ?1 AND point_of_sale_code = ?2
        "#,
    )
    .bind(establishment_code)
    .bind(point_of_sale_code)
    .fetch_one(&mut *conn)
    .await?;

    Ok(counter.unwrap_or(0).max(documents.unwrap_or(0)))
}

/// Raises the counter to `sequence`. A lower value leaves it unchanged.
pub async fn advance(
    conn: &mut SqliteConnection,
    establishment_code: &str,
    point_of_sale_code: &str,
    sequence: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO fiscal_sequences (establishment_code, point_of_sale_code, last_sequence, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (establishment_code, point_of_sale_code) DO UPDATE SET
            last_sequence = MAX(last_sequence, excluded.last_sequence),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(establishment_code)
    .bind(point_of_sale_code)
    .bind(sequence)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
