//! # Audit Repository
//!
//! Append-only `fiscal_audit_log`. Nothing in the crate updates or deletes
//! these rows.

use sqlx::SqliteConnection;

use crate::error::DbResult;
use washpos_core::AuditRecord;

pub async fn append(conn: &mut SqliteConnection, record: &AuditRecord) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO fiscal_audit_log (
            id, action, outcome, document_id, document_number,
            actor_id, actor_role, occurred_at, hours_elapsed,
            denial_reason, snapshot
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&record.id)
    .bind(record.action)
    .bind(record.outcome)
    .bind(&record.document_id)
    .bind(&record.document_number)
    .bind(&record.actor_id)
    .bind(record.actor_role)
    .bind(record.occurred_at)
    .bind(record.hours_elapsed)
    .bind(&record.denial_reason)
    .bind(&record.snapshot)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Entries for a document, oldest first.
pub async fn for_document(
    conn: &mut SqliteConnection,
    document_id: &str,
) -> DbResult<Vec<AuditRecord>> {
    let records = sqlx::query_as::<_, AuditRecord>(
        r#"
        SELECT
            id, action, outcome, document_id, document_number,
            actor_id, actor_role, occurred_at, hours_elapsed,
            denial_reason, snapshot
        FROM fiscal_audit_log
        WHERE document_id = ?1
        ORDER BY occurred_at, rowid
        "#,
    )
    .bind(document_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(records)
}
