//! # Document Repository
//!
//! Issued fiscal documents. Fiscal columns (number, sequence, permit,
//! issuance time and issuer) are written once by [`insert`]; [`update`]
//! only touches the sale fields.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use washpos_core::FiscalDocument;

pub async fn get(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<FiscalDocument>> {
    let document = sqlx::query_as::<_, FiscalDocument>(
        r#"
        SELECT
            id,
            document_number,
            establishment_code,
            point_of_sale_code,
            sequence,
            permit_number_used,
            issued_at,
            issued_by,
            customer_name,
            vehicle_plate,
            total_cents,
            notes,
            updated_at
        FROM fiscal_documents
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(document)
}

pub async fn insert(conn: &mut SqliteConnection, document: &FiscalDocument) -> DbResult<()> {
    debug!(id = %document.id, number = %document.document_number, "Inserting fiscal document");

    sqlx::query(
        r#"
        INSERT INTO fiscal_documents (
            id, document_number, establishment_code, point_of_sale_code,
            sequence, permit_number_used, issued_at, issued_by,
            customer_name, vehicle_plate, total_cents, notes, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7, ?8,
            ?9, ?10, ?11, ?12, ?13
        )
        "#,
    )
    .bind(&document.id)
    .bind(&document.document_number)
    .bind(&document.establishment_code)
    .bind(&document.point_of_sale_code)
    .bind(document.sequence)
    .bind(&document.permit_number_used)
    .bind(document.issued_at)
    .bind(&document.issued_by)
    .bind(&document.customer_name)
    .bind(&document.vehicle_plate)
    .bind(document.total_cents)
    .bind(&document.notes)
    .bind(document.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|err| match DbError::from(err) {
        DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
            field,
            value: document.document_number.clone(),
        },
        other => other,
    })?;

    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, document: &FiscalDocument) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE fiscal_documents SET
            customer_name = ?2,
            vehicle_plate = ?3,
            total_cents = ?4,
            notes = ?5,
            updated_at = ?6
        WHERE id = ?1
        "#,
    )
    .bind(&document.id)
    .bind(&document.customer_name)
    .bind(&document.vehicle_plate)
    .bind(document.total_cents)
    .bind(&document.notes)
    .bind(document.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("FiscalDocument", &document.id));
    }

    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    debug!(id = %id, "Deleting fiscal document");

    let result = sqlx::query("DELETE FROM fiscal_documents WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}
