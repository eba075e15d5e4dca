//! # Credentials Repository
//!
//! Single-row `integration_credentials` table (id = 1). Secret columns
//! receive whatever the caller passes; sealing happens above this layer.

use sqlx::SqliteConnection;

use crate::error::DbResult;
use washpos_core::IntegrationCredentials;

pub async fn get(conn: &mut SqliteConnection) -> DbResult<Option<IntegrationCredentials>> {
    let credentials = sqlx::query_as::<_, IntegrationCredentials>(
        r#"
        SELECT
            endpoint_url,
            auth_token,
            certificate_blob,
            certificate_password,
            mode,
            active,
            last_test_status,
            last_test_error,
            updated_at
        FROM integration_credentials
        WHERE id = 1
        "#,
    )
    .fetch_optional(&mut *conn)
    .await?;

    Ok(credentials)
}

pub async fn save(conn: &mut SqliteConnection, credentials: &IntegrationCredentials) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO integration_credentials (
            id, endpoint_url, auth_token, certificate_blob, certificate_password,
            mode, active, last_test_status, last_test_error, updated_at
        ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT (id) DO UPDATE SET
            endpoint_url = excluded.endpoint_url,
            auth_token = excluded.auth_token,
            certificate_blob = excluded.certificate_blob,
            certificate_password = excluded.certificate_password,
            mode = excluded.mode,
            active = excluded.active,
            last_test_status = excluded.last_test_status,
            last_test_error = excluded.last_test_error,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&credentials.endpoint_url)
    .bind(&credentials.auth_token)
    .bind(&credentials.certificate_blob)
    .bind(&credentials.certificate_password)
    .bind(credentials.mode)
    .bind(credentials.active)
    .bind(&credentials.last_test_status)
    .bind(&credentials.last_test_error)
    .bind(credentials.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
