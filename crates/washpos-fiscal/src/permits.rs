//! Fiscal permit ("timbrado") administration and the issuance gate.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use washpos_core::api::PermitStatusResponse;
use washpos_core::permit::evaluate;
use washpos_core::validation::validate_permit;
use washpos_core::{FiscalPermit, PermitStatus, PermitVerdict};
use washpos_db::{FiscalStore, FiscalTx};

use crate::error::{FiscalError, FiscalResult};
use crate::tx::finish;

#[derive(Clone)]
pub struct PermitService {
    store: Arc<dyn FiscalStore>,
}

impl PermitService {
    pub fn new(store: Arc<dyn FiscalStore>) -> Self {
        PermitService { store }
    }

    /// Validates `permit` and makes it the active one. The previous permit
    /// stays in the history.
    pub async fn save_permit(
        &self,
        permit: FiscalPermit,
        now: DateTime<Utc>,
    ) -> FiscalResult<PermitStatusResponse> {
        let today = now.date_naive();
        validate_permit(&permit, today)?;

        let mut tx = self.store.begin().await?;
        let result = tx
            .save_fiscal_permit(&permit, now)
            .await
            .map_err(FiscalError::from);
        finish(tx, result).await?;

        let verdict = evaluate(Some(&permit), today);
        info!(
            permit_number = %permit.permit_number,
            establishment = %permit.establishment_code,
            point_of_sale = %permit.point_of_sale_code,
            status = ?verdict.status,
            "Fiscal permit saved"
        );
        Ok(PermitStatusResponse::from(&verdict))
    }

    /// Status of the active permit as of `now`.
    pub async fn permit_status(&self, now: DateTime<Utc>) -> FiscalResult<PermitStatusResponse> {
        let permit = self.store.fiscal_permit().await?;
        let verdict = evaluate(permit.as_ref(), now.date_naive());

        if verdict.status == PermitStatus::ExpiringSoon {
            warn!(days_left = ?verdict.days_left, "Fiscal permit expiring soon");
        }
        Ok(PermitStatusResponse::from(&verdict))
    }

    pub async fn current(&self) -> FiscalResult<Option<FiscalPermit>> {
        Ok(self.store.fiscal_permit().await?)
    }

    /// Reads the active permit inside `tx` and refuses when it blocks
    /// issuance.
    pub(crate) async fn gate_in(
        tx: &mut dyn FiscalTx,
        today: NaiveDate,
    ) -> FiscalResult<(FiscalPermit, PermitVerdict)> {
        let permit = tx.fiscal_permit().await?;
        let verdict = evaluate(permit.as_ref(), today);

        match permit {
            Some(permit) if !verdict.blocks_issuance => Ok((permit, verdict)),
            _ => {
                warn!(status = ?verdict.status, error = ?verdict.error, "Permit gate refused");
                Err(FiscalError::PermitInvalid(verdict))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, memory_store, permit_for, sqlite_store};
    use chrono::Duration;

    #[tokio::test]
    async fn test_status_without_permit() {
        let service = PermitService::new(memory_store());
        let status = service.permit_status(at(2026, 5, 10, 12)).await.unwrap();

        assert!(!status.is_valid);
        assert!(status.blocks_issuance);
        assert_eq!(status.status, PermitStatus::NotConfigured);
    }

    #[tokio::test]
    async fn test_save_supersedes() {
        let now = at(2026, 5, 10, 12);
        let service = PermitService::new(sqlite_store().await);

        let first = permit_for(now.date_naive());
        let status = service.save_permit(first, now).await.unwrap();
        assert!(status.is_valid);
        assert_eq!(status.status, PermitStatus::Valid);

        let mut second = permit_for(now.date_naive());
        second.permit_number = "87654321".to_string();
        second.valid_to = Some(now.date_naive() + Duration::days(10));
        let status = service.save_permit(second, now).await.unwrap();
        assert_eq!(status.status, PermitStatus::ExpiringSoon);
        assert_eq!(status.days_left, Some(10));

        let active = service.current().await.unwrap().unwrap();
        assert_eq!(active.permit_number, "87654321");
    }

    #[tokio::test]
    async fn test_invalid_permit_rejected() {
        let now = at(2026, 5, 10, 12);
        let service = PermitService::new(memory_store());

        let mut permit = permit_for(now.date_naive());
        permit.valid_to = permit.valid_from;
        let err = service.save_permit(permit, now).await.unwrap_err();
        assert!(matches!(err, FiscalError::Validation(_)));
        assert!(service.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_permit_status() {
        let saved_at = at(2026, 5, 10, 12);
        let service = PermitService::new(memory_store());
        service
            .save_permit(permit_for(saved_at.date_naive()), saved_at)
            .await
            .unwrap();

        let later = saved_at + Duration::days(400);
        let status = service.permit_status(later).await.unwrap();
        assert!(status.blocks_issuance);
        assert_eq!(status.status, PermitStatus::Expired);
        assert_eq!(status.days_left, Some(-35));
    }
}
