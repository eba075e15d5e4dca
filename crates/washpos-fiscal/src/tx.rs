//! Transaction completion shared by the services.

use tracing::{debug, warn};

use washpos_db::FiscalTx;

use crate::error::FiscalResult;

/// Commits `tx` when `result` is `Ok`, rolls it back otherwise.
///
/// Services run their stages against `tx.as_mut()` and hand the outcome
/// here, so no path can leave a transaction half-applied.
pub(crate) async fn finish<T>(tx: Box<dyn FiscalTx>, result: FiscalResult<T>) -> FiscalResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed, connection will discard the transaction");
            }
            debug!(code = ?err.code(), "Fiscal transaction rolled back");
            Err(err)
        }
    }
}
