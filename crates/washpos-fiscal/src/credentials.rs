//! # Integration Credentials
//!
//! Administration of the tax-authority integration secrets.
//!
//! ```text
//! UpdateCredentialsRequest field     stored value
//! ──────────────────────────────     ─────────────────────────────
//! absent / "••••••••"           ──►  kept byte-for-byte
//! ""                            ──►  cleared
//! anything else                 ──►  vault.seal(value)
//! ```
//!
//! Reads return a [`CredentialsView`] with presence flags and masks only.
//! Plaintext leaves this module solely through [`DecryptedCredentials`],
//! whose secrets are wrapped in `secrecy` and redacted from `Debug`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tracing::{info, warn};

use washpos_core::api::{CredentialsView, UpdateCredentialsRequest};
use washpos_core::{IntegrationCredentials, IntegrationMode, ValidationError};
use washpos_db::{FiscalStore, FiscalTx};
use washpos_vault::{
    is_envelope, is_placeholder, mask_placeholder, CredentialVault, KeySource, DEFAULT_MASK_LEN,
};

use crate::error::{FiscalError, FiscalResult};
use crate::tx::finish;

const TEST_STATUS_OK: &str = "success";
const TEST_STATUS_FAILED: &str = "failed";

/// Credentials with secrets opened, for the integration client.
#[derive(Debug, Clone)]
pub struct DecryptedCredentials {
    pub endpoint_url: String,
    pub auth_token: SecretString,
    pub certificate_blob: Option<SecretString>,
    pub certificate_password: Option<SecretString>,
    pub mode: IntegrationMode,
    pub active: bool,
}

/// How one secret field of an update is applied.
#[derive(Debug, PartialEq, Eq)]
enum SecretChange<'a> {
    Keep,
    Clear,
    Replace(&'a str),
}

impl<'a> SecretChange<'a> {
    fn from_request(value: Option<&'a str>) -> Self {
        match value {
            None => SecretChange::Keep,
            Some(v) if is_placeholder(v) => SecretChange::Keep,
            Some("") => SecretChange::Clear,
            Some(v) => SecretChange::Replace(v),
        }
    }
}

/// A secret field of an update with its replacement already sealed.
#[derive(Debug, PartialEq, Eq)]
enum SealedChange {
    Keep,
    Clear,
    Replace(String),
}

impl SealedChange {
    fn seal(vault: &CredentialVault, value: Option<&str>) -> FiscalResult<Self> {
        Ok(match SecretChange::from_request(value) {
            SecretChange::Keep => SealedChange::Keep,
            SecretChange::Clear => SealedChange::Clear,
            SecretChange::Replace(secret) => SealedChange::Replace(vault.seal(secret)?),
        })
    }

    fn apply(self, field: &mut String) {
        match self {
            SealedChange::Keep => {}
            SealedChange::Clear => field.clear(),
            SealedChange::Replace(envelope) => *field = envelope,
        }
    }

    fn apply_optional(self, field: &mut Option<String>) {
        match self {
            SealedChange::Keep => {}
            SealedChange::Clear => *field = None,
            SealedChange::Replace(envelope) => *field = Some(envelope),
        }
    }
}

struct SealedSecrets {
    auth_token: SealedChange,
    certificate_blob: SealedChange,
    certificate_password: SealedChange,
}

/// A legacy plaintext value and the envelope that replaces it.
struct Resealed {
    plaintext: String,
    envelope: String,
}

impl Resealed {
    fn seal(vault: &CredentialVault, value: Option<&str>) -> FiscalResult<Option<Self>> {
        match value.filter(|v| needs_seal(v)) {
            Some(plaintext) => Ok(Some(Resealed {
                plaintext: plaintext.to_string(),
                envelope: vault.seal(plaintext)?,
            })),
            None => Ok(None),
        }
    }

    /// Swaps in the envelope while `value` still holds the sealed plaintext.
    fn apply(&self, value: &mut String) -> bool {
        if *value != self.plaintext {
            return false;
        }
        *value = self.envelope.clone();
        true
    }
}

/// Envelopes for every plaintext secret found at read time.
struct ResealPlan {
    auth_token: Option<Resealed>,
    certificate_blob: Option<Resealed>,
    certificate_password: Option<Resealed>,
}

impl ResealPlan {
    fn seal(vault: &CredentialVault, stored: &IntegrationCredentials) -> FiscalResult<Self> {
        Ok(ResealPlan {
            auth_token: Resealed::seal(vault, Some(stored.auth_token.as_str()))?,
            certificate_blob: Resealed::seal(vault, stored.certificate_blob.as_deref())?,
            certificate_password: Resealed::seal(vault, stored.certificate_password.as_deref())?,
        })
    }

    fn is_empty(&self) -> bool {
        self.auth_token.is_none()
            && self.certificate_blob.is_none()
            && self.certificate_password.is_none()
    }

    /// Applies the envelopes to fields that were not changed since the plan
    /// was made. Returns how many were replaced.
    fn apply(&self, credentials: &mut IntegrationCredentials) -> usize {
        let mut count = 0;
        if let Some(resealed) = &self.auth_token {
            count += usize::from(resealed.apply(&mut credentials.auth_token));
        }
        for (planned, field) in [
            (&self.certificate_blob, &mut credentials.certificate_blob),
            (&self.certificate_password, &mut credentials.certificate_password),
        ] {
            if let (Some(resealed), Some(value)) = (planned, field.as_mut()) {
                count += usize::from(resealed.apply(value));
            }
        }
        count
    }
}

#[derive(Clone)]
pub struct CredentialsService {
    store: Arc<dyn FiscalStore>,
    vault: CredentialVault,
}

impl CredentialsService {
    pub fn new(store: Arc<dyn FiscalStore>, vault: CredentialVault) -> Self {
        CredentialsService { store, vault }
    }

    pub fn key_source(&self) -> KeySource {
        self.vault.key_source()
    }

    /// Client view of the stored credentials. Never contains plaintext.
    pub async fn view(&self) -> FiscalResult<CredentialsView> {
        let stored = self.store.integration_credentials().await?;
        Ok(view_of(stored.as_ref()))
    }

    /// Applies `request` on top of the stored credentials.
    ///
    /// New secrets are sealed before the transaction starts, so the key
    /// derivation never runs while the database write lock is held.
    pub async fn update(
        &self,
        request: UpdateCredentialsRequest,
        now: DateTime<Utc>,
    ) -> FiscalResult<CredentialsView> {
        if let Some(url) = request.endpoint_url.as_deref() {
            validate_endpoint_url(url)?;
        }
        let sealed = self.seal_secrets(&request).await?;

        let mut tx = self.store.begin().await?;
        let result = update_in(tx.as_mut(), &request, sealed, now).await;
        let updated = finish(tx, result).await?;

        info!(
            mode = ?updated.mode,
            active = updated.active,
            has_auth_token = !updated.auth_token.is_empty(),
            has_certificate = updated.certificate_blob.is_some(),
            "Integration credentials updated"
        );
        Ok(view_of(Some(&updated)))
    }

    async fn seal_secrets(&self, request: &UpdateCredentialsRequest) -> FiscalResult<SealedSecrets> {
        let auth_token = request.auth_token.clone();
        let certificate_blob = request.certificate_blob.clone();
        let certificate_password = request.certificate_password.clone();

        self.with_vault(move |vault| {
            Ok(SealedSecrets {
                auth_token: SealedChange::seal(vault, auth_token.as_deref())?,
                certificate_blob: SealedChange::seal(vault, certificate_blob.as_deref())?,
                certificate_password: SealedChange::seal(vault, certificate_password.as_deref())?,
            })
        })
        .await
    }

    /// Runs vault work on the blocking pool; sealing is CPU-bound.
    async fn with_vault<T, F>(&self, work: F) -> FiscalResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&CredentialVault) -> FiscalResult<T> + Send + 'static,
    {
        let vault = self.vault.clone();
        tokio::task::spawn_blocking(move || work(&vault))
            .await
            .map_err(|e| FiscalError::Internal(format!("Credential sealing task failed: {}", e)))?
    }

    /// Opens the stored secrets. Legacy plaintext values pass through.
    pub async fn decrypted(&self) -> FiscalResult<Option<DecryptedCredentials>> {
        let Some(stored) = self.store.integration_credentials().await? else {
            return Ok(None);
        };

        let open = |value: &str| SecretString::new(self.vault.open(value));
        let open_optional = |value: &Option<String>| {
            value.as_deref().filter(|v| !v.is_empty()).map(open)
        };

        Ok(Some(DecryptedCredentials {
            endpoint_url: stored.endpoint_url.clone(),
            auth_token: open(stored.auth_token.as_str()),
            certificate_blob: open_optional(&stored.certificate_blob),
            certificate_password: open_optional(&stored.certificate_password),
            mode: stored.mode,
            active: stored.active,
        }))
    }

    /// Records the outcome of a connectivity test against the endpoint.
    pub async fn record_test_result(
        &self,
        ok: bool,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> FiscalResult<CredentialsView> {
        let mut tx = self.store.begin().await?;
        let result = record_test_in(tx.as_mut(), ok, error, now).await;
        let credentials = finish(tx, result).await?;

        if ok {
            info!("Integration test succeeded");
        } else {
            warn!(error = ?credentials.last_test_error, "Integration test failed");
        }
        Ok(view_of(Some(&credentials)))
    }

    /// Seals every stored secret that is still plaintext. Returns how many
    /// fields were re-sealed.
    ///
    /// Sealing happens outside the transaction; a field changed in the
    /// meantime keeps its new value.
    pub async fn reseal_legacy_secrets(&self, now: DateTime<Utc>) -> FiscalResult<usize> {
        let Some(stored) = self.store.integration_credentials().await? else {
            return Ok(0);
        };
        let plan = self
            .with_vault(move |vault| ResealPlan::seal(vault, &stored))
            .await?;
        if plan.is_empty() {
            return Ok(0);
        }

        let mut tx = self.store.begin().await?;
        let result = reseal_in(tx.as_mut(), &plan, now).await;
        let count = finish(tx, result).await?;

        if count > 0 {
            warn!(count, "Legacy plaintext integration secrets re-sealed");
        }
        Ok(count)
    }
}

async fn update_in(
    tx: &mut dyn FiscalTx,
    request: &UpdateCredentialsRequest,
    sealed: SealedSecrets,
    now: DateTime<Utc>,
) -> FiscalResult<IntegrationCredentials> {
    let stored = tx.integration_credentials().await?;
    let updated = apply_update(stored, request, sealed, now);
    tx.save_integration_credentials(&updated).await?;
    Ok(updated)
}

fn apply_update(
    stored: Option<IntegrationCredentials>,
    request: &UpdateCredentialsRequest,
    sealed: SealedSecrets,
    now: DateTime<Utc>,
) -> IntegrationCredentials {
    let mut credentials = stored.unwrap_or_else(|| IntegrationCredentials {
        endpoint_url: String::new(),
        auth_token: String::new(),
        certificate_blob: None,
        certificate_password: None,
        mode: IntegrationMode::default(),
        active: false,
        last_test_status: None,
        last_test_error: None,
        updated_at: now,
    });

    if let Some(url) = &request.endpoint_url {
        credentials.endpoint_url = url.trim().to_string();
    }
    if let Some(mode) = request.mode {
        credentials.mode = mode;
    }
    if let Some(active) = request.active {
        credentials.active = active;
    }

    sealed.auth_token.apply(&mut credentials.auth_token);
    sealed
        .certificate_blob
        .apply_optional(&mut credentials.certificate_blob);
    sealed
        .certificate_password
        .apply_optional(&mut credentials.certificate_password);

    credentials.updated_at = now;
    credentials
}

async fn reseal_in(
    tx: &mut dyn FiscalTx,
    plan: &ResealPlan,
    now: DateTime<Utc>,
) -> FiscalResult<usize> {
    let Some(mut credentials) = tx.integration_credentials().await? else {
        return Ok(0);
    };

    let count = plan.apply(&mut credentials);
    if count > 0 {
        credentials.updated_at = now;
        tx.save_integration_credentials(&credentials).await?;
    }
    Ok(count)
}

async fn record_test_in(
    tx: &mut dyn FiscalTx,
    ok: bool,
    error: Option<String>,
    now: DateTime<Utc>,
) -> FiscalResult<IntegrationCredentials> {
    let mut credentials = tx
        .integration_credentials()
        .await?
        .ok_or_else(|| FiscalError::not_found("IntegrationCredentials", "1"))?;

    let status = if ok { TEST_STATUS_OK } else { TEST_STATUS_FAILED };
    credentials.last_test_status = Some(status.to_string());
    credentials.last_test_error = if ok { None } else { error };
    credentials.updated_at = now;

    tx.save_integration_credentials(&credentials).await?;
    Ok(credentials)
}

fn needs_seal(value: &str) -> bool {
    !value.is_empty() && !is_envelope(value)
}

fn validate_endpoint_url(url: &str) -> Result<(), ValidationError> {
    let url = url.trim();
    if url.is_empty() || url.starts_with("https://") || url.starts_with("http://") {
        return Ok(());
    }
    Err(ValidationError::InvalidFormat {
        field: "endpoint_url".to_string(),
        reason: "must start with http:// or https://".to_string(),
    })
}

fn view_of(stored: Option<&IntegrationCredentials>) -> CredentialsView {
    let Some(c) = stored else {
        return CredentialsView {
            endpoint_url: String::new(),
            mode: IntegrationMode::default(),
            active: false,
            has_auth_token: false,
            has_certificate: false,
            has_certificate_password: false,
            auth_token_placeholder: None,
            certificate_password_placeholder: None,
            last_test_status: None,
            last_test_error: None,
            updated_at: None,
        };
    };

    let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
    let has_auth_token = !c.auth_token.is_empty();
    let has_certificate_password = present(&c.certificate_password);

    CredentialsView {
        endpoint_url: c.endpoint_url.clone(),
        mode: c.mode,
        active: c.active,
        has_auth_token,
        has_certificate: present(&c.certificate_blob),
        has_certificate_password,
        auth_token_placeholder: has_auth_token.then(|| mask_placeholder(DEFAULT_MASK_LEN)),
        certificate_password_placeholder: has_certificate_password
            .then(|| mask_placeholder(DEFAULT_MASK_LEN)),
        last_test_status: c.last_test_status.clone(),
        last_test_error: c.last_test_error.clone(),
        updated_at: Some(c.updated_at),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, memory_store, sqlite_store, test_vault};
    use secrecy::ExposeSecret;

    fn service(store: Arc<dyn FiscalStore>) -> CredentialsService {
        CredentialsService::new(store, test_vault())
    }

    fn full_request() -> UpdateCredentialsRequest {
        UpdateCredentialsRequest {
            endpoint_url: Some("https://sifen-test.example.gov/api".to_string()),
            auth_token: Some("tok-123".to_string()),
            certificate_blob: Some("MIIBcert==".to_string()),
            certificate_password: Some("p4ss".to_string()),
            mode: Some(IntegrationMode::Testing),
            active: Some(true),
        }
    }

    #[tokio::test]
    async fn test_empty_view() {
        let view = service(memory_store()).view().await.unwrap();
        assert!(!view.has_auth_token);
        assert!(view.auth_token_placeholder.is_none());
        assert!(view.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_secrets_are_sealed_and_masked() {
        let store = sqlite_store().await;
        let service = service(store.clone());
        let now = at(2026, 5, 10, 12);

        let view = service.update(full_request(), now).await.unwrap();
        assert!(view.has_auth_token && view.has_certificate && view.has_certificate_password);
        assert_eq!(view.auth_token_placeholder.as_deref(), Some("••••••••"));

        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("tok-123"));
        assert!(!json.contains("p4ss"));

        let stored = store.integration_credentials().await.unwrap().unwrap();
        assert!(is_envelope(&stored.auth_token));
        assert!(stored.certificate_blob.as_deref().is_some_and(is_envelope));
        assert!(stored.certificate_password.as_deref().is_some_and(is_envelope));

        let opened = service.decrypted().await.unwrap().unwrap();
        assert_eq!(opened.auth_token.expose_secret(), "tok-123");
        assert_eq!(
            opened.certificate_password.as_ref().map(|s| s.expose_secret().as_str()),
            Some("p4ss")
        );
        assert!(!format!("{opened:?}").contains("tok-123"));
    }

    #[tokio::test]
    async fn test_placeholder_keeps_envelope() {
        let store = memory_store();
        let service = service(store.clone());
        let now = at(2026, 5, 10, 12);

        service.update(full_request(), now).await.unwrap();
        let before = store.integration_credentials().await.unwrap().unwrap();

        let masked = UpdateCredentialsRequest {
            endpoint_url: Some("https://sifen.example.gov/api".to_string()),
            auth_token: Some(mask_placeholder(DEFAULT_MASK_LEN)),
            certificate_password: Some("•••".to_string()),
            mode: Some(IntegrationMode::Production),
            ..Default::default()
        };
        service.update(masked, now).await.unwrap();

        let after = store.integration_credentials().await.unwrap().unwrap();
        assert_eq!(after.auth_token, before.auth_token);
        assert_eq!(after.certificate_blob, before.certificate_blob);
        assert_eq!(after.certificate_password, before.certificate_password);
        assert_eq!(after.mode, IntegrationMode::Production);
        assert_eq!(after.endpoint_url, "https://sifen.example.gov/api");
    }

    #[tokio::test]
    async fn test_empty_string_clears() {
        let store = memory_store();
        let service = service(store.clone());
        let now = at(2026, 5, 10, 12);
        service.update(full_request(), now).await.unwrap();

        let clear = UpdateCredentialsRequest {
            certificate_blob: Some(String::new()),
            certificate_password: Some(String::new()),
            ..Default::default()
        };
        let view = service.update(clear, now).await.unwrap();

        assert!(view.has_auth_token);
        assert!(!view.has_certificate);
        assert!(!view.has_certificate_password);
        assert!(view.certificate_password_placeholder.is_none());
    }

    fn legacy_credentials(now: DateTime<Utc>) -> IntegrationCredentials {
        IntegrationCredentials {
            endpoint_url: "https://sifen.example.gov/api".to_string(),
            auth_token: "legacy-token".to_string(),
            certificate_blob: None,
            certificate_password: Some("legacy-pass".to_string()),
            mode: IntegrationMode::Production,
            active: true,
            last_test_status: None,
            last_test_error: None,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_reseal_legacy_plaintext() {
        let store = sqlite_store().await;
        let service = service(store.clone());
        let now = at(2026, 5, 10, 12);

        let mut tx = store.begin().await.unwrap();
        tx.save_integration_credentials(&legacy_credentials(now))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        // Plaintext still opens before migration.
        let opened = service.decrypted().await.unwrap().unwrap();
        assert_eq!(opened.auth_token.expose_secret(), "legacy-token");

        assert_eq!(service.reseal_legacy_secrets(now).await.unwrap(), 2);
        assert_eq!(service.reseal_legacy_secrets(now).await.unwrap(), 0);

        let stored = store.integration_credentials().await.unwrap().unwrap();
        assert!(is_envelope(&stored.auth_token));
        let opened = service.decrypted().await.unwrap().unwrap();
        assert_eq!(opened.auth_token.expose_secret(), "legacy-token");
    }

    #[tokio::test]
    async fn test_record_test_result() {
        let store = memory_store();
        let service = service(store);
        let now = at(2026, 5, 10, 12);

        let err = service.record_test_result(true, None, now).await.unwrap_err();
        assert!(matches!(err, FiscalError::NotFound { .. }));

        service.update(full_request(), now).await.unwrap();
        let view = service
            .record_test_result(false, Some("timeout".to_string()), now)
            .await
            .unwrap();
        assert_eq!(view.last_test_status.as_deref(), Some("failed"));
        assert_eq!(view.last_test_error.as_deref(), Some("timeout"));

        let view = service.record_test_result(true, None, now).await.unwrap();
        assert_eq!(view.last_test_status.as_deref(), Some("success"));
        assert!(view.last_test_error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_endpoint_rejected() {
        let request = UpdateCredentialsRequest {
            endpoint_url: Some("ftp://nope".to_string()),
            ..Default::default()
        };
        let err = service(memory_store())
            .update(request, at(2026, 5, 10, 12))
            .await
            .unwrap_err();
        assert!(matches!(err, FiscalError::Validation(_)));
    }

    #[tokio::test]
    async fn test_sealing_runs_without_the_write_lock() {
        let store = memory_store();
        let service = service(store.clone());

        // An open transaction holds the store; sealing must still finish.
        let held = store.begin().await.unwrap();
        let sealed = service.seal_secrets(&full_request()).await.unwrap();
        held.rollback().await.unwrap();

        assert!(matches!(&sealed.auth_token, SealedChange::Replace(e) if is_envelope(e)));
        assert!(matches!(&sealed.certificate_password, SealedChange::Replace(e) if is_envelope(e)));

        let masked = UpdateCredentialsRequest {
            auth_token: Some(mask_placeholder(DEFAULT_MASK_LEN)),
            certificate_blob: Some(String::new()),
            ..Default::default()
        };
        let sealed = service.seal_secrets(&masked).await.unwrap();
        assert_eq!(sealed.auth_token, SealedChange::Keep);
        assert_eq!(sealed.certificate_blob, SealedChange::Clear);
        assert_eq!(sealed.certificate_password, SealedChange::Keep);
    }

    #[test]
    fn test_reseal_keeps_values_changed_after_sealing() {
        let vault = test_vault();
        let mut credentials = legacy_credentials(at(2026, 5, 10, 12));
        let plan = ResealPlan::seal(&vault, &credentials).unwrap();
        assert!(!plan.is_empty());

        credentials.auth_token = vault.seal("rotated-token").unwrap();
        let rotated = credentials.auth_token.clone();

        assert_eq!(plan.apply(&mut credentials), 1);
        assert_eq!(credentials.auth_token, rotated);
        assert_eq!(vault.open(&credentials.auth_token), "rotated-token");
        assert!(credentials.certificate_password.as_deref().is_some_and(is_envelope));
        assert_eq!(plan.apply(&mut credentials), 0);
    }

    #[test]
    fn test_secret_change() {
        assert_eq!(SecretChange::from_request(None), SecretChange::Keep);
        assert_eq!(SecretChange::from_request(Some("••")), SecretChange::Keep);
        assert_eq!(SecretChange::from_request(Some("")), SecretChange::Clear);
        assert_eq!(SecretChange::from_request(Some("x")), SecretChange::Replace("x"));
    }
}
