//! # API Shapes
//!
//! JSON shapes exchanged with the admin frontend. Framework-agnostic: the
//! HTTP layer only serializes these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::permit::{PermitStatus, PermitVerdict};
use crate::types::IntegrationMode;

/// Permit status query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PermitStatusResponse {
    pub is_valid: bool,
    pub blocks_issuance: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub days_left: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,
    pub status: PermitStatus,
}

impl From<&PermitVerdict> for PermitStatusResponse {
    fn from(verdict: &PermitVerdict) -> Self {
        PermitStatusResponse {
            is_valid: verdict.valid,
            blocks_issuance: verdict.blocks_issuance,
            days_left: verdict.days_left,
            error: verdict.error.clone(),
            status: verdict.status,
        }
    }
}

/// Integration credentials as shown to clients. Never carries plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsView {
    pub endpoint_url: String,
    pub mode: IntegrationMode,
    pub active: bool,
    pub has_auth_token: bool,
    pub has_certificate: bool,
    pub has_certificate_password: bool,
    /// Mask shown in the token field when a token is stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub auth_token_placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub certificate_password_placeholder: Option<String>,
    pub last_test_status: Option<String>,
    pub last_test_error: Option<String>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Update request for the integration credentials.
///
/// For each secret: absent or a mask placeholder keeps the stored value,
/// an empty string clears it, anything else replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCredentialsRequest {
    pub endpoint_url: Option<String>,
    pub auth_token: Option<String>,
    /// Base64 of the certificate file.
    pub certificate_blob: Option<String>,
    pub certificate_password: Option<String>,
    pub mode: Option<IntegrationMode>,
    pub active: Option<bool>,
}
