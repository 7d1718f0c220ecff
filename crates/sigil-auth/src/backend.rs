//! Backend capability contract
//!
//! A backend is any credential source able to answer "is this signature
//! valid?" and "who does this identity resolve to?". The in-memory backend
//! and [`BackendChain`](crate::chain::BackendChain) both implement it, and
//! remote identity services plug in the same way.

use crate::error::AuthError;
use crate::index::CredentialRecord;
use crate::sigv2::SignatureAlgorithm;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value returned for per-item lookups that found nothing
pub const NOT_FOUND: &str = "NotFound";

/// Identity behind a verified signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub account_display_name: String,
    #[serde(rename = "canonicalID")]
    pub canonical_id: String,
    pub arn: String,
    /// Set when the signer is a sub-user
    #[serde(rename = "IAMdisplayName", skip_serializing_if = "Option::is_none", default)]
    pub iam_display_name: Option<String>,
}

impl From<&CredentialRecord> for Identity {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            account_display_name: record.account_display_name.clone(),
            canonical_id: record.canonical_id.clone(),
            arn: record.arn.clone(),
            iam_display_name: record.iam_display_name.clone(),
        }
    }
}

/// Per-call options for signature verification
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Digest of a V2 signature
    pub algorithm: SignatureAlgorithm,
    /// Service used for V4 key derivation (defaults to `s3`)
    pub service: Option<String>,
}

impl VerifyOptions {
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}

/// Request context forwarded to policy-aware backends
///
/// Opaque to this crate; only backends that hold a policy store read it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// Action such as `s3:GetObject`
    pub action: String,
    /// Resource ARN the action applies to
    pub resource: String,
    /// Additional condition keys
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Result of a backend policy check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    pub is_allowed: bool,
}

impl PolicyDecision {
    pub fn new(arn: impl Into<String>, is_allowed: bool) -> Self {
        Self {
            arn: Some(arn.into()),
            version_id: None,
            is_allowed,
        }
    }

    #[must_use]
    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Merge key: `(arn, version)` with missing parts as empty strings
    pub fn merge_key(&self) -> (String, String) {
        (
            self.arn.clone().unwrap_or_default(),
            self.version_id.clone().unwrap_or_default(),
        )
    }
}

/// Healthy backend status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub code: u16,
    pub message: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            code: 200,
            message: "OK".to_string(),
        }
    }
}

/// Health outcome of one backend in a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Backend name
    pub backend: String,
    pub result: Result<HealthStatus, AuthError>,
}

impl HealthReport {
    pub const fn is_healthy(&self) -> bool {
        self.result.is_ok()
    }
}

/// Capability contract implemented by every credential source
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name for logging and health reports
    fn name(&self) -> &str;

    /// Verify a V2 signature over a caller-built string to sign
    async fn verify_signature_v2(
        &self,
        string_to_sign: &str,
        signature: &str,
        access_key: &str,
        options: &VerifyOptions,
    ) -> Result<Identity, AuthError>;

    /// Verify a V4 signature over a caller-built string to sign
    async fn verify_signature_v4(
        &self,
        string_to_sign: &str,
        signature: &str,
        access_key: &str,
        region: &str,
        scope_date: &str,
        options: &VerifyOptions,
    ) -> Result<Identity, AuthError>;

    /// Resolve emails to canonical IDs, one entry per input
    async fn get_canonical_ids(
        &self,
        emails: &[String],
    ) -> Result<BTreeMap<String, String>, AuthError>;

    /// Resolve canonical IDs to emails, one entry per input
    async fn get_email_addresses(
        &self,
        canonical_ids: &[String],
    ) -> Result<BTreeMap<String, String>, AuthError>;

    /// Evaluate the policies this backend holds for `user_arn`
    async fn check_policies(
        &self,
        request_contexts: &[RequestContext],
        user_arn: &str,
    ) -> Result<Vec<PolicyDecision>, AuthError>;

    /// Report whether the backend can serve requests
    async fn healthcheck(&self) -> Result<HealthStatus, AuthError>;
}

/// Minimal backend: supports nothing, holds no policies, always healthy
///
/// Useful as a placeholder in a chain and as the reference for what a
/// backend must answer when it lacks a capability.
#[derive(Debug, Clone)]
pub struct BaseBackend {
    name: String,
}

impl BaseBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for BaseBackend {
    fn default() -> Self {
        Self::new("base")
    }
}

#[async_trait]
impl Backend for BaseBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify_signature_v2(
        &self,
        _string_to_sign: &str,
        _signature: &str,
        _access_key: &str,
        _options: &VerifyOptions,
    ) -> Result<Identity, AuthError> {
        Err(AuthError::AuthMethodNotImplemented)
    }

    async fn verify_signature_v4(
        &self,
        _string_to_sign: &str,
        _signature: &str,
        _access_key: &str,
        _region: &str,
        _scope_date: &str,
        _options: &VerifyOptions,
    ) -> Result<Identity, AuthError> {
        Err(AuthError::AuthMethodNotImplemented)
    }

    async fn get_canonical_ids(
        &self,
        _emails: &[String],
    ) -> Result<BTreeMap<String, String>, AuthError> {
        Err(AuthError::AuthMethodNotImplemented)
    }

    async fn get_email_addresses(
        &self,
        _canonical_ids: &[String],
    ) -> Result<BTreeMap<String, String>, AuthError> {
        Err(AuthError::AuthMethodNotImplemented)
    }

    async fn check_policies(
        &self,
        _request_contexts: &[RequestContext],
        _user_arn: &str,
    ) -> Result<Vec<PolicyDecision>, AuthError> {
        Ok(Vec::new())
    }

    async fn healthcheck(&self) -> Result<HealthStatus, AuthError> {
        Ok(HealthStatus::ok())
    }
}
