//! In-memory credential backend
//!
//! Verifies signatures against a [`CredentialIndex`] built from static
//! configuration. The caller builds the string to sign; this backend only
//! recomputes the signature with the secret it holds, so it stays
//! independent of how the request was canonicalized.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::{
    Backend, HealthStatus, Identity, NOT_FOUND, PolicyDecision, RequestContext, VerifyOptions,
};
use crate::config::CredentialConfig;
use crate::error::AuthError;
use crate::index::{CredentialIndex, CredentialRecord};
use crate::sigv2;
use crate::sigv4::{DEFAULT_SERVICE, SigningContext};

/// Backend answering from a static credential table
pub struct InMemoryBackend {
    name: String,
    /// Swapped wholesale on refresh; readers keep their snapshot
    index: RwLock<Arc<CredentialIndex>>,
}

impl InMemoryBackend {
    /// Create a backend from an optional credential configuration
    pub fn new(config: Option<&CredentialConfig>) -> Self {
        Self::from_index(CredentialIndex::build(config))
    }

    /// Create a backend around an existing index
    pub fn from_index(index: CredentialIndex) -> Self {
        Self {
            name: "memory".to_string(),
            index: RwLock::new(Arc::new(index)),
        }
    }

    /// Set the name reported in logs and health reports
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Rebuild the index from new configuration and swap it in
    pub fn refresh(&self, config: Option<&CredentialConfig>) {
        let index = Arc::new(CredentialIndex::build(config));
        *self.index.write() = index;
        info!(backend = %self.name, "Credential index refreshed");
    }

    /// Current index snapshot
    pub fn index(&self) -> Arc<CredentialIndex> {
        self.index.read().clone()
    }

    /// Resolve canonical IDs to account short IDs
    pub fn get_account_ids(&self, canonical_ids: &[String]) -> BTreeMap<String, String> {
        let index = self.index();
        canonical_ids
            .iter()
            .map(|id| {
                let shortid = index
                    .by_canonical_id(id)
                    .map_or_else(|| NOT_FOUND.to_string(), |r| r.shortid.clone());
                (id.clone(), shortid)
            })
            .collect()
    }

    fn lookup(&self, access_key: &str) -> Result<(Arc<CredentialRecord>, String), AuthError> {
        let index = self.index();
        let record = index.by_access_key(access_key).ok_or_else(|| {
            debug!(backend = %self.name, access_key, "Unknown access key");
            AuthError::InvalidAccessKeyId
        })?;
        let secret = record
            .secret_key(access_key)
            .ok_or(AuthError::InvalidAccessKeyId)?
            .to_string();
        Ok((record, secret))
    }

    fn check(
        &self,
        record: &CredentialRecord,
        string_to_sign: &str,
        calculated: &str,
        provided: &str,
    ) -> Result<Identity, AuthError> {
        if !constant_time_eq(calculated, provided) {
            debug!(
                backend = %self.name,
                "Signature mismatch:\n  String to Sign:\n{}\n  Calculated: {}\n  Provided: {}",
                string_to_sign,
                calculated,
                provided
            );
            return Err(AuthError::SignatureDoesNotMatch);
        }
        Ok(Identity::from(record))
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify_signature_v2(
        &self,
        string_to_sign: &str,
        signature: &str,
        access_key: &str,
        options: &VerifyOptions,
    ) -> Result<Identity, AuthError> {
        let (record, secret) = self.lookup(access_key)?;
        let calculated = sigv2::calculate_signature(&secret, string_to_sign, options.algorithm);
        self.check(&record, string_to_sign, &calculated, signature)
    }

    async fn verify_signature_v4(
        &self,
        string_to_sign: &str,
        signature: &str,
        access_key: &str,
        region: &str,
        scope_date: &str,
        options: &VerifyOptions,
    ) -> Result<Identity, AuthError> {
        let (record, secret) = self.lookup(access_key)?;
        let service = options.service.as_deref().unwrap_or(DEFAULT_SERVICE);
        let calculated = SigningContext::new(&secret, region, scope_date)
            .with_service(service)
            .sign(string_to_sign);
        self.check(&record, string_to_sign, &calculated, signature)
    }

    async fn get_canonical_ids(
        &self,
        emails: &[String],
    ) -> Result<BTreeMap<String, String>, AuthError> {
        let index = self.index();
        Ok(emails
            .iter()
            .map(|email| {
                let canonical_id = index
                    .by_email(email)
                    .map_or_else(|| NOT_FOUND.to_string(), |r| r.canonical_id.clone());
                (email.clone(), canonical_id)
            })
            .collect())
    }

    async fn get_email_addresses(
        &self,
        canonical_ids: &[String],
    ) -> Result<BTreeMap<String, String>, AuthError> {
        let index = self.index();
        Ok(canonical_ids
            .iter()
            .map(|id| {
                let email = index
                    .by_canonical_id(id)
                    .map_or_else(|| NOT_FOUND.to_string(), |r| r.email.clone());
                (id.clone(), email)
            })
            .collect())
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

/// Constant-time string comparison to prevent timing attacks
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
