//! Backend chain
//!
//! Composes an ordered list of backends behind the [`Backend`] trait.
//! Signature verification tries backends in order and stops at the first
//! success. Lookups fan out to every backend concurrently and merge the
//! results: identity lookups let later backends overwrite earlier ones,
//! policy checks keep the first decision seen for each `(arn, version)`.

use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::{
    Backend, HealthReport, HealthStatus, Identity, PolicyDecision, RequestContext, VerifyOptions,
};
use crate::error::AuthError;

/// Ordered, non-empty composition of backends
pub struct BackendChain {
    backends: Vec<Arc<dyn Backend>>,
    timeout: Option<Duration>,
}

impl BackendChain {
    /// Create a chain; an empty list is a configuration error
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Result<Self, AuthError> {
        if backends.is_empty() {
            return Err(AuthError::InvalidConfig(
                "backend chain needs at least one backend".to_string(),
            ));
        }
        Ok(Self {
            backends,
            timeout: None,
        })
    }

    /// Bound every backend call; a timeout counts as that backend failing
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the number of backends
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Check if chain is empty
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Names of the backends in order
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Health of every backend, in chain order
    pub async fn health_reports(&self) -> Vec<HealthReport> {
        let checks = self.backends.iter().map(|backend| async move {
            HealthReport {
                backend: backend.name().to_string(),
                result: self.bounded(backend.name(), backend.healthcheck()).await,
            }
        });
        join_all(checks).await
    }

    async fn bounded<T, F>(&self, backend: &str, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        let Some(limit) = self.timeout else {
            return call.await;
        };
        tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            warn!(backend, ?limit, "Backend call timed out");
            Err(AuthError::ServiceUnavailable(format!(
                "backend {backend} timed out after {limit:?}"
            )))
        })
    }

    /// Every error moves on to the next backend; unexpected ones are logged louder
    fn log_failure(backend: &str, version: &str, error: &AuthError) {
        if error.is_recoverable() {
            debug!(backend, version, %error, "Signature verification failed");
        } else {
            warn!(backend, version, %error, "Signature verification errored");
        }
    }

    fn exhausted(last_error: Option<AuthError>) -> AuthError {
        last_error.unwrap_or_else(|| AuthError::internal("backend chain is empty"))
    }
}

#[async_trait]
impl Backend for BackendChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn verify_signature_v2(
        &self,
        string_to_sign: &str,
        signature: &str,
        access_key: &str,
        options: &VerifyOptions,
    ) -> Result<Identity, AuthError> {
        let mut last_error = None;
        for backend in &self.backends {
            let call = backend.verify_signature_v2(string_to_sign, signature, access_key, options);
            match self.bounded(backend.name(), call).await {
                Ok(identity) => {
                    debug!(backend = backend.name(), access_key, "V2 signature accepted");
                    return Ok(identity);
                }
                Err(e) => {
                    Self::log_failure(backend.name(), "V2", &e);
                    last_error = Some(e);
                }
            }
        }
        Err(Self::exhausted(last_error))
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
        let mut last_error = None;
        for backend in &self.backends {
            let call = backend.verify_signature_v4(
                string_to_sign,
                signature,
                access_key,
                region,
                scope_date,
                options,
            );
            match self.bounded(backend.name(), call).await {
                Ok(identity) => {
                    debug!(backend = backend.name(), access_key, "V4 signature accepted");
                    return Ok(identity);
                }
                Err(e) => {
                    Self::log_failure(backend.name(), "V4", &e);
                    last_error = Some(e);
                }
            }
        }
        Err(Self::exhausted(last_error))
    }

    async fn get_canonical_ids(
        &self,
        emails: &[String],
    ) -> Result<BTreeMap<String, String>, AuthError> {
        let calls = self
            .backends
            .iter()
            .map(|b| self.bounded(b.name(), b.get_canonical_ids(emails)));
        let results = try_join_all(calls).await?;

        // Later backends overwrite earlier ones
        let mut merged = BTreeMap::new();
        for result in results {
            merged.extend(result);
        }
        Ok(merged)
    }

    async fn get_email_addresses(
        &self,
        canonical_ids: &[String],
    ) -> Result<BTreeMap<String, String>, AuthError> {
        let calls = self
            .backends
            .iter()
            .map(|b| self.bounded(b.name(), b.get_email_addresses(canonical_ids)));
        let results = try_join_all(calls).await?;

        let mut merged = BTreeMap::new();
        for result in results {
            merged.extend(result);
        }
        Ok(merged)
    }

    async fn check_policies(
        &self,
        request_contexts: &[RequestContext],
        user_arn: &str,
    ) -> Result<Vec<PolicyDecision>, AuthError> {
        let calls = self
            .backends
            .iter()
            .map(|b| self.bounded(b.name(), b.check_policies(request_contexts, user_arn)));
        let results = try_join_all(calls).await?;

        // First decision for a given (arn, version) wins
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for decision in results.into_iter().flatten() {
            if seen.insert(decision.merge_key()) {
                merged.push(decision);
            }
        }
        Ok(merged)
    }

    async fn healthcheck(&self) -> Result<HealthStatus, AuthError> {
        let reports = self.health_reports().await;
        let unhealthy: Vec<&str> = reports
            .iter()
            .filter(|r| !r.is_healthy())
            .map(|r| r.backend.as_str())
            .collect();

        if unhealthy.is_empty() {
            return Ok(HealthStatus::ok());
        }

        warn!(backends = ?unhealthy, "Unhealthy backends in chain");
        Err(AuthError::InternalError {
            message: format!("unhealthy backends: {}", unhealthy.join(", ")),
            reports,
        })
    }
}
