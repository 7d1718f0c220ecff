//! Parsed request handed over by the front end
//!
//! The front end has already split the request into method, path, query
//! parameters and headers; this module only classifies which signing
//! scheme the request uses.

use crate::canonical::CanonicalRequestInput;
use crate::encoding::{parse_query, percent_decode};
use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request context for authentication
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// HTTP method
    pub method: String,
    /// Decoded request path
    pub path: String,
    /// Path exactly as it appeared on the wire, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_path: Option<String>,
    /// Decoded query parameters (duplicates flattened, last wins)
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Headers keyed by lower-cased name
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Bucket name taken from a virtual-hosted `Host`, if any
    #[serde(default)]
    pub host_bucket: Option<String>,
}

/// Signing scheme detected on a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// No credentials at all
    Anonymous,
    /// `Authorization: AWS access:signature`
    V2Header,
    /// `AWSAccessKeyId`/`Signature`/`Expires` query parameters
    V2Query,
    /// `Authorization: AWS4-HMAC-SHA256 ...`
    V4Header,
    /// `X-Amz-*` presigned query parameters
    V4Query,
}

impl AuthRequest {
    /// Create a new auth request
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Build from an `http::Request`, decoding path and query
    pub fn from_http<B>(request: &http::Request<B>) -> Self {
        let uri = request.uri();
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in request.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        Self {
            method: request.method().as_str().to_string(),
            path: percent_decode(uri.path()),
            raw_path: Some(uri.path().to_string()),
            query: parse_query(uri.query().unwrap_or("")).into_iter().collect(),
            headers,
            host_bucket: None,
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Add a header (the name is lower-cased)
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Set the path as it appeared on the wire
    #[must_use]
    pub fn with_raw_path(mut self, raw_path: impl Into<String>) -> Self {
        self.raw_path = Some(raw_path.into());
        self
    }

    /// Path as sent by the client, falling back to the decoded path
    pub fn wire_path(&self) -> &str {
        self.raw_path.as_deref().unwrap_or(&self.path)
    }

    /// Set the bucket resolved from a virtual-hosted `Host`
    #[must_use]
    pub fn with_host_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.host_bucket = Some(bucket.into());
        self
    }

    /// Get a header by lower-cased name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Get a query parameter by exact name
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Get the Authorization header value
    pub fn authorization_header(&self) -> Option<&str> {
        self.header("authorization")
    }

    /// Detect which signing scheme the request uses
    ///
    /// A request carrying both an `Authorization` header and a query
    /// signature is rejected.
    pub fn auth_scheme(&self) -> Result<AuthScheme, AuthError> {
        let query_v4 = self.query.contains_key("X-Amz-Algorithm");
        let query_v2 = self.query.contains_key("Signature");

        if let Some(header) = self.authorization_header() {
            if query_v4 || query_v2 {
                return Err(AuthError::invalid_argument(
                    "only one auth mechanism allowed; header and query signature both present",
                ));
            }
            if header.starts_with("AWS4-") {
                return Ok(AuthScheme::V4Header);
            }
            if header.starts_with("AWS ") {
                return Ok(AuthScheme::V2Header);
            }
            return Err(AuthError::AuthMethodNotImplemented);
        }

        if query_v4 {
            return Ok(AuthScheme::V4Query);
        }
        if query_v2 {
            return Ok(AuthScheme::V2Query);
        }
        Ok(AuthScheme::Anonymous)
    }

    /// Canonical-request input for this request
    pub fn canonical_input(
        &self,
        signed_headers: &[String],
        payload_checksum: Option<&str>,
        service: &str,
    ) -> CanonicalRequestInput {
        CanonicalRequestInput {
            method: self.method.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            headers: self.headers.clone(),
            signed_headers: signed_headers.to_vec(),
            payload_checksum: payload_checksum.map(str::to_string),
            service: service.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_decodes_path_and_query() {
        let request = http::Request::builder()
            .method("GET")
            .uri("/bucket/a%20b+c?prefix=x%2Fy&acl")
            .header("Host", "example.com")
            .header("X-Amz-Meta-A", "1")
            .header("x-amz-meta-a", "2")
            .body(())
            .unwrap();

        let auth = AuthRequest::from_http(&request);
        assert_eq!(auth.method, "GET");
        assert_eq!(auth.path, "/bucket/a b+c");
        assert_eq!(auth.wire_path(), "/bucket/a%20b+c");
        assert_eq!(auth.query_param("prefix"), Some("x/y"));
        assert_eq!(auth.query_param("acl"), Some(""));
        assert_eq!(auth.header("host"), Some("example.com"));
        assert_eq!(auth.header("x-amz-meta-a"), Some("1,2"));
    }

    #[test]
    fn test_auth_scheme_detection() {
        let anonymous = AuthRequest::new("GET", "/");
        assert_eq!(anonymous.auth_scheme().unwrap(), AuthScheme::Anonymous);

        let v4 = AuthRequest::new("GET", "/")
            .with_header("Authorization", "AWS4-HMAC-SHA256 Credential=...");
        assert_eq!(v4.auth_scheme().unwrap(), AuthScheme::V4Header);

        let v2 = AuthRequest::new("GET", "/").with_header("Authorization", "AWS AKID:sig");
        assert_eq!(v2.auth_scheme().unwrap(), AuthScheme::V2Header);

        let v4_query = AuthRequest::new("GET", "/").with_query("X-Amz-Algorithm", "AWS4-HMAC-SHA256");
        assert_eq!(v4_query.auth_scheme().unwrap(), AuthScheme::V4Query);

        let v2_query = AuthRequest::new("GET", "/").with_query("Signature", "sig");
        assert_eq!(v2_query.auth_scheme().unwrap(), AuthScheme::V2Query);
    }

    #[test]
    fn test_auth_scheme_rejects_mixed_or_unknown() {
        let mixed = AuthRequest::new("GET", "/")
            .with_header("Authorization", "AWS AKID:sig")
            .with_query("Signature", "sig");
        assert!(matches!(
            mixed.auth_scheme(),
            Err(AuthError::InvalidArgument(_))
        ));

        let bearer = AuthRequest::new("GET", "/").with_header("Authorization", "Bearer token");
        assert_eq!(bearer.auth_scheme(), Err(AuthError::AuthMethodNotImplemented));
    }
}
