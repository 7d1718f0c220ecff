//! Canonical request construction for AWS Signature Version 4
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n
//! \n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! The output is purely a function of [`CanonicalRequestInput`]; the same
//! input always yields the same bytes.
//! Reference: https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html

use crate::encoding::uri_encode;
use crate::error::AuthError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// SHA-256 of the empty string
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Payload checksum used by presigned requests
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Services that sign the form-encoded POST body instead of the query string
const POST_BODY_SERVICES: &[&str] = &["iam", "ring", "sts"];

/// Everything needed to reconstruct the canonical form of a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalRequestInput {
    /// HTTP method
    pub method: String,
    /// Resource path, not yet encoded
    pub path: String,
    /// Decoded query parameters (names are unique)
    pub query: BTreeMap<String, String>,
    /// Headers keyed by lower-cased name
    pub headers: BTreeMap<String, String>,
    /// Header names the client declares as signed, in declared order
    pub signed_headers: Vec<String>,
    /// Payload checksum supplied by the client, if any
    pub payload_checksum: Option<String>,
    /// Originating service name (e.g. "s3", "iam")
    pub service: String,
}

impl CanonicalRequestInput {
    /// Create an input for an S3 request
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            service: "s3".to_string(),
            ..Self::default()
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

    /// Set the signed header list from its `;`-separated form
    #[must_use]
    pub fn with_signed_headers(mut self, signed_headers: &str) -> Self {
        self.signed_headers = split_signed_headers(signed_headers);
        self
    }

    /// Set the client-supplied payload checksum
    #[must_use]
    pub fn with_payload_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.payload_checksum = Some(checksum.into());
        self
    }

    /// Set the originating service
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }
}

/// Split a declared `SignedHeaders` value, keeping the declared case
pub fn split_signed_headers(signed_headers: &str) -> Vec<String> {
    signed_headers
        .split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the full canonical request
///
/// Fails only when a signed header cannot be resolved from the headers,
/// the query, or the `expect` fallback.
pub fn build_canonical_request(input: &CanonicalRequestInput) -> Result<String, AuthError> {
    let payload_hash = payload_hash(
        &input.method,
        &input.query,
        input.payload_checksum.as_deref(),
    );
    let canonical_uri = canonical_uri(&input.path);
    let canonical_query = canonical_query_string(&input.method, &input.query, &input.service);
    let (canonical_headers, signed_headers) =
        canonical_headers(&input.headers, &input.query, &input.signed_headers)?;

    // canonical_headers already ends with '\n'; the extra one yields the blank line
    Ok(format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        input.method, canonical_uri, canonical_query, canonical_headers, signed_headers, payload_hash
    ))
}

/// Resolve the payload hash for the request
///
/// A supplied checksum always wins. Otherwise POST requests hash their
/// form-encoded parameters and everything else hashes the empty payload.
pub fn payload_hash(
    method: &str,
    query: &BTreeMap<String, String>,
    supplied: Option<&str>,
) -> String {
    if let Some(checksum) = supplied.filter(|c| !c.is_empty()) {
        return checksum.to_string();
    }

    if method == "POST" {
        let payload = form_encode(query).replace("%20", "+");
        return hex::encode(Sha256::digest(payload.as_bytes()));
    }

    EMPTY_PAYLOAD_SHA256.to_string()
}

/// Canonical URI: the path encoded with slashes kept, `/` when empty
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    uri_encode(path, false, false)
}

/// Canonical query string, sorted byte-wise by encoded name
pub fn canonical_query_string(
    method: &str,
    query: &BTreeMap<String, String>,
    service: &str,
) -> String {
    if query.is_empty() || (method == "POST" && POST_BODY_SERVICES.contains(&service)) {
        return String::new();
    }

    let mut params: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k, true, false), uri_encode(v, true, false)))
        .collect();

    params.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    params
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonical headers block and the sorted `SignedHeaders` value
///
/// Names are sorted ordinally and emitted as declared. Each signed header
/// produces `name:value\n`, its value matched case-insensitively against
/// the header map. A missing `expect` header is assumed to be
/// `100-continue` (proxies strip it); any other missing header falls back
/// to the query parameter of the same name.
pub fn canonical_headers(
    headers: &BTreeMap<String, String>,
    query: &BTreeMap<String, String>,
    signed_headers: &[String],
) -> Result<(String, String), AuthError> {
    let mut names: Vec<&str> = signed_headers.iter().map(String::as_str).collect();
    names.sort_unstable();

    let mut block = String::new();
    for name in &names {
        let lower = name.to_ascii_lowercase();
        let value = match headers.get(&lower) {
            Some(value) => value.as_str(),
            None if lower == "expect" => "100-continue",
            None => query
                .get(*name)
                .map(String::as_str)
                .ok_or_else(|| AuthError::MissingSignedHeader((*name).to_string()))?,
        };
        block.push_str(name);
        block.push(':');
        block.push_str(&collapse_whitespace(value));
        block.push('\n');
    }

    Ok((block, names.join(";")))
}

/// Form-encode parameters the way POST bodies are signed
fn form_encode(query: &BTreeMap<String, String>) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k, true, true), uri_encode(v, true, true)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Trim and collapse whitespace runs to a single space
fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
