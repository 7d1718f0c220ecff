//! Client-side request signing
//!
//! Signs outgoing requests with header or query (presigned) authentication.
//! Everything here goes through the same canonicalization the verifier
//! uses, so a request signed here verifies against a backend holding the
//! same secret.
//!
//! Reference: https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-query-string-auth.html

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::canonical::UNSIGNED_PAYLOAD;
use crate::config::KeyPair;
use crate::encoding::uri_encode;
use crate::error::AuthError;
use crate::request::AuthRequest;
use crate::sigv2::{self, SignatureAlgorithm};
use crate::sigv4::{
    ALGORITHM, SCOPE_TERMINATOR, SigningContext, build_string_to_sign, format_amz_date,
};

/// Where and as whom a V4 request is signed
#[derive(Debug, Clone, Copy)]
pub struct V4Signer<'a> {
    pub key: &'a KeyPair,
    pub region: &'a str,
    pub service: &'a str,
    pub now: DateTime<Utc>,
}

impl<'a> V4Signer<'a> {
    pub fn new(key: &'a KeyPair, region: &'a str, now: DateTime<Utc>) -> Self {
        Self {
            key,
            region,
            service: "s3",
            now,
        }
    }

    #[must_use]
    pub const fn with_service(mut self, service: &'a str) -> Self {
        self.service = service;
        self
    }

    fn scope_date(&self) -> String {
        self.now.format("%Y%m%d").to_string()
    }

    fn scope(&self) -> String {
        format!(
            "{}/{}/{}/{SCOPE_TERMINATOR}",
            self.scope_date(),
            self.region,
            self.service
        )
    }

    fn sign(&self, string_to_sign: &str) -> String {
        let scope_date = self.scope_date();
        SigningContext::new(&self.key.secret, self.region, &scope_date)
            .with_service(self.service)
            .sign(string_to_sign)
    }
}

/// Sign a request with an `Authorization: AWS4-HMAC-SHA256` header
///
/// Adds `x-amz-date` and `x-amz-content-sha256`, then signs `host`,
/// `content-type`, `content-md5` (when present) and every `x-amz-*` header.
pub fn sign_v4_headers(
    request: &mut AuthRequest,
    signer: &V4Signer<'_>,
    payload_hash: &str,
) -> Result<(), AuthError> {
    let timestamp = format_amz_date(&signer.now);
    request
        .headers
        .insert("x-amz-date".to_string(), timestamp.clone());
    request
        .headers
        .insert("x-amz-content-sha256".to_string(), payload_hash.to_string());

    // BTreeMap keys are already sorted
    let signed_headers: Vec<String> = request
        .headers
        .keys()
        .filter(|name| {
            matches!(name.as_str(), "host" | "content-type" | "content-md5")
                || name.starts_with("x-amz-")
        })
        .cloned()
        .collect();

    let scope = signer.scope();
    let input = request.canonical_input(&signed_headers, Some(payload_hash), signer.service);
    let string_to_sign = build_string_to_sign(&input, &scope, &timestamp)?;
    let signature = signer.sign(&string_to_sign);

    request.headers.insert(
        "authorization".to_string(),
        format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
            signer.key.access,
            signed_headers.join(";")
        ),
    );
    Ok(())
}

/// Add `X-Amz-*` presigned query parameters to a request
///
/// Only `host` is signed, and only when the request carries one.
pub fn presign_v4_query(
    request: &mut AuthRequest,
    signer: &V4Signer<'_>,
    expires_in: Duration,
) -> Result<(), AuthError> {
    let timestamp = format_amz_date(&signer.now);
    let scope = signer.scope();
    let signed_headers: Vec<String> = if request.headers.contains_key("host") {
        vec!["host".to_string()]
    } else {
        Vec::new()
    };

    for (name, value) in [
        ("X-Amz-Algorithm", ALGORITHM.to_string()),
        (
            "X-Amz-Credential",
            format!("{}/{scope}", signer.key.access),
        ),
        ("X-Amz-Date", timestamp.clone()),
        ("X-Amz-Expires", expires_in.as_secs().to_string()),
        ("X-Amz-SignedHeaders", signed_headers.join(";")),
    ] {
        request.query.insert(name.to_string(), value);
    }

    let input = request.canonical_input(&signed_headers, Some(UNSIGNED_PAYLOAD), signer.service);
    let string_to_sign = build_string_to_sign(&input, &scope, &timestamp)?;
    let signature = signer.sign(&string_to_sign);
    request
        .query
        .insert("X-Amz-Signature".to_string(), signature);
    Ok(())
}

/// Generate a presigned GET URL for `bucket/key`
///
/// `endpoint` is the base URL of the service (e.g. `http://localhost:9000`);
/// its host part is the signed `host` header.
pub fn presign_get_url(
    endpoint: &str,
    signer: &V4Signer<'_>,
    bucket: &str,
    key: &str,
    expires_in: Duration,
) -> Result<String, AuthError> {
    let endpoint = endpoint.trim_end_matches('/');
    let host = endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://");

    let path = format!("/{bucket}/{key}");
    let mut request = AuthRequest::new("GET", path.as_str()).with_header("host", host);
    presign_v4_query(&mut request, signer, expires_in)?;

    let query: Vec<String> = request
        .query
        .iter()
        .map(|(name, value)| {
            format!("{}={}", uri_encode(name, true, false), uri_encode(value, true, false))
        })
        .collect();
    Ok(format!(
        "{endpoint}{}?{}",
        uri_encode(&path, false, false),
        query.join("&")
    ))
}

/// Sign a request with a V2 `Authorization: AWS access:signature` header
pub fn sign_v2_header(request: &mut AuthRequest, key: &KeyPair, algorithm: SignatureAlgorithm) {
    let string_to_sign = sigv2::build_string_to_sign(request, false);
    let signature = sigv2::calculate_signature(&key.secret, &string_to_sign, algorithm);
    request.headers.insert(
        "authorization".to_string(),
        format!("AWS {}:{signature}", key.access),
    );
}

/// Add V2 presigned query parameters, valid until `expires` (epoch seconds)
pub fn presign_v2_query(
    request: &mut AuthRequest,
    key: &KeyPair,
    expires: i64,
    algorithm: SignatureAlgorithm,
) {
    request
        .query
        .insert("AWSAccessKeyId".to_string(), key.access.clone());
    request
        .query
        .insert("Expires".to_string(), expires.to_string());
    let string_to_sign = sigv2::build_string_to_sign(request, true);
    let signature = sigv2::calculate_signature(&key.secret, &string_to_sign, algorithm);
    request.query.insert("Signature".to_string(), signature);
}
