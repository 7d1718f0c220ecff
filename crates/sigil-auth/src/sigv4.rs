//! AWS Signature V4 primitives
//!
//! String-to-sign construction, signing-key derivation and the pieces of
//! the `Authorization` header needed to reconstruct a signature.
//! Reference: https://docs.aws.amazon.com/AmazonS3/latest/API/sig-v4-authenticating-requests.html

use crate::canonical::{CanonicalRequestInput, build_canonical_request, split_signed_headers};
use crate::error::AuthError;
use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

type HmacSha256 = Hmac<Sha256>;

/// Algorithm identifier for header and query authentication
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Terminator of every credential scope
pub const SCOPE_TERMINATOR: &str = "aws4_request";

/// Service used for key derivation when none is given
pub const DEFAULT_SERVICE: &str = "s3";

/// Timestamp layout of `x-amz-date` / `X-Amz-Date`
pub const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

static AUTH_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)=([^,\s]+)").expect("static regex is valid"));

/// Build the V4 string to sign for a request
///
/// Canonicalizes `request`, hashes it and assembles
/// `AWS4-HMAC-SHA256\n{timestamp}\n{scope}\n{hash}`.
pub fn build_string_to_sign(
    request: &CanonicalRequestInput,
    credential_scope: &str,
    timestamp: &str,
) -> Result<String, AuthError> {
    let canonical_request = build_canonical_request(request)?;
    Ok(string_to_sign_from_canonical(
        &canonical_request,
        timestamp,
        credential_scope,
    ))
}

/// Assemble the string to sign from an already built canonical request
pub fn string_to_sign_from_canonical(
    canonical_request: &str,
    timestamp: &str,
    credential_scope: &str,
) -> String {
    let canonical_request_hash = hex_sha256(canonical_request.as_bytes());
    format!("{ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// Derive the signing key for a date/region/service scope
pub fn derive_signing_key(
    secret_key: &str,
    region: &str,
    scope_date: &str,
    service: &str,
) -> Vec<u8> {
    let k_secret = format!("AWS4{secret_key}");
    let k_date = hmac_sha256(k_secret.as_bytes(), scope_date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, SCOPE_TERMINATOR.as_bytes())
}

/// Calculate the lowercase hex signature of a string to sign
pub fn calculate_signature(signing_key: &[u8], string_to_sign: &str) -> String {
    hex::encode(hmac_sha256(signing_key, string_to_sign.as_bytes()))
}

/// Secret material scoped to one date, region and service
///
/// Lives only for the duration of a verification; the derived key is
/// dropped with it.
#[derive(Debug, Clone, Copy)]
pub struct SigningContext<'a> {
    pub secret_key: &'a str,
    pub region: &'a str,
    pub scope_date: &'a str,
    pub service: &'a str,
}

impl<'a> SigningContext<'a> {
    /// Create a context for the default `s3` service
    pub const fn new(secret_key: &'a str, region: &'a str, scope_date: &'a str) -> Self {
        Self {
            secret_key,
            region,
            scope_date,
            service: DEFAULT_SERVICE,
        }
    }

    /// Override the service used for key derivation
    #[must_use]
    pub const fn with_service(mut self, service: &'a str) -> Self {
        self.service = service;
        self
    }

    /// Derive the signing key
    pub fn signing_key(&self) -> Vec<u8> {
        derive_signing_key(self.secret_key, self.region, self.scope_date, self.service)
    }

    /// Sign a string to sign
    pub fn sign(&self, string_to_sign: &str) -> String {
        calculate_signature(&self.signing_key(), string_to_sign)
    }
}

/// `access/date/region/service/aws4_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialScope {
    pub access_key: String,
    pub date: String,
    pub region: String,
    pub service: String,
}

impl CredentialScope {
    /// Parse a `Credential=` / `X-Amz-Credential` value
    pub fn parse(credential: &str) -> Result<Self, AuthError> {
        let parts: Vec<&str> = credential.split('/').collect();
        let [access_key, date, region, service, terminator] = parts.as_slice() else {
            return Err(AuthError::malformed(format!(
                "credential must have 5 components, got {}",
                parts.len()
            )));
        };

        if access_key.is_empty() {
            return Err(AuthError::malformed("credential has an empty access key"));
        }
        if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AuthError::malformed(format!("invalid scope date: {date}")));
        }
        if region.is_empty() || service.is_empty() {
            return Err(AuthError::malformed("credential has an empty region or service"));
        }
        if *terminator != SCOPE_TERMINATOR {
            return Err(AuthError::malformed(format!(
                "credential must end with {SCOPE_TERMINATOR}"
            )));
        }

        Ok(Self {
            access_key: (*access_key).to_string(),
            date: (*date).to_string(),
            region: (*region).to_string(),
            service: (*service).to_string(),
        })
    }

    /// The scope string without the access key
    pub fn scope(&self) -> String {
        format!(
            "{}/{}/{}/{SCOPE_TERMINATOR}",
            self.date, self.region, self.service
        )
    }

    /// Check the scope date against the request timestamp
    pub fn validate_timestamp(&self, timestamp: &str) -> Result<(), AuthError> {
        if timestamp.get(..8) != Some(self.date.as_str()) {
            return Err(AuthError::malformed(format!(
                "scope date {} does not match request date {timestamp}",
                self.date
            )));
        }
        Ok(())
    }
}

/// Parsed `Authorization: AWS4-HMAC-SHA256 ...` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V4AuthHeader {
    pub credential: CredentialScope,
    pub signed_headers: Vec<String>,
    pub signature: String,
}

/// Parse a V4 `Authorization` header
///
/// Format: `AWS4-HMAC-SHA256 Credential=AKID/date/region/service/aws4_request,
/// SignedHeaders=host;x-amz-date, Signature=xxx`
pub fn parse_authorization_header(header: &str) -> Result<V4AuthHeader, AuthError> {
    let Some(params) = header.strip_prefix(ALGORITHM) else {
        return Err(AuthError::invalid_argument(
            "authorization header does not use AWS4-HMAC-SHA256",
        ));
    };

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;
    for captures in AUTH_PARAM.captures_iter(params) {
        let value = captures.get(2).map_or("", |m| m.as_str());
        match captures.get(1).map_or("", |m| m.as_str()) {
            "Credential" => credential = Some(value),
            "SignedHeaders" => signed_headers = Some(value),
            "Signature" => signature = Some(value),
            _ => {}
        }
    }

    let credential = credential.ok_or_else(|| AuthError::malformed("missing Credential"))?;
    let signed_headers =
        signed_headers.ok_or_else(|| AuthError::malformed("missing SignedHeaders"))?;
    let signature = signature.ok_or_else(|| AuthError::malformed("missing Signature"))?;

    Ok(V4AuthHeader {
        credential: CredentialScope::parse(credential)?,
        signed_headers: split_signed_headers(signed_headers),
        signature: signature.to_string(),
    })
}

/// Parse an ISO 8601 basic timestamp (`20130524T000000Z`)
pub fn parse_amz_date(timestamp: &str) -> Result<DateTime<Utc>, AuthError> {
    NaiveDateTime::parse_from_str(timestamp, AMZ_DATE_FORMAT)
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .map_err(|_| AuthError::invalid_argument(format!("invalid timestamp: {timestamp}")))
}

/// Format a timestamp in ISO 8601 basic format
pub fn format_amz_date(time: &DateTime<Utc>) -> String {
    time.format(AMZ_DATE_FORMAT).to_string()
}

/// Calculate HMAC-SHA256
pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Calculate SHA256 and return hex string
pub(crate) fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
