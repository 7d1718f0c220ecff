//! AWS Signature V2
//!
//! Legacy `HMAC(secret, string_to_sign)` signatures, still sent by some
//! clients. The digest is SHA-1 or SHA-256 depending on what the client
//! negotiated; the signature length tells them apart.
//! Reference: https://docs.aws.amazon.com/AmazonS3/latest/userguide/RESTAuthentication.html

use crate::error::AuthError;
use crate::request::AuthRequest;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Sub-resources that should be included in the canonical resource
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "cors",
    "delete",
    "lifecycle",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "replication",
    "requestPayment",
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
    "response-content-language",
    "response-content-type",
    "response-expires",
    "restore",
    "tagging",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

/// HMAC digest used for a V2 signature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    #[default]
    HmacSha1,
    HmacSha256,
}

impl SignatureAlgorithm {
    /// Infer the digest from a base64 signature
    ///
    /// SHA-1 signatures are 28 characters long, SHA-256 ones 44.
    pub fn from_signature(signature: &str) -> Result<Self, AuthError> {
        match signature.len() {
            28 => Ok(Self::HmacSha1),
            44 => Ok(Self::HmacSha256),
            len => Err(AuthError::invalid_argument(format!(
                "signature of length {len} matches no supported algorithm"
            ))),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HmacSha1 => f.write_str("sha1"),
            Self::HmacSha256 => f.write_str("sha256"),
        }
    }
}

/// Calculate the base64 signature of a string to sign
pub fn calculate_signature(
    secret_key: &str,
    string_to_sign: &str,
    algorithm: SignatureAlgorithm,
) -> String {
    let digest = match algorithm {
        SignatureAlgorithm::HmacSha1 => {
            let mut mac = HmacSha1::new_from_slice(secret_key.as_bytes())
                .expect("HMAC can take key of any size");
            mac.update(string_to_sign.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        SignatureAlgorithm::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
                .expect("HMAC can take key of any size");
            mac.update(string_to_sign.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
    };
    BASE64.encode(digest)
}

/// Build the V2 string to sign
///
/// ```text
/// METHOD\n
/// Content-MD5\n
/// Content-Type\n
/// Date (or Expires for query auth)\n
/// CanonicalizedAmzHeaders
/// CanonicalizedResource
/// ```
///
/// `presigned` selects query authentication: the date line is `Expires`
/// and `x-amz-*` query parameters count as headers.
pub fn build_string_to_sign(request: &AuthRequest, presigned: bool) -> String {
    let content_md5 = request
        .header("content-md5")
        .or_else(|| request.query_param("Content-MD5"))
        .unwrap_or("");
    let content_type = request
        .header("content-type")
        .or_else(|| request.query_param("Content-Type"))
        .unwrap_or("");

    // With x-amz-date the Date line is left empty
    let date = if presigned {
        request.query_param("Expires").unwrap_or("")
    } else if request.header("x-amz-date").is_some() {
        ""
    } else {
        request.header("date").unwrap_or("")
    };

    format!(
        "{}\n{}\n{}\n{}\n{}{}",
        request.method,
        content_md5,
        content_type,
        date,
        canonicalized_amz_headers(request, presigned),
        canonicalized_resource(request)
    )
}

/// Canonicalized `x-amz-*` headers
///
/// Presigned requests also carry them as query parameters, which then
/// override headers of the same name.
pub fn canonicalized_amz_headers(request: &AuthRequest, presigned: bool) -> String {
    let mut amz_headers: BTreeMap<&str, String> = BTreeMap::new();

    let query = request.query.iter().filter(|_| presigned);
    for (name, value) in request.headers.iter().chain(query) {
        if name.starts_with("x-amz-") {
            amz_headers.insert(
                name.as_str(),
                value.split_whitespace().collect::<Vec<_>>().join(" "),
            );
        }
    }

    amz_headers
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

/// Canonicalized resource: optional host bucket, wire path, sorted sub-resources
pub fn canonicalized_resource(request: &AuthRequest) -> String {
    let path = match request.wire_path() {
        "" => "/",
        path => path,
    };

    let mut resource = match &request.host_bucket {
        Some(bucket) => format!("/{bucket}{path}"),
        None => path.to_string(),
    };

    // BTreeMap iteration keeps sub-resources sorted
    let sub_resources: Vec<String> = request
        .query
        .iter()
        .filter(|(key, _)| SUB_RESOURCES.contains(&key.as_str()))
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{key}={value}")
            }
        })
        .collect();

    if !sub_resources.is_empty() {
        resource.push('?');
        resource.push_str(&sub_resources.join("&"));
    }

    resource
}
