//! Authentication error types
//!
//! Every operation in this crate fails with one of these named kinds so
//! callers can branch on semantics instead of matching strings.

use crate::backend::HealthReport;
use thiserror::Error;

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The access key is unknown to the backend that was asked
    #[error("the access key id you provided does not exist in our records")]
    InvalidAccessKeyId,

    /// The access key is known but the recomputed signature differs
    #[error("the request signature we calculated does not match the signature you provided")]
    SignatureDoesNotMatch,

    /// The backend does not support the requested operation
    #[error("the authorization mechanism you have provided is not supported")]
    AuthMethodNotImplemented,

    /// Aggregation failure; carries per-backend results for diagnostics
    #[error("internal error: {message}")]
    InternalError {
        message: String,
        reports: Vec<HealthReport>,
    },

    #[error("request is missing a required security header")]
    MissingSecurityHeader,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("authorization header is malformed: {0}")]
    AuthorizationHeaderMalformed(String),

    #[error("the difference between the request time and the server's time is too large")]
    RequestTimeTooSkewed,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("missing required signed header: {0}")]
    MissingSignedHeader(String),

    #[error("backend unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("invalid credential configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Create an internal error without per-backend reports
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            reports: Vec::new(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a malformed authorization header error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::AuthorizationHeaderMalformed(message.into())
    }

    /// Whether a chain may recover by asking the next backend
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidAccessKeyId
                | Self::SignatureDoesNotMatch
                | Self::AuthMethodNotImplemented
                | Self::ServiceUnavailable(_)
        )
    }

    /// Protocol error code for the request layer
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::AuthMethodNotImplemented => "AuthMethodNotImplemented",
            Self::MissingSecurityHeader => "MissingSecurityHeader",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::AuthorizationHeaderMalformed(_) => "AuthorizationHeaderMalformed",
            Self::RequestTimeTooSkewed => "RequestTimeTooSkewed",
            Self::AccessDenied(_) => "AccessDenied",
            Self::MissingSignedHeader(_) => "AccessDenied",
            Self::ServiceUnavailable(_) => "ServiceUnavailable",
            Self::InternalError { .. } | Self::InvalidConfig(_) => "InternalError",
        }
    }

    /// HTTP status code the request layer should answer with
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::MissingSecurityHeader
            | Self::InvalidArgument(_)
            | Self::AuthorizationHeaderMalformed(_) => 400,

            // 403 Forbidden
            Self::InvalidAccessKeyId
            | Self::SignatureDoesNotMatch
            | Self::RequestTimeTooSkewed
            | Self::AccessDenied(_)
            | Self::MissingSignedHeader(_) => 403,

            // 500 Internal Server Error
            Self::InternalError { .. } | Self::InvalidConfig(_) => 500,

            // 501 Not Implemented
            Self::AuthMethodNotImplemented => 501,

            // 503 Service Unavailable
            Self::ServiceUnavailable(_) => 503,
        }
    }
}
