//! Sigil request authentication
//!
//! This crate provides:
//! - AWS Signature V4 and V2 canonicalization and signing
//! - Request-level verification (header, presigned query, streaming chunks)
//! - A credential index built from static configuration
//! - Pluggable credential backends and an ordered backend chain
//!
//! # Example
//!
//! ```rust,ignore
//! use sigil_auth::{BackendChain, CredentialConfig, InMemoryBackend, RequestVerifier};
//! use std::sync::Arc;
//!
//! let config = CredentialConfig::from_file("authdata.json")?;
//! let chain = BackendChain::new(vec![Arc::new(InMemoryBackend::new(Some(&config)))])?;
//! let verifier = RequestVerifier::new(Arc::new(chain), Default::default());
//!
//! // let outcome = verifier.authenticate(&AuthRequest::from_http(&request)).await?;
//! ```

// Signing primitives
pub mod canonical;
pub mod encoding;
pub mod error;
pub mod sigv2;
pub mod sigv4;
pub mod streaming;

// Credentials and backends
pub mod backend;
pub mod backends;
pub mod chain;
pub mod config;
pub mod index;

// Request handling
pub mod presign;
pub mod request;
pub mod verifier;

// Re-export core types
pub use canonical::{CanonicalRequestInput, build_canonical_request};
pub use encoding::uri_encode;
pub use error::AuthError;
pub use sigv2::SignatureAlgorithm;
pub use sigv4::{SigningContext, derive_signing_key};

// Re-export backend types
pub use backend::{
    Backend, BaseBackend, HealthReport, HealthStatus, Identity, NOT_FOUND, PolicyDecision,
    RequestContext, VerifyOptions,
};
pub use backends::InMemoryBackend;
pub use chain::BackendChain;
pub use config::{ConfigIssue, CredentialConfig, KeyPair, VerifierConfig};
pub use index::{CredentialIndex, CredentialRecord};

// Re-export request types
pub use presign::V4Signer;
pub use request::{AuthRequest, AuthScheme};
pub use streaming::{ChunkVerifier, StreamingParams};
pub use verifier::{AuthParams, Authentication, RequestVerifier};
