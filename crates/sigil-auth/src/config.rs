//! Configuration types for sigil
//!
//! Credential configuration uses the JSON "authdata" layout:
//!
//! ```json
//! { "accounts": [ { "name": "Bart", "email": "bart@example.com",
//!   "arn": "arn:aws:iam::123456789012:root", "canonicalID": "79a5...",
//!   "shortid": "123456789012",
//!   "keys": [ { "access": "AKID", "secret": "SECRET" } ],
//!   "users": [ { "name": "Lisa", "email": "lisa@example.com", "keys": [] } ] } ] }
//! ```

use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Root credential configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Configured accounts
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// One account and its sub-users
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account display name
    pub name: String,
    /// Contact email, matched case-insensitively
    pub email: String,
    /// Account ARN
    pub arn: String,
    /// Canonical ID
    #[serde(rename = "canonicalID")]
    pub canonical_id: String,
    /// Short account ID
    pub shortid: String,
    /// Root key pairs
    #[serde(default)]
    pub keys: Vec<KeyPair>,
    /// Sub-users sharing the account's identity
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// A sub-user of an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// IAM display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Key pairs of the user
    #[serde(default)]
    pub keys: Vec<KeyPair>,
}

/// Access key / secret key pair
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    /// Access key ID
    pub access: String,
    /// Secret access key
    pub secret: String,
}

impl KeyPair {
    pub fn new(access: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            secret: secret.into(),
        }
    }
}

// Keep secrets out of Debug output
impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("access", &self.access)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A problem found while validating a credential configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigIssue {
    /// The same access key is declared more than once
    DuplicateAccessKey { access: String },
    /// Two accounts share a canonical ID
    DuplicateCanonicalId { canonical_id: String },
    /// A key pair with an empty access or secret key
    EmptyKeyMaterial { owner: String },
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateAccessKey { access } => write!(f, "duplicate access key {access}"),
            Self::DuplicateCanonicalId { canonical_id } => {
                write!(f, "duplicate canonical id {canonical_id}")
            }
            Self::EmptyKeyMaterial { owner } => write!(f, "empty key material for {owner}"),
        }
    }
}

impl CredentialConfig {
    /// Parse a credential configuration from JSON
    pub fn from_json_str(json: &str) -> Result<Self, AuthError> {
        serde_json::from_str(json)
            .map_err(|e| AuthError::InvalidConfig(format!("failed to parse credentials: {e}")))
    }

    /// Load a credential configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AuthError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&contents)
    }

    /// Report duplicate keys, duplicate canonical IDs and empty key material
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut access_keys: HashMap<&str, usize> = HashMap::new();
        let mut canonical_ids: HashMap<&str, usize> = HashMap::new();

        for account in &self.accounts {
            *canonical_ids.entry(account.canonical_id.as_str()).or_default() += 1;

            let owners = std::iter::once((account.name.as_str(), &account.keys)).chain(
                account
                    .users
                    .iter()
                    .map(|user| (user.name.as_str(), &user.keys)),
            );
            for (owner, keys) in owners {
                for key in keys {
                    if key.access.is_empty() || key.secret.is_empty() {
                        issues.push(ConfigIssue::EmptyKeyMaterial {
                            owner: owner.to_string(),
                        });
                    }
                    *access_keys.entry(key.access.as_str()).or_default() += 1;
                }
            }
        }

        let mut duplicates: Vec<ConfigIssue> = access_keys
            .into_iter()
            .filter(|(access, count)| *count > 1 && !access.is_empty())
            .map(|(access, _)| ConfigIssue::DuplicateAccessKey {
                access: access.to_string(),
            })
            .chain(
                canonical_ids
                    .into_iter()
                    .filter(|(_, count)| *count > 1)
                    .map(|(id, _)| ConfigIssue::DuplicateCanonicalId {
                        canonical_id: id.to_string(),
                    }),
            )
            .collect();
        duplicates.sort_by_key(ToString::to_string);
        issues.extend(duplicates);
        issues
    }

    /// Total number of key pairs across accounts and users
    pub fn key_count(&self) -> usize {
        self.accounts
            .iter()
            .map(|a| a.keys.len() + a.users.iter().map(|u| u.keys.len()).sum::<usize>())
            .sum()
    }
}

/// Request verification settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Service used when a request does not name one
    pub service: String,
    /// Services accepted in a V4 credential scope
    pub allowed_services: Vec<String>,
    /// Accepted difference between request time and server time
    pub max_skew: Duration,
    /// Largest accepted presigned URL lifetime
    pub max_presign_expiry: Duration,
    /// Upper bound for a single backend call in a chain
    pub backend_timeout: Option<Duration>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            service: "s3".to_string(),
            allowed_services: ["s3", "iam", "ring", "sts"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            max_skew: Duration::from_secs(15 * 60),
            max_presign_expiry: Duration::from_secs(7 * 24 * 60 * 60),
            backend_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHDATA: &str = r#"{
        "accounts": [{
            "name": "Bart",
            "email": "sampleaccount1@sampling.com",
            "arn": "arn:aws:iam::123456789012:root",
            "canonicalID": "79a59df900b949e55d96a1e698fbacedfd6e09d98eacf8f8d5218e7cd47ef2be",
            "shortid": "123456789012",
            "keys": [{ "access": "accessKey1", "secret": "verySecretKey1" }],
            "users": [{
                "name": "Lisa",
                "email": "lisa@sampling.com",
                "keys": [{ "access": "userKey1", "secret": "userSecret1" }]
            }]
        }, {
            "name": "Clueso",
            "email": "inspector@sampling.com",
            "arn": "arn:aws:iam::123456789013:root",
            "canonicalID": "79a59df900b949e55d96a1e698fbacedfd6e09d98eacf8f8d5218e7cd47ef2bf",
            "shortid": "123456789013"
        }]
    }"#;

    #[test]
    fn test_parse_authdata() {
        let config = CredentialConfig::from_json_str(AUTHDATA).unwrap();
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts[0].users[0].name, "Lisa");
        assert!(config.accounts[1].keys.is_empty());
        assert!(config.accounts[1].users.is_empty());
        assert_eq!(config.key_count(), 2);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_errors_are_invalid_config() {
        assert!(matches!(
            CredentialConfig::from_json_str("{ not json"),
            Err(AuthError::InvalidConfig(_))
        ));
        assert!(matches!(
            CredentialConfig::from_file("/nonexistent/authdata.json"),
            Err(AuthError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authdata.json");
        std::fs::write(&path, AUTHDATA).unwrap();

        let config = CredentialConfig::from_file(&path).unwrap();
        assert_eq!(config.accounts[0].shortid, "123456789012");
    }

    #[test]
    fn test_empty_document_is_empty_config() {
        let config = CredentialConfig::from_json_str("{}").unwrap();
        assert!(config.accounts.is_empty());
    }

    #[test]
    fn test_validate_reports_issues() {
        let mut config = CredentialConfig::from_json_str(AUTHDATA).unwrap();
        config.accounts[1].canonical_id = config.accounts[0].canonical_id.clone();
        config.accounts[1]
            .keys
            .push(KeyPair::new("accessKey1", "another"));
        config.accounts[1].keys.push(KeyPair::new("emptySecret", ""));

        let issues = config.validate();
        assert!(issues.contains(&ConfigIssue::DuplicateAccessKey {
            access: "accessKey1".to_string()
        }));
        assert!(issues.iter().any(|i| matches!(i, ConfigIssue::DuplicateCanonicalId { .. })));
        assert!(issues.contains(&ConfigIssue::EmptyKeyMaterial {
            owner: "Clueso".to_string()
        }));
    }

    #[test]
    fn test_key_pair_debug_redacts_secret() {
        let debug = format!("{:?}", KeyPair::new("AKID", "hunter2"));
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_verifier_defaults() {
        let config = VerifierConfig::default();
        assert_eq!(config.service, "s3");
        assert!(config.allowed_services.iter().any(|s| s == "sts"));
        assert_eq!(config.max_skew, Duration::from_secs(900));
        assert_eq!(config.max_presign_expiry, Duration::from_secs(604_800));
        assert!(config.backend_timeout.is_none());
    }
}
