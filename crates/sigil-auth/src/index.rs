//! In-memory credential index
//!
//! Built once from a [`CredentialConfig`] and never mutated afterwards.
//! Reloading configuration builds a new index; records handed out from an
//! older index stay valid because they are reference counted.

use crate::config::{CredentialConfig, KeyPair};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Identity behind one or more access keys
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialRecord {
    /// ARN of the owning account
    pub arn: String,
    /// Canonical ID of the owning account
    pub canonical_id: String,
    /// Short account ID
    pub shortid: String,
    /// Display name of the owning account
    pub account_display_name: String,
    /// Set when the record belongs to a sub-user
    pub iam_display_name: Option<String>,
    /// Contact email, lower-cased
    pub email: String,
    /// Key pairs belonging to this entity
    pub keys: Vec<KeyPair>,
}

impl CredentialRecord {
    /// Whether the record belongs to a sub-user rather than an account root
    pub const fn is_user(&self) -> bool {
        self.iam_display_name.is_some()
    }

    /// Secret paired with `access_key`, if this entity owns it
    pub fn secret_key(&self, access_key: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|key| key.access == access_key)
            .map(|key| key.secret.as_str())
    }
}

#[derive(Debug, Default)]
struct Table {
    by_access_key: HashMap<String, Arc<CredentialRecord>>,
    by_email: HashMap<String, Arc<CredentialRecord>>,
}

impl Table {
    fn insert(&mut self, record: &Arc<CredentialRecord>, kind: &str) {
        for key in &record.keys {
            if self
                .by_access_key
                .insert(key.access.clone(), Arc::clone(record))
                .is_some()
            {
                warn!(access_key = %key.access, kind, "Duplicate access key, last entry wins");
            }
        }
        if self
            .by_email
            .insert(record.email.clone(), Arc::clone(record))
            .is_some()
        {
            warn!(email = %record.email, kind, "Duplicate email, last entry wins");
        }
    }
}

/// Lookup tables over accounts and their sub-users
#[derive(Debug, Default)]
pub struct CredentialIndex {
    accounts: Table,
    users: Table,
    by_canonical_id: HashMap<String, Arc<CredentialRecord>>,
}

impl CredentialIndex {
    /// Build an index; absent configuration yields an empty index
    pub fn build(config: Option<&CredentialConfig>) -> Self {
        let mut index = Self::default();
        let Some(config) = config else {
            info!("No credential configuration, using an empty credential index");
            return index;
        };

        let mut user_count = 0usize;
        for account in &config.accounts {
            let record = Arc::new(CredentialRecord {
                arn: account.arn.clone(),
                canonical_id: account.canonical_id.clone(),
                shortid: account.shortid.clone(),
                account_display_name: account.name.clone(),
                iam_display_name: None,
                email: account.email.to_lowercase(),
                keys: account.keys.clone(),
            });
            index.accounts.insert(&record, "account");
            index
                .by_canonical_id
                .insert(account.canonical_id.clone(), Arc::clone(&record));

            for user in &account.users {
                let user_record = Arc::new(CredentialRecord {
                    arn: account.arn.clone(),
                    canonical_id: account.canonical_id.clone(),
                    shortid: account.shortid.clone(),
                    account_display_name: account.name.clone(),
                    iam_display_name: Some(user.name.clone()),
                    email: user.email.to_lowercase(),
                    keys: user.keys.clone(),
                });
                index.users.insert(&user_record, "user");
                user_count += 1;
            }
        }

        info!(
            accounts = config.accounts.len(),
            users = user_count,
            keys = index.key_count(),
            "Built credential index"
        );
        index
    }

    /// Look up the entity owning an access key (accounts first)
    pub fn by_access_key(&self, access_key: &str) -> Option<Arc<CredentialRecord>> {
        self.accounts
            .by_access_key
            .get(access_key)
            .or_else(|| self.users.by_access_key.get(access_key))
            .cloned()
    }

    /// Look up an account by canonical ID
    pub fn by_canonical_id(&self, canonical_id: &str) -> Option<Arc<CredentialRecord>> {
        self.by_canonical_id.get(canonical_id).cloned()
    }

    /// Look up an entity by email, case-insensitively (users first)
    pub fn by_email(&self, email: &str) -> Option<Arc<CredentialRecord>> {
        let email = email.to_lowercase();
        self.users
            .by_email
            .get(&email)
            .or_else(|| self.accounts.by_email.get(&email))
            .cloned()
    }

    /// Secret key for `access_key`, if it is known
    pub fn secret_key(&self, access_key: &str) -> Option<String> {
        self.by_access_key(access_key)
            .and_then(|record| record.secret_key(access_key).map(str::to_string))
    }

    /// Number of indexed access keys
    pub fn key_count(&self) -> usize {
        self.accounts.by_access_key.len() + self.users.by_access_key.len()
    }

    /// Whether the index holds no access keys
    pub fn is_empty(&self) -> bool {
        self.key_count() == 0
    }
}
