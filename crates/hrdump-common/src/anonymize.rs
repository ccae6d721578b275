//! Anonymization of personally identifying fields
//!
//! Walks an arbitrary JSON document and replaces the values of configured
//! sensitive keys with a (optionally salted) hex digest. Email-shaped keys are
//! additionally split into `email_login` / `email_domain` siblings before the
//! original value is hashed.
//!
//! # Example
//!
//! ```
//! use hrdump_common::anonymize::Anonymizer;
//! use hrdump_common::types::HashAlgorithm;
//! use serde_json::json;
//!
//! let mut doc = json!({"candidates": [{"email": "A@B.com"}]});
//! Anonymizer::new(HashAlgorithm::Sha1, Some("s".to_string())).apply(&mut doc);
//!
//! assert_eq!(doc["candidates"][0]["email_login"], "a");
//! assert_eq!(doc["candidates"][0]["email_domain"], "b.com");
//! ```

use crate::types::HashAlgorithm;
use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Keys whose values are hashed by default.
pub const DEFAULT_HASH_KEYS: &[&str] = &[
    "firstName",
    "lastName",
    "email",
    "candidateName",
    "candidateLastName",
    "candidateEmail",
    "candidatePhone",
    "candidatePhoneNumber",
    "createUserFullName",
    "createUserLastName",
    "candidateCvFiles",
    "first_name",
    "last_name",
    "profile_url",
];

/// Keys holding email addresses that are split into login and domain.
pub const DEFAULT_EMAIL_KEYS: &[&str] = &["email", "candidateEmail"];

/// Key receiving the part of an email address before the `@`.
pub const EMAIL_LOGIN_KEY: &str = "email_login";

/// Key receiving the part of an email address after the `@`.
pub const EMAIL_DOMAIN_KEY: &str = "email_domain";

/// Replacement for values under a hash key that cannot be stringified.
pub const UNHASHABLE_SENTINEL: &str = "None";

/// Compute the hex digest of `value` followed by `salt`.
pub fn hash_value(value: &[u8], algorithm: HashAlgorithm, salt: Option<&str>) -> String {
    let salt = salt.unwrap_or_default().as_bytes();
    match algorithm {
        HashAlgorithm::Sha1 => {
            let mut hasher = Sha1::new();
            hasher.update(value);
            hasher.update(salt);
            hex::encode(hasher.finalize())
        },
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(value);
            hasher.update(salt);
            hex::encode(hasher.finalize())
        },
        HashAlgorithm::Sha512 => {
            let mut hasher = Sha512::new();
            hasher.update(value);
            hasher.update(salt);
            hex::encode(hasher.finalize())
        },
        HashAlgorithm::Md5 => {
            let mut context = md5::Context::new();
            context.consume(value);
            context.consume(salt);
            format!("{:x}", context.compute())
        },
    }
}

/// Counters collected while anonymizing a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnonymizeStats {
    /// Values replaced by a digest
    pub hashed: usize,
    /// Values replaced by [`UNHASHABLE_SENTINEL`]
    pub unhashable: usize,
    /// Email values split into login and domain
    pub emails_split: usize,
}

/// Recursive hashing pass over a JSON document
#[derive(Debug, Clone)]
pub struct Anonymizer {
    hash_keys: BTreeSet<String>,
    email_keys: BTreeSet<String>,
    algorithm: HashAlgorithm,
    salt: Option<String>,
}

impl Anonymizer {
    /// Create an anonymizer using the default key sets
    pub fn new(algorithm: HashAlgorithm, salt: Option<String>) -> Self {
        Self {
            hash_keys: DEFAULT_HASH_KEYS.iter().map(|k| k.to_string()).collect(),
            email_keys: DEFAULT_EMAIL_KEYS.iter().map(|k| k.to_string()).collect(),
            algorithm,
            salt: salt.filter(|s| !s.is_empty()),
        }
    }

    /// Replace the set of keys whose values are hashed
    pub fn with_hash_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hash_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the set of keys treated as email addresses
    pub fn with_email_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.email_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash a single string the same way document values are hashed.
    pub fn hash_str(&self, value: &str) -> String {
        hash_value(
            value.to_lowercase().as_bytes(),
            self.algorithm,
            self.salt.as_deref(),
        )
    }

    /// Anonymize `document` in place.
    pub fn apply(&self, document: &mut Value) -> AnonymizeStats {
        let mut stats = AnonymizeStats::default();
        self.walk(document, &mut stats);
        debug!(
            hashed = stats.hashed,
            unhashable = stats.unhashable,
            emails_split = stats.emails_split,
            "Anonymization finished"
        );
        stats
    }

    fn walk(&self, value: &mut Value, stats: &mut AnonymizeStats) {
        match value {
            Value::Object(map) => {
                let split = map
                    .iter()
                    .filter(|(key, value)| self.email_keys.contains(*key) && is_truthy(value))
                    .filter_map(|(_, value)| scalar_to_string(value))
                    .filter_map(|email| split_email(&email))
                    .last();
                if let Some((login, domain)) = split {
                    map.insert(EMAIL_LOGIN_KEY.to_string(), Value::String(login));
                    map.insert(EMAIL_DOMAIN_KEY.to_string(), Value::String(domain));
                    stats.emails_split += 1;
                }

                for (key, child) in map.iter_mut() {
                    if !is_truthy(child) {
                        continue;
                    }
                    if self.hash_keys.contains(key) {
                        *child = Value::String(self.hash_json(key, child, stats));
                        continue;
                    }
                    self.walk(child, stats);
                }
            },
            Value::Array(items) => {
                for item in items {
                    self.walk(item, stats);
                }
            },
            _ => {},
        }
    }

    fn hash_json(&self, key: &str, value: &Value, stats: &mut AnonymizeStats) -> String {
        match scalar_to_string(value) {
            Some(text) => {
                stats.hashed += 1;
                self.hash_str(&text)
            },
            None => {
                warn!(key = %key, "Failed to hash non-scalar value, replacing with sentinel");
                stats.unhashable += 1;
                UNHASHABLE_SENTINEL.to_string()
            },
        }
    }
}

/// Hash the configured keys of `document` with the default email key set.
pub fn hash_sensitive_fields<I, S>(
    document: &mut Value,
    hash_keys: I,
    algorithm: HashAlgorithm,
    salt: Option<&str>,
) -> AnonymizeStats
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Anonymizer::new(algorithm, salt.map(str::to_string))
        .with_hash_keys(hash_keys)
        .apply(document)
}

/// Python-style truthiness: empty containers, zero, false and null are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn split_email(email: &str) -> Option<(String, String)> {
    let lowered = email.to_lowercase();
    lowered
        .split_once('@')
        .map(|(login, domain)| (login.to_string(), domain.to_string()))
}
