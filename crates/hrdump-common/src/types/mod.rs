//! Common types used across hrdump

use crate::error::HrdumpError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hash algorithm used to anonymize sensitive values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
    Md5,
}

impl HashAlgorithm {
    /// Resolve an algorithm name, falling back to [`HashAlgorithm::default`]
    /// with a warning when the name is not recognized.
    pub fn from_name_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(
                algorithm = %name,
                fallback = %HashAlgorithm::default(),
                "Invalid hash type, falling back to default"
            );
            HashAlgorithm::default()
        })
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = HrdumpError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha1" | "sha-1" => Ok(HashAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(HashAlgorithm::Sha512),
            "md5" => Ok(HashAlgorithm::Md5),
            _ => Err(HrdumpError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Sha1 => write!(f, "sha1"),
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::Sha512 => write!(f, "sha512"),
            HashAlgorithm::Md5 => write!(f, "md5"),
        }
    }
}
