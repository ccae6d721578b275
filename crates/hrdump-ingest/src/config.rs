//! Export configuration
//!
//! Loaded once from a JSON file at startup and passed by reference to every
//! component. Field names follow the upstream credential file (`companyId`,
//! `filters.limit`, ...); everything added on top has a default.

use crate::endpoints::Step;
use crate::error::{IngestError, Result};
use crate::retry::{Backoff, RetryPolicy};
use hrdump_common::anonymize::{Anonymizer, DEFAULT_EMAIL_KEYS, DEFAULT_HASH_KEYS};
use hrdump_common::types::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Config file used when neither `--config` nor `HRDUMP_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "creds/config.json";

/// Base URL of the applicant-tracking API.
pub const DEFAULT_ATS_API_URL: &str = "https://api.erecruiter.pl/v1.1/";

/// OAuth2 token endpoint of the applicant-tracking API.
pub const DEFAULT_TOKEN_URL: &str = "https://authorization-api.erecruiter.pl/oAuth/Token";

/// Base URL of the assessment API.
pub const DEFAULT_CODILITY_API_URL: &str = "https://codility.com/api/";

/// Where the OAuth2 token is persisted between runs.
pub const DEFAULT_TOKEN_PATH: &str = "creds/token.json";

/// Directory receiving snapshots.
pub const DEFAULT_OUTPUT_DIR: &str = "./db_dump.d";

/// Page size when neither `filters.limit` nor `limit` is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Request timeout for both upstream APIs.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// A budget of `calls` requests per `period_ms` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub calls: NonZeroU32,
    pub period_ms: u64,
}

impl RateLimitConfig {
    pub fn new(calls: NonZeroU32, period: Duration) -> Self {
        Self {
            calls,
            period_ms: period.as_millis() as u64,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Per-API rate limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    #[serde(default = "default_ats_rate_limit")]
    pub ats: RateLimitConfig,
    #[serde(default = "default_codility_rate_limit")]
    pub codility: RateLimitConfig,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            ats: default_ats_rate_limit(),
            codility: default_codility_rate_limit(),
        }
    }
}

fn default_ats_rate_limit() -> RateLimitConfig {
    RateLimitConfig::new(NonZeroU32::MIN, Duration::from_millis(100))
}

fn default_codility_rate_limit() -> RateLimitConfig {
    RateLimitConfig::new(NonZeroU32::MIN, Duration::from_secs(10))
}

/// Retry settings for assessment-API detail fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    #[serde(default)]
    pub exponential: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
            exponential: false,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        let delay = Duration::from_secs(self.backoff_secs);
        let backoff = if self.exponential {
            Backoff::Exponential { base: delay }
        } else {
            Backoff::Fixed(delay)
        };
        RetryPolicy::new(self.max_attempts, backoff)
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_secs() -> u64 {
    600
}

/// Nested `filters` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default)]
    pub limit: Option<u32>,
}

/// OAuth2 resource-owner credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

/// Complete export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    /// Company whose data is exported
    #[serde(default, rename = "companyId", alias = "company_id")]
    pub company_id: Option<i64>,

    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub filters: Filters,

    /// DEBUG instead of INFO logging
    #[serde(default = "default_true")]
    pub debug: bool,
    /// Wire-level HTTP tracing
    #[serde(default)]
    pub http_debug: bool,

    /// Bearer token for the assessment API
    #[serde(default)]
    pub codility_token: Option<String>,

    #[serde(default = "default_ats_api_url")]
    pub ats_api_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_codility_api_url")]
    pub codility_api_url: String,

    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    /// Reuse a persisted, unexpired token instead of acquiring a new one
    #[serde(default)]
    pub reuse_token: bool,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub rate_limits: RateLimits,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Anonymize the snapshot before writing it when set
    #[serde(default)]
    pub hash_salt: Option<String>,
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,
    #[serde(default = "default_hash_keys")]
    pub hash_keys: Vec<String>,
    #[serde(default = "default_email_keys")]
    pub email_keys: Vec<String>,

    /// Replaces the built-in endpoint schedule
    #[serde(default)]
    pub endpoints: Option<Vec<Step>>,
}

fn default_true() -> bool {
    true
}

fn default_ats_api_url() -> String {
    DEFAULT_ATS_API_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_codility_api_url() -> String {
    DEFAULT_CODILITY_API_URL.to_string()
}

fn default_token_path() -> PathBuf {
    PathBuf::from(DEFAULT_TOKEN_PATH)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_hash_algorithm() -> String {
    HashAlgorithm::default().to_string()
}

fn default_hash_keys() -> Vec<String> {
    DEFAULT_HASH_KEYS.iter().map(|k| k.to_string()).collect()
}

fn default_email_keys() -> Vec<String> {
    DEFAULT_EMAIL_KEYS.iter().map(|k| k.to_string()).collect()
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            company_id: None,
            limit: None,
            filters: Filters::default(),
            debug: true,
            http_debug: false,
            codility_token: None,
            ats_api_url: default_ats_api_url(),
            token_url: default_token_url(),
            codility_api_url: default_codility_api_url(),
            token_path: default_token_path(),
            reuse_token: false,
            output_dir: default_output_dir(),
            rate_limits: RateLimits::default(),
            retry: RetryConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            hash_salt: None,
            hash_algorithm: default_hash_algorithm(),
            hash_keys: default_hash_keys(),
            email_keys: default_email_keys(),
            endpoints: None,
        }
    }
}

impl DumpConfig {
    /// Resolve the config path: explicit argument, then `HRDUMP_CONFIG`,
    /// then [`DEFAULT_CONFIG_PATH`].
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        dotenvy::dotenv().ok();
        explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("HRDUMP_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "About to open config file");
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::config(format!("Failed to load config {}. {}", path.display(), e))
        })?;
        Self::from_json(&content)
            .map_err(|e| IngestError::config(format!("{} in {}", e, path.display())))
    }

    /// Parse configuration from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| IngestError::config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that hold regardless of which sources are exported
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("ats_api_url", &self.ats_api_url),
            ("token_url", &self.token_url),
            ("codility_api_url", &self.codility_api_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| IngestError::config(format!("{} '{}' is not a URL: {}", name, value, e)))?;
        }

        if self.filters.limit.or(self.limit) == Some(0) {
            return Err(IngestError::config("limit must be greater than 0"));
        }

        if self.retry.max_attempts == 0 {
            return Err(IngestError::config("retry.max_attempts must be greater than 0"));
        }

        if self.rate_limits.ats.period_ms == 0 || self.rate_limits.codility.period_ms == 0 {
            return Err(IngestError::config("rate limit periods must be greater than 0"));
        }

        Ok(())
    }

    /// Page size: `filters.limit`, then `limit`, then [`DEFAULT_PAGE_SIZE`].
    pub fn page_size(&self) -> u32 {
        match self.filters.limit.or(self.limit) {
            Some(limit) => limit,
            None => {
                warn!(default = DEFAULT_PAGE_SIZE, "Limit not specified in config, using default");
                DEFAULT_PAGE_SIZE
            },
        }
    }

    /// OAuth2 credentials, all four of which are required for the ATS API.
    pub fn credentials(&self) -> Result<Credentials> {
        let field = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| IngestError::config(format!("Missing required field '{}'", name)))
        };

        Ok(Credentials {
            client_id: field(&self.client_id, "client_id")?,
            client_secret: field(&self.client_secret, "client_secret")?,
            username: field(&self.username, "username")?,
            password: field(&self.password, "password")?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::from_name_or_default(&self.hash_algorithm)
    }

    /// Anonymizer for the configured keys, algorithm and `salt`.
    pub fn anonymizer(&self, salt: Option<String>) -> Anonymizer {
        Anonymizer::new(self.hash_algorithm(), salt)
            .with_hash_keys(self.hash_keys.iter().cloned())
            .with_email_keys(self.email_keys.iter().cloned())
    }
}
