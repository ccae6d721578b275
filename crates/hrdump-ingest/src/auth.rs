//! OAuth2 access to the applicant-tracking API
//!
//! Tokens are obtained with the resource-owner password grant, persisted as
//! JSON after every acquisition or refresh, and refreshed transparently once
//! they expire.

use crate::config::Credentials;
use crate::error::{IngestError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Tokens are treated as expired this long before their actual expiry.
const EXPIRY_LEEWAY_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth2Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuth2Token {
    fn stamped(mut self, now: DateTime<Utc>) -> Self {
        if let Some(secs) = self.expires_in {
            self.expires_at = Some(now + ChronoDuration::seconds(secs));
        }
        self
    }

    /// Tokens without an expiry never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|at| at - ChronoDuration::seconds(EXPIRY_LEEWAY_SECS) <= now)
            .unwrap_or(false)
    }
}

/// Read a persisted token, ignoring missing or unreadable files.
pub fn load_token(path: &Path) -> Option<OAuth2Token> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(token) => Some(token),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable token file");
            None
        },
    }
}

/// Persist `token` to `path`, creating parent directories.
pub fn save_token(path: &Path, token: &OAuth2Token) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    debug!(path = %path.display(), "Updating persisted token");
    hrdump_common::snapshot::write_json(path, token)?;
    Ok(())
}

/// Holds the current token and renews it on demand
pub struct TokenManager {
    http: Client,
    token_url: String,
    credentials: Credentials,
    token_path: PathBuf,
    token: Mutex<OAuth2Token>,
}

impl TokenManager {
    /// Obtain a usable token.
    ///
    /// With `reuse`, an unexpired token persisted at `token_path` is used as
    /// is; otherwise a new token is always requested.
    pub async fn connect(
        http: Client,
        token_url: impl Into<String>,
        credentials: Credentials,
        token_path: impl Into<PathBuf>,
        reuse: bool,
    ) -> Result<Self> {
        let token_url = token_url.into();
        let token_path = token_path.into();

        let persisted = if reuse {
            load_token(&token_path).filter(|t| !t.is_expired(Utc::now()))
        } else {
            None
        };

        let token = match persisted {
            Some(token) => {
                info!(path = %token_path.display(), "Using token from file");
                token
            },
            None => {
                info!(url = %token_url, "Getting token");
                let token = password_grant(&http, &token_url, &credentials).await?;
                save_token(&token_path, &token)?;
                token
            },
        };

        Ok(Self {
            http,
            token_url,
            credentials,
            token_path,
            token: Mutex::new(token),
        })
    }

    /// Current access token, renewed first when expired.
    pub async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if token.is_expired(Utc::now()) {
            *token = self.renew(&token).await?;
            save_token(&self.token_path, &token)?;
        }
        Ok(token.access_token.clone())
    }

    async fn renew(&self, expired: &OAuth2Token) -> Result<OAuth2Token> {
        if let Some(ref refresh_token) = expired.refresh_token {
            debug!(url = %self.token_url, "Refreshing expired token");
            match refresh_grant(&self.http, &self.token_url, &self.credentials, refresh_token).await {
                Ok(token) => return Ok(token),
                Err(e) => warn!(error = %e, "Token refresh failed, requesting a new token"),
            }
        }
        password_grant(&self.http, &self.token_url, &self.credentials).await
    }
}

async fn password_grant(http: &Client, token_url: &str, credentials: &Credentials) -> Result<OAuth2Token> {
    let form = [
        ("grant_type", "password"),
        ("username", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
    ];
    request_token(http, token_url, credentials, &form).await
}

async fn refresh_grant(
    http: &Client,
    token_url: &str,
    credentials: &Credentials,
    refresh_token: &str,
) -> Result<OAuth2Token> {
    let form = [("grant_type", "refresh_token"), ("refresh_token", refresh_token)];
    request_token(http, token_url, credentials, &form).await
}

async fn request_token(
    http: &Client,
    token_url: &str,
    credentials: &Credentials,
    form: &[(&str, &str)],
) -> Result<OAuth2Token> {
    let response = http
        .post(token_url)
        .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
        .form(form)
        .send()
        .await
        .map_err(|e| IngestError::auth(format!("Failed to get token. Reason: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(IngestError::auth(format!(
            "Token endpoint answered {}. {}",
            status, body
        )));
    }

    let token: OAuth2Token = response
        .json()
        .await
        .map_err(|e| IngestError::auth(format!("Unreadable token response: {}", e)))?;
    Ok(token.stamped(Utc::now()))
}
