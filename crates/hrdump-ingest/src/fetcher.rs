//! Rate-limited HTTP GET
//!
//! Every upstream API gets its own [`RateLimitedFetcher`] and therefore its
//! own budget. Requests that arrive early wait for the limiter instead of
//! failing.

use crate::auth::TokenManager;
use crate::config::RateLimitConfig;
use crate::error::{IngestError, Result};
use crate::page::PageResult;
use crate::retry::RetryPolicy;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// How requests are authorized
pub enum Authorization {
    None,
    /// Static bearer token (assessment API)
    Bearer(String),
    /// OAuth2 token renewed on expiry (ATS API)
    OAuth2(TokenManager),
}

impl Authorization {
    async fn header(&self) -> Result<Option<String>> {
        Ok(match self {
            Authorization::None => None,
            Authorization::Bearer(token) => Some(format!("Bearer {}", token)),
            Authorization::OAuth2(manager) => Some(format!("Bearer {}", manager.access_token().await?)),
        })
    }
}

/// Builder for [`RateLimitedFetcher`]
pub struct FetcherBuilder {
    name: String,
    base_url: String,
    rate_limit: Option<RateLimitConfig>,
    authorization: Authorization,
    timeout: Duration,
    verbose: bool,
    client: Option<Client>,
}

impl FetcherBuilder {
    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = authorization;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Log connection-level reads and writes (`http_debug`).
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Reuse an existing client instead of building one.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<RateLimitedFetcher> {
        let mut base = self.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| IngestError::config(format!("Invalid base URL '{}': {}", base, e)))?;

        let quota = match self.rate_limit {
            Some(limit) => Quota::with_period(limit.period() / limit.calls.get())
                .ok_or_else(|| {
                    IngestError::config(format!("Rate limit period for {} must be positive", self.name))
                })?
                .allow_burst(limit.calls),
            // Effectively unlimited
            None => Quota::per_second(std::num::NonZeroU32::MAX),
        };

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout)
                .connection_verbose(self.verbose)
                .build()?,
        };

        Ok(RateLimitedFetcher {
            name: self.name,
            client,
            base_url,
            limiter: RateLimiter::direct(quota),
            authorization: self.authorization,
        })
    }
}

/// HTTP GET behind a per-API rate limiter
pub struct RateLimitedFetcher {
    name: String,
    client: Client,
    base_url: Url,
    limiter: DefaultDirectRateLimiter,
    authorization: Authorization,
}

impl RateLimitedFetcher {
    pub fn builder(name: impl Into<String>, base_url: impl Into<String>) -> FetcherBuilder {
        FetcherBuilder {
            name: name.into(),
            base_url: base_url.into(),
            rate_limit: None,
            authorization: Authorization::None,
            timeout: Duration::from_secs(crate::config::DEFAULT_REQUEST_TIMEOUT_SECS),
            verbose: false,
            client: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Absolute URL of an endpoint path relative to the API base.
    pub fn url_for(&self, path: &str) -> Result<String> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map(String::from)
            .map_err(|e| IngestError::config(format!("Invalid endpoint path '{}': {}", path, e)))
    }

    /// GET `url` with query `params` and decode the JSON body.
    ///
    /// Waits for the rate limiter first. Non-success statuses become
    /// [`IngestError::Http`], unparseable bodies [`IngestError::Decode`].
    pub async fn fetch(&self, url: &str, params: &[(&str, String)]) -> Result<PageResult> {
        self.limiter.until_ready().await;

        debug!(api = %self.name, url = %url, ?params, "About to get resource");
        let start = Instant::now();

        let mut request = self
            .client
            .get(url)
            .header(CONTENT_TYPE, "application/json");
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(value) = self.authorization.header().await? {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(
            api = %self.name,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request finished"
        );

        if !status.is_success() {
            return Err(IngestError::Http {
                url: url.to_string(),
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        PageResult::decode(url, &body)
    }

    /// [`fetch`](Self::fetch) under a bounded retry policy.
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        params: &[(&str, String)],
        policy: &RetryPolicy,
    ) -> Result<PageResult> {
        policy.run(url, || self.fetch(url, params)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    #[test]
    fn test_url_for_joins_relative_paths() {
        let fetcher = RateLimitedFetcher::builder("ats", "https://api.example.com/v1.1")
            .build()
            .unwrap();

        assert_eq!(fetcher.base_url(), "https://api.example.com/v1.1/");
        assert_eq!(
            fetcher.url_for("candidates/1/Educations").unwrap(),
            "https://api.example.com/v1.1/candidates/1/Educations"
        );
        assert_eq!(
            fetcher.url_for("/Account/Tags").unwrap(),
            "https://api.example.com/v1.1/Account/Tags"
        );
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let result = RateLimitedFetcher::builder("ats", "not a url").build();
        assert!(matches!(result, Err(IngestError::Config(_))));
    }

    #[test]
    fn test_zero_period_is_rejected() {
        let result = RateLimitedFetcher::builder("codility", "https://codility.example.com/api/")
            .rate_limit(RateLimitConfig::new(NonZeroU32::MIN, Duration::ZERO))
            .build();
        assert!(matches!(result, Err(IngestError::Config(_))));
    }

    #[tokio::test]
    async fn test_limiter_spaces_calls() {
        let fetcher = RateLimitedFetcher::builder("ats", "https://api.example.com/")
            .rate_limit(RateLimitConfig::new(NonZeroU32::MIN, Duration::from_millis(50)))
            .build()
            .unwrap();

        let start = Instant::now();
        for _ in 0..3 {
            fetcher.limiter.until_ready().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
