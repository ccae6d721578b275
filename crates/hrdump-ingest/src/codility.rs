//! Assessment API collector
//!
//! Lists `tests` and `sessions` by following `next` links, then fetches the
//! detail record behind every listed `url`. Detail fetches run under the
//! configured [`RetryPolicy`]; an item whose retries are exhausted is logged
//! and left out.

use crate::error::{IngestError, Result};
use crate::fetcher::RateLimitedFetcher;
use crate::page::PageResult;
use crate::retry::RetryPolicy;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// Collections exported from the assessment API, in export order.
pub const CODILITY_COLLECTIONS: [&str; 2] = ["tests", "sessions"];

/// Document key of the assessment sub-document.
pub const CODILITY_SECTION: &str = "codility";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodilityReport {
    pub listed: usize,
    pub fetched: usize,
    pub abandoned: usize,
    pub authorized: bool,
}

pub struct CodilityCollector<'a> {
    fetcher: &'a RateLimitedFetcher,
    retry: RetryPolicy,
}

impl<'a> CodilityCollector<'a> {
    pub fn new(fetcher: &'a RateLimitedFetcher, retry: RetryPolicy) -> Self {
        Self { fetcher, retry }
    }

    /// Collect every listed test and session with its details.
    ///
    /// Returns `{"tests": [...], "sessions": [...]}`, or an empty object when
    /// the API rejects the token.
    pub async fn collect(&self) -> (Value, CodilityReport) {
        let mut report = CodilityReport::default();
        let mut section = Map::new();

        for collection in CODILITY_COLLECTIONS {
            let listed = match self.list(collection).await {
                Ok(listed) => listed,
                Err(e) if !report.authorized => {
                    error!(error = %e, "Codility authorization failed");
                    return (Value::Object(Map::new()), report);
                },
                Err(e) => {
                    error!(collection, error = %e, "Codility listing rejected");
                    Vec::new()
                },
            };
            report.authorized = true;
            report.listed += listed.len();
            debug!(collection, count = listed.len(), "Listed Codility collection");

            let details = self.details(collection, &listed, &mut report).await;
            section.insert(collection.to_string(), Value::Array(details));
        }

        info!(
            listed = report.listed,
            fetched = report.fetched,
            abandoned = report.abandoned,
            "Collected Codility data"
        );
        (Value::Object(section), report)
    }

    /// Follow `next` links from `collection`, gathering `results`.
    ///
    /// Only a 401 is an error; other failures end the listing with what was
    /// gathered so far. A `next` link to an already visited page ends it too.
    pub async fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let mut listed = Vec::new();
        let mut url = self.fetcher.url_for(collection)?;
        let mut visited = BTreeSet::new();

        loop {
            visited.insert(url.clone());
            debug!(url = %url, "Processing listing page");
            let page = match self.fetcher.fetch_with_retry(&url, &[], &self.retry).await {
                Ok(page) => page,
                Err(e) if e.status() == Some(StatusCode::UNAUTHORIZED) => {
                    return Err(IngestError::auth(format!("{} rejected the token: {}", url, e)));
                },
                Err(e) => {
                    error!(url = %url, error = %e, "Listing stopped early");
                    break;
                },
            };

            let PageResult::Mapping(mut map) = page else {
                warn!(url = %url, "No results, listing is not an object");
                break;
            };
            match map.remove("results") {
                Some(Value::Array(results)) => listed.extend(results),
                _ => {
                    warn!(url = %url, "No results");
                    break;
                },
            }

            match map.remove("next") {
                Some(Value::String(next)) if !visited.contains(&next) => url = next,
                Some(Value::String(next)) => {
                    warn!(url = %url, next = %next, "Next page was already visited");
                    break;
                },
                _ => break,
            }
        }

        Ok(listed)
    }

    async fn details(&self, collection: &str, listed: &[Value], report: &mut CodilityReport) -> Vec<Value> {
        let mut details = Vec::with_capacity(listed.len());

        for entry in listed {
            let Some(url) = entry.get("url").and_then(Value::as_str) else {
                warn!(collection, "Listed entry has no url, skipping");
                report.abandoned += 1;
                continue;
            };

            match self.fetcher.fetch_with_retry(url, &[], &self.retry).await {
                Ok(page) => {
                    details.push(page.into_value());
                    report.fetched += 1;
                },
                Err(e) => {
                    error!(collection, url = %url, error = %e, "Abandoning entry");
                    report.abandoned += 1;
                },
            }
        }

        details
    }
}
