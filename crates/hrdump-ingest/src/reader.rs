//! Paginated collection reader
//!
//! Walks `offset`/`limit` pages of one endpoint until the API signals the end
//! of data. An empty page ends pagination; row-count fields are ignored since
//! not every endpoint sends them.
//!
//! Transient failures are retried under the reader's [`RetryPolicy`]. Other
//! fetch errors, and exhausted retries, never escape: the reader stops and
//! hands back whatever it accumulated, together with the error that stopped
//! it.

use crate::error::IngestError;
use crate::fetcher::RateLimitedFetcher;
use crate::page::PageResult;
use crate::retry::RetryPolicy;
use serde_json::Value;
use tracing::{debug, error, warn};

/// Items read from one endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// Items accumulated over one or more pages
    Items(Vec<Value>),
    /// The endpoint answered with a single, non-paginated value
    Single(Value),
}

impl Fetched {
    pub fn is_empty(&self) -> bool {
        matches!(self, Fetched::Items(items) if items.is_empty())
    }

    /// As a flat list of items; a single value becomes a one-item list.
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Fetched::Items(items) => items,
            Fetched::Single(value) => vec![value],
        }
    }

    /// As the value attached to an item by an extension.
    pub fn into_value(self) -> Value {
        match self {
            Fetched::Items(items) => Value::Array(items),
            Fetched::Single(value) => value,
        }
    }
}

/// Identical full pages in a row after which an endpoint is taken to ignore
/// `offset`.
pub const MAX_REPEATED_PAGES: usize = 3;

/// Outcome of [`PaginatedReader::read_collection`]
#[derive(Debug)]
pub struct ReadResult {
    pub data: Fetched,
    /// Pages successfully fetched and decoded
    pub pages: usize,
    /// Degraded-but-usable responses (missing collection key, repeated page)
    pub warnings: Vec<String>,
    /// Error that stopped pagination early, if any
    pub failure: Option<IngestError>,
}

impl ReadResult {
    /// Nothing was fetched because the very first page failed.
    pub fn failed_outright(&self) -> bool {
        self.failure.is_some() && self.pages == 0
    }
}

/// Reads `offset`/`limit`/`companyId`-paginated collections
pub struct PaginatedReader<'a> {
    fetcher: &'a RateLimitedFetcher,
    page_size: u32,
    company_id: Option<i64>,
    retry: RetryPolicy,
}

impl<'a> PaginatedReader<'a> {
    pub fn new(fetcher: &'a RateLimitedFetcher, page_size: u32) -> Self {
        Self {
            fetcher,
            page_size: page_size.max(1),
            company_id: None,
            retry: RetryPolicy::once(),
        }
    }

    /// Retry transient page failures under `retry`.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_company_id(mut self, company_id: i64) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn fetcher(&self) -> &RateLimitedFetcher {
        self.fetcher
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    fn params(&self, offset: u64) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("offset", offset.to_string()),
            ("limit", self.page_size.to_string()),
        ];
        if let Some(company_id) = self.company_id {
            params.push(("companyId", company_id.to_string()));
        }
        params
    }

    /// Read every page of `url`, extracting `collection_key` from mapping
    /// pages.
    ///
    /// * A bare array is the complete result.
    /// * A mapping without `collection_key` is returned as is.
    /// * A non-empty array under `collection_key` is accumulated and the next
    ///   page requested; an empty one ends the read.
    /// * Any other value under `collection_key` is returned as a single item.
    ///
    /// A page equal to the previous one ends the read when it is short, or
    /// after [`MAX_REPEATED_PAGES`] repeats of a full page; the repeated
    /// copies are dropped.
    pub async fn read_collection(&self, url: &str, collection_key: &str) -> ReadResult {
        let mut items: Vec<Value> = Vec::new();
        let mut single: Option<Value> = None;
        let mut warnings = Vec::new();
        let mut failure = None;
        let mut pages = 0;
        let mut offset: u64 = 0;
        let mut last_page_len = 0;
        let mut repeats = 0;

        loop {
            let params = self.params(offset);
            let page = match self.fetcher.fetch_with_retry(url, &params, &self.retry).await {
                Ok(page) => page,
                Err(e) => {
                    error!(url = %url, offset, error = %e, "Failed to fetch page");
                    failure = Some(e);
                    break;
                },
            };
            pages += 1;

            match page {
                PageResult::Sequence(list) => {
                    items.extend(list);
                    break;
                },
                PageResult::Mapping(mut map) => match map.remove(collection_key) {
                    None => {
                        let shape = IngestError::Shape {
                            url: url.to_string(),
                            key: collection_key.to_string(),
                        };
                        warn!(error = %shape, "Returning page as is");
                        warnings.push(shape.to_string());
                        single = Some(Value::Object(map));
                        break;
                    },
                    Some(Value::Array(list)) => {
                        if list.is_empty() {
                            break;
                        }
                        // Endpoints that ignore offset return the same page forever.
                        let repeated = list.len() == last_page_len && items[items.len() - last_page_len..] == list[..];
                        if repeated {
                            repeats += 1;
                            let short = list.len() < self.page_size as usize;
                            if short || repeats >= MAX_REPEATED_PAGES {
                                items.truncate(items.len() - (repeats - 1) * list.len());
                                let message =
                                    format!("{} ignores offset, page at {} repeats the previous one", url, offset);
                                warn!(url = %url, offset, repeats, "Page repeats the previous one, stopping");
                                warnings.push(message);
                                break;
                            }
                        } else {
                            repeats = 0;
                        }
                        last_page_len = list.len();
                        items.extend(list);
                        offset += u64::from(self.page_size);
                        debug!(url = %url, offset, total = items.len(), "Requesting next page");
                    },
                    Some(other) => {
                        single = Some(other);
                        break;
                    },
                },
                PageResult::Scalar(value) => {
                    single = Some(value);
                    break;
                },
            }
        }

        let data = match single {
            Some(value) if items.is_empty() => Fetched::Single(value),
            Some(value) => {
                items.push(value);
                Fetched::Items(items)
            },
            None => Fetched::Items(items),
        };

        ReadResult {
            data,
            pages,
            warnings,
            failure,
        }
    }
}
