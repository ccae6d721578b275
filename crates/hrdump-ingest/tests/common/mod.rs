//! Shared helpers for integration tests against wiremock servers
//!
//! ```no_run
//! mod common;
//! use common::unlimited_fetcher;
//!
//! #[tokio::test]
//! async fn test_with_mock_api() {
//!     let server = wiremock::MockServer::start().await;
//!     let fetcher = unlimited_fetcher(&server);
//! }
//! ```

#![allow(dead_code)]

use hrdump_ingest::fetcher::RateLimitedFetcher;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fetcher against `server` without rate limiting.
pub fn unlimited_fetcher(server: &MockServer) -> RateLimitedFetcher {
    RateLimitedFetcher::builder("test", server.uri())
        .build()
        .expect("Failed to build fetcher")
}

/// Mount a page of `body` answering GET `route` at `offset`.
pub async fn mount_page(server: &MockServer, route: &str, offset: u64, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mount `items` under `key` at offset 0, followed by an empty page.
pub async fn mount_collection(server: &MockServer, route: &str, key: &str, items: Value, page_size: u64) {
    mount_page(server, route, 0, json!({ key: items })).await;
    mount_page(server, route, page_size, json!({ key: [] })).await;
}

/// Mount a failing status for GET `route`, any offset.
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string("upstream failure"))
        .mount(server)
        .await;
}
