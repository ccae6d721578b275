//! Pagination tests for the collection reader

mod common;

use common::{mount_page, mount_status, unlimited_fetcher};
use hrdump_ingest::error::IngestError;
use hrdump_ingest::reader::{Fetched, PaginatedReader, MAX_REPEATED_PAGES};
use hrdump_ingest::retry::{Backoff, RetryPolicy};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_reads_pages_until_empty_page() {
    let server = MockServer::start().await;
    mount_page(&server, "/candidates", 0, json!({"candidates": [{"candidateId": 1}, {"candidateId": 2}]})).await;
    // A short page does not end pagination, only an empty one does.
    mount_page(&server, "/candidates", 2, json!({"candidates": [{"candidateId": 3}], "rowCount": 3})).await;
    mount_page(&server, "/candidates", 4, json!({"candidates": []})).await;

    let fetcher = unlimited_fetcher(&server);
    let reader = PaginatedReader::new(&fetcher, 2);
    let url = fetcher.url_for("candidates").unwrap();

    let result = reader.read_collection(&url, "candidates").await;

    assert!(result.failure.is_none());
    assert_eq!(result.pages, 3);
    assert_eq!(
        result.data,
        Fetched::Items(vec![
            json!({"candidateId": 1}),
            json!({"candidateId": 2}),
            json!({"candidateId": 3}),
        ])
    );
}

#[tokio::test]
async fn test_sends_offset_limit_and_company() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Account/Tags"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "100"))
        .and(query_param("companyId", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tags": []})))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = unlimited_fetcher(&server);
    let reader = PaginatedReader::new(&fetcher, 100).with_company_id(42);
    let url = fetcher.url_for("Account/Tags").unwrap();

    let result = reader.read_collection(&url, "tags").await;
    assert!(result.data.is_empty());
    assert!(result.failure.is_none());
}

#[tokio::test]
async fn test_bare_array_is_complete_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Dictionaries/Languages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("Dictionaries/Languages").unwrap();
    let result = PaginatedReader::new(&fetcher, 100).read_collection(&url, "languages").await;

    assert_eq!(result.pages, 1);
    assert_eq!(result.data.into_items().len(), 2);
}

#[tokio::test]
async fn test_missing_collection_key_returns_page_as_is() {
    let server = MockServer::start().await;
    mount_page(&server, "/candidates/1/DesiredSalary", 0, json!({"amount": 5000, "currency": "PLN"})).await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("candidates/1/DesiredSalary").unwrap();
    let result = PaginatedReader::new(&fetcher, 100).read_collection(&url, "desiredsalary").await;

    assert_eq!(result.data, Fetched::Single(json!({"amount": 5000, "currency": "PLN"})));
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("desiredsalary"));
}

#[tokio::test]
async fn test_nested_object_under_key_is_single_item() {
    let server = MockServer::start().await;
    mount_page(&server, "/candidates/1/JobWanted", 0, json!({"jobwanted": {"position": "Developer"}})).await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("candidates/1/JobWanted").unwrap();
    let result = PaginatedReader::new(&fetcher, 100).read_collection(&url, "jobwanted").await;

    assert_eq!(result.pages, 1);
    assert_eq!(result.data, Fetched::Single(json!({"position": "Developer"})));
}

#[tokio::test]
async fn test_failure_keeps_accumulated_items() {
    let server = MockServer::start().await;
    mount_page(&server, "/recruitments", 0, json!({"recruitments": [{"id": 1}]})).await;
    Mock::given(method("GET"))
        .and(path("/recruitments"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("recruitments").unwrap();
    let result = PaginatedReader::new(&fetcher, 100).read_collection(&url, "recruitments").await;

    assert_eq!(result.pages, 1);
    assert!(!result.failed_outright());
    assert!(matches!(result.failure, Some(IngestError::Http { .. })));
    assert_eq!(result.data, Fetched::Items(vec![json!({"id": 1})]));
}

#[tokio::test]
async fn test_first_page_failure_yields_nothing() {
    let server = MockServer::start().await;
    mount_status(&server, "/candidates", 404).await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("candidates").unwrap();
    let result = PaginatedReader::new(&fetcher, 100).read_collection(&url, "candidates").await;

    assert!(result.failed_outright());
    assert!(result.data.is_empty());
    assert_eq!(result.failure.and_then(|e| e.status()), Some(reqwest::StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn test_undecodable_page_is_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/candidates"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("candidates").unwrap();
    let result = PaginatedReader::new(&fetcher, 100).read_collection(&url, "candidates").await;

    assert!(matches!(result.failure, Some(IngestError::Decode { .. })));
}

#[tokio::test]
async fn test_endpoint_ignoring_offset_terminates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/candidates/1/Notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"notes": [{"text": "ok"}]})))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("candidates/1/Notes").unwrap();
    let result = PaginatedReader::new(&fetcher, 100).read_collection(&url, "notes").await;

    assert_eq!(result.data, Fetched::Items(vec![json!({"text": "ok"})]));
    assert_eq!(result.warnings.len(), 1);
}

fn immediate_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Backoff::Fixed(Duration::ZERO))
}

#[tokio::test]
async fn test_rate_limited_page_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/candidates"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/candidates", 0, json!({"candidates": [{"candidateId": 1}]})).await;
    mount_page(&server, "/candidates", 100, json!({"candidates": []})).await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("candidates").unwrap();
    let result = PaginatedReader::new(&fetcher, 100)
        .with_retry(immediate_retry(3))
        .read_collection(&url, "candidates")
        .await;

    assert!(result.failure.is_none());
    assert_eq!(result.pages, 2);
    assert_eq!(result.data, Fetched::Items(vec![json!({"candidateId": 1})]));
}

#[tokio::test]
async fn test_exhausted_retries_keep_accumulated_items() {
    let server = MockServer::start().await;
    mount_page(&server, "/candidates", 0, json!({"candidates": [{"candidateId": 1}]})).await;
    Mock::given(method("GET"))
        .and(path("/candidates"))
        .and(query_param("offset", "1"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("candidates").unwrap();
    let result = PaginatedReader::new(&fetcher, 1)
        .with_retry(immediate_retry(2))
        .read_collection(&url, "candidates")
        .await;

    assert!(matches!(result.failure, Some(IngestError::RetriesExhausted { attempts: 2, .. })));
    assert!(!result.failed_outright());
    assert_eq!(result.data, Fetched::Items(vec![json!({"candidateId": 1})]));
}

#[tokio::test]
async fn test_non_transient_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/candidates"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("candidates").unwrap();
    let result = PaginatedReader::new(&fetcher, 100)
        .with_retry(immediate_retry(5))
        .read_collection(&url, "candidates")
        .await;

    assert!(result.failed_outright());
    assert!(matches!(result.failure, Some(IngestError::Http { .. })));
}

#[tokio::test]
async fn test_identical_full_pages_are_kept() {
    let server = MockServer::start().await;
    let page = json!({"candidateLanguageSkills": [{"level": "B2"}, {"level": "B2"}]});
    mount_page(&server, "/skills", 0, page.clone()).await;
    mount_page(&server, "/skills", 2, page).await;
    mount_page(&server, "/skills", 4, json!({"candidateLanguageSkills": []})).await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("skills").unwrap();
    let result = PaginatedReader::new(&fetcher, 2)
        .read_collection(&url, "candidateLanguageSkills")
        .await;

    assert!(result.warnings.is_empty());
    assert_eq!(result.pages, 3);
    assert_eq!(result.data.into_items(), vec![json!({"level": "B2"}); 4]);
}

#[tokio::test]
async fn test_full_page_ignoring_offset_terminates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Account/Origins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"origins": [{"id": 5}]})))
        .expect(MAX_REPEATED_PAGES as u64 + 1)
        .mount(&server)
        .await;

    let fetcher = unlimited_fetcher(&server);
    let url = fetcher.url_for("Account/Origins").unwrap();
    let result = PaginatedReader::new(&fetcher, 1).read_collection(&url, "origins").await;

    assert_eq!(result.data, Fetched::Items(vec![json!({"id": 5})]));
    assert_eq!(result.warnings.len(), 1);
}
