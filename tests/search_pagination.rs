//! End-to-end pagination: token acquisition, page walking, page persistence.

use serde_json::json;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tweetvault::auth::{self, AuthError};
use tweetvault::fetcher::RateLimitedFetcher;
use tweetvault::search::{SearchError, SearchJob};

fn fetcher_for(_server: &MockServer) -> RateLimitedFetcher {
    RateLimitedFetcher::new(reqwest::Client::new(), 100)
}

#[tokio::test]
async fn job_follows_next_token_and_writes_every_page() {
    let server = MockServer::start().await;

    // Continuation request first: wiremock picks the first matching mock in
    // mount order, and this one is more specific.
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("next_token", "t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [2], "meta": {}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "from:nasa"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [1], "meta": {"next_token": "t2"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let output = tempfile::tempdir().unwrap();
    let mut job = SearchJob::new(
        fetcher_for(&server),
        format!("{}/search", server.uri()),
        vec![("query".to_string(), "from:nasa".to_string())],
        "token123",
        output.path().to_path_buf(),
    )
    .unwrap();

    let pages = job.run().await.unwrap();
    assert_eq!(pages, 2);

    let page1: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output.path().join("data_file_1.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(page1, json!({"data": [1], "meta": {"next_token": "t2"}}));

    let page2: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output.path().join("data_file_2.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(page2, json!({"data": [2], "meta": {}}));
}

#[tokio::test]
async fn job_fails_on_application_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"title": "Unauthorized"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let output = tempfile::tempdir().unwrap();
    let mut job = SearchJob::new(
        fetcher_for(&server),
        format!("{}/search", server.uri()),
        Vec::new(),
        "token123",
        output.path().to_path_buf(),
    )
    .unwrap();

    match job.run().await {
        Err(SearchError::BadStatus { status, body }) => {
            assert_eq!(status, 403);
            assert!(body.contains("Unauthorized"));
        }
        other => panic!("expected BadStatus, got {:?}", other.map(|_| ())),
    }

    // Nothing was written for the failed page.
    assert!(!output.path().join("data_file_1.json").exists());
}

#[tokio::test]
async fn bearer_token_comes_from_client_credentials_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string("grant_type=client_credentials"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token_type": "bearer", "access_token": "AAAA"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let token = auth::get_bearer_token(
        &client,
        &format!("{}/oauth2/token", server.uri()),
        "key",
        "secret",
    )
    .await
    .unwrap();
    assert_eq!(token, "AAAA");
}

#[tokio::test]
async fn rejected_token_request_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let err = auth::get_bearer_token(
        &client,
        &format!("{}/oauth2/token", server.uri()),
        "key",
        "secret",
    )
    .await
    .unwrap_err();
    match err {
        AuthError::Rejected { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "Forbidden");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn token_response_without_access_token_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "bearer"})))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let err = auth::get_bearer_token(
        &client,
        &format!("{}/oauth2/token", server.uri()),
        "key",
        "secret",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AuthError::MissingToken));
}
