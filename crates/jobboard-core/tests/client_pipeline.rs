//! Request/response pipeline tests against a mock backend.

mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use jobboard_core::models::{ApplicationStatus, NewApplication};
use jobboard_core::{ApiClient, ApiError, ApiEvent, ErrorCategory, MemoryStorage, SessionStore};
use mockito::Matcher;
use serde_json::{json, Value};

use common::{alice, test_config};

fn store_backed_client(base_url: &str) -> (SessionStore, ApiClient) {
    let store = SessionStore::new(Arc::new(MemoryStorage::new()));
    let client = ApiClient::new(&test_config(base_url), Arc::new(store.clone()))
        .expect("Failed to build client");
    (store, client)
}

// -------------------------------------------------------------------------
// Outgoing stage
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_saved_session_token_is_sent_as_bearer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/candidates/offers/")
        .match_header("authorization", "Bearer tok123")
        .match_header("content-type", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    let (store, client) = store_backed_client(&server.url());
    store.save(&alice()).unwrap();

    let offers = client.list_offers().await.unwrap();
    assert!(offers.is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_no_authorization_header_without_session() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/candidates/offers/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let (_, client) = store_backed_client(&server.url());
    client.list_offers().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_token_change_is_picked_up_per_request() {
    let mut server = mockito::Server::new_async().await;
    let anonymous = server
        .mock("GET", "/candidates/applications/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;
    let authenticated = server
        .mock("GET", "/candidates/applications/")
        .match_header("authorization", "Bearer tok123")
        .with_status(200)
        .with_body(r#"[{"id": 1, "jobTitle": "Frontend Developer", "status": "Pending"}]"#)
        .expect(1)
        .create_async()
        .await;

    let (store, client) = store_backed_client(&server.url());
    assert!(client.list_applications().await.unwrap().is_empty());

    store.save(&alice()).unwrap();
    let applications = client.list_applications().await.unwrap();
    assert_eq!(applications.len(), 1);
    assert_eq!(applications[0].status, ApplicationStatus::Pending);

    anonymous.assert_async().await;
    authenticated.assert_async().await;
}

// -------------------------------------------------------------------------
// Incoming stage
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_success_passes_payload_through() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({"id": 3, "title": "Data Scientist", "extra": [1, 2]});
    server
        .mock("GET", "/candidates/offers/3/")
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let (_, client) = store_backed_client(&server.url());
    let value: Value = client.get("/candidates/offers/3/").await.unwrap();
    assert_eq!(value, body);
}

#[tokio::test]
async fn test_unauthorized_emits_one_event_and_rejects() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/candidates/applications/")
        .with_status(401)
        .with_body(r#"{"detail": "Token expired"}"#)
        .expect(1)
        .create_async()
        .await;

    let (store, client) = store_backed_client(&server.url());
    store.save(&alice()).unwrap();
    let mut events = client.subscribe();

    let err = client.list_applications().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(ref body) if body.contains("Token expired")));
    assert_eq!(err.category(), ErrorCategory::Expired);

    assert_eq!(
        events.try_recv().unwrap(),
        ApiEvent::Unauthorized {
            path: "/candidates/applications/".to_string(),
            token: Some("tok123".to_string()),
        }
    );
    assert!(events.try_recv().is_err());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_not_found_is_propagated() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/candidates/offers/99/")
        .with_status(404)
        .with_body(r#"{"detail": "Not found."}"#)
        .expect(1)
        .create_async()
        .await;

    let (_, client) = store_backed_client(&server.url());
    let mut events = client.subscribe();

    let err = client.fetch_offer(99).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(ref body) if body.contains("Not found")));
    assert!(!err.is_retryable());
    assert!(events.try_recv().is_err());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_on_get_is_retried_then_propagated() {
    let mut server = mockito::Server::new_async().await;
    // One attempt plus two retries
    let mock = server
        .mock("GET", "/candidates/offers/")
        .with_status(503)
        .with_body("maintenance")
        .expect(3)
        .create_async()
        .await;

    let (_, client) = store_backed_client(&server.url());
    let err = client.list_offers().await.unwrap_err();
    assert!(matches!(err, ApiError::ServerError { .. }));
    assert_eq!(err.category(), ErrorCategory::Server);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_on_post_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/candidates/offers/")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let (_, client) = store_backed_client(&server.url());
    let result: Result<Value, ApiError> = client
        .post("/candidates/offers/", &json!({"title": "QA"}))
        .await;
    assert!(matches!(result, Err(ApiError::ServerError { .. })));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limited_post_is_retried() {
    let mut server = mockito::Server::new_async().await;
    let limited = server
        .mock("POST", "/candidates/offers/")
        .with_status(429)
        .expect(3)
        .create_async()
        .await;

    let (_, client) = store_backed_client(&server.url());
    let result: Result<Value, ApiError> = client
        .post("/candidates/offers/", &json!({"title": "QA"}))
        .await;
    // Every attempt is limited; the caller sees RateLimited after the retries
    assert!(matches!(result, Err(ApiError::RateLimited(_))));
    limited.assert_async().await;
}

#[tokio::test]
async fn test_validation_error_keeps_server_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("PUT", "/candidates/offers/1/")
        .with_status(400)
        .with_body(r#"{"title": ["This field is required."]}"#)
        .create_async()
        .await;

    let (_, client) = store_backed_client(&server.url());
    let err = client
        .put::<Value, _>("/candidates/offers/1/", &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert!(err.to_string().contains("This field is required."));
}

#[tokio::test]
async fn test_invalid_json_is_invalid_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/candidates/offers/")
        .with_status(200)
        .with_body("<html>oops</html>")
        .create_async()
        .await;

    let (_, client) = store_backed_client(&server.url());
    let err = client.list_offers().await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("DELETE", "/candidates/applications/5/")
        .match_header("authorization", "Bearer tok123")
        .with_status(204)
        .create_async()
        .await;

    let (store, client) = store_backed_client(&server.url());
    store.save(&alice()).unwrap();
    client.delete("/candidates/applications/5/").await.unwrap();
    mock.assert_async().await;
}

// -------------------------------------------------------------------------
// Transport failures
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let config = test_config(&format!("http://127.0.0.1:{}", port))
        .with_retries(0, Duration::from_millis(1));
    let store = SessionStore::new(Arc::new(MemoryStorage::new()));
    let client = ApiClient::new(&config, Arc::new(store)).unwrap();

    let err = client.list_offers().await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(err.category(), ErrorCategory::Network);
}

#[tokio::test]
async fn test_silent_server_times_out() {
    // Accepted by the kernel backlog, never answered
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = test_config(&format!("http://127.0.0.1:{}", port))
        .with_timeout(Duration::from_millis(300))
        .with_retries(0, Duration::from_millis(1));
    let store = SessionStore::new(Arc::new(MemoryStorage::new()));
    let client = ApiClient::new(&config, Arc::new(store)).unwrap();

    let err = client.list_offers().await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert_eq!(err.category(), ErrorCategory::Network);
    drop(listener);
}

// -------------------------------------------------------------------------
// Multipart upload
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_submit_application_uploads_cv() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/candidates/applications/")
        .match_header("authorization", "Bearer tok123")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=".to_string()),
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="cv_file"; filename="cv.pdf""#.to_string()),
            Matcher::Regex(r#"name="job""#.to_string()),
            Matcher::Regex("%PDF-1.4 fake".to_string()),
        ]))
        .with_status(201)
        .with_body(r#"{"id": 10, "job": 4, "status": "pending", "cover_letter": "Hello"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cv_path = dir.path().join("cv.pdf");
    std::fs::File::create(&cv_path)
        .unwrap()
        .write_all(b"%PDF-1.4 fake")
        .unwrap();

    let (store, client) = store_backed_client(&server.url());
    store.save(&alice()).unwrap();

    let created = client
        .submit_application(&NewApplication {
            job: 4,
            candidate: 1,
            cover_letter: "Hello".into(),
            cv_path,
        })
        .await
        .unwrap();
    assert_eq!(created.id, 10);
    assert_eq!(created.job, Some(4));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_submit_application_with_missing_cv_is_not_sent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/candidates/applications/")
        .expect(0)
        .create_async()
        .await;

    let (_, client) = store_backed_client(&server.url());
    let err = client
        .submit_application(&NewApplication {
            job: 4,
            candidate: 1,
            cover_letter: String::new(),
            cv_path: "/nonexistent/cv.pdf".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    mock.assert_async().await;
}
