use std::fs;
use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use montage_engine::{
    MemorySessionStore, ResultPublisher, ServiceClient, SessionStore, TOKEN_KEY,
};

fn signed_in_client(base_url: &str) -> ServiceClient {
    let session = Arc::new(MemorySessionStore::new());
    session.set(TOKEN_KEY, "jwt-abc");
    ServiceClient::new(base_url, session).unwrap()
}

#[tokio::test]
async fn upload_failure_keeps_local_playable_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/video/merged"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let out_dir = TempDir::new().unwrap();
    let publisher = ResultPublisher::new(out_dir.path().to_path_buf());
    let client = signed_in_client(&server.uri());
    let bytes = Bytes::from_static(b"merged payload");

    let outcome = publisher.publish(1, &bytes, &client).await.expect("soft fail");

    assert!(!outcome.persisted);
    assert!(!outcome.playable_url.is_empty());
    assert_eq!(outcome.playable_url, outcome.local_path.display().to_string());
    assert_eq!(fs::read(&outcome.local_path).unwrap(), b"merged payload");
}

#[tokio::test]
async fn upload_success_yields_durable_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/video/merged"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "url": "https://cdn.example.com/merged/99.mp4"
        })))
        .mount(&server)
        .await;

    let out_dir = TempDir::new().unwrap();
    let publisher = ResultPublisher::new(out_dir.path().to_path_buf());
    let client = signed_in_client(&server.uri());
    let bytes = Bytes::from_static(b"merged payload");

    let outcome = publisher.publish(2, &bytes, &client).await.expect("publish ok");

    assert!(outcome.persisted);
    assert_eq!(outcome.playable_url, "https://cdn.example.com/merged/99.mp4");
    // The local fallback copy is written either way.
    assert!(outcome.local_path.exists());
}

#[tokio::test]
async fn missing_token_is_a_soft_failure_too() {
    let server = MockServer::start().await;
    let session = Arc::new(MemorySessionStore::new());
    let client = ServiceClient::new(server.uri(), session).unwrap();

    let out_dir = TempDir::new().unwrap();
    let publisher = ResultPublisher::new(out_dir.path().to_path_buf());
    let bytes = Bytes::from_static(b"merged payload");

    let outcome = publisher.publish(3, &bytes, &client).await.expect("soft fail");

    assert!(!outcome.persisted);
    assert!(outcome.local_path.exists());
    // Nothing was sent without a token.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unwritable_output_dir_is_a_hard_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let server = MockServer::start().await;
    let publisher = ResultPublisher::new(file_path);
    let client = signed_in_client(&server.uri());
    let bytes = Bytes::from_static(b"merged payload");

    assert!(publisher.publish(4, &bytes, &client).await.is_err());
}
