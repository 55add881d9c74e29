use std::time::Duration;

use montage_engine::{ClipFetcher, FetchFailure, FetchSettings, ReqwestClipFetcher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetcher_returns_clip_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clips/a.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"clip-a".to_vec(), "video/mp4"))
        .mount(&server)
        .await;

    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let url = format!("{}/clips/a.mp4", server.uri());

    let clip = fetcher.fetch(&url).await.expect("fetch ok");
    assert_eq!(&clip.bytes[..], b"clip-a");
    assert_eq!(clip.byte_len, 6);
    assert!(clip.content_type.unwrap().starts_with("video/mp4"));
}

#[tokio::test]
async fn fetcher_accepts_missing_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clips/b.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"clip-b".to_vec()))
        .mount(&server)
        .await;

    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let url = format!("{}/clips/b.mp4", server.uri());

    let clip = fetcher.fetch(&url).await.expect("fetch ok");
    assert_eq!(&clip.bytes[..], b"clip-b");
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clips/missing.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let url = format!("{}/clips/missing.mp4", server.uri());

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(err.kind, FetchFailure::HttpStatus(404));
}

#[tokio::test]
async fn fetcher_rejects_unsupported_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clips/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let url = format!("{}/clips/page", server.uri());

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(
        err.kind,
        FetchFailure::UnsupportedContentType {
            content_type: "text/html".to_string(),
        }
    );
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clips/slow.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_raw(b"slow".to_vec(), "video/mp4"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestClipFetcher::new(settings);
    let url = format!("{}/clips/slow.mp4", server.uri());

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(err.kind, FetchFailure::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clips/huge.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "video/mp4")
                .insert_header("Content-Length", "11")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestClipFetcher::new(settings);
    let url = format!("{}/clips/huge.mp4", server.uri());

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(
        err.kind,
        FetchFailure::TooLarge {
            max_bytes: 10,
            actual: Some(11),
        }
    );
}

#[tokio::test]
async fn fetcher_rejects_invalid_url() {
    let fetcher = ReqwestClipFetcher::new(FetchSettings::default());
    let err = fetcher.fetch("not a url").await.unwrap_err();
    assert_eq!(err.kind, FetchFailure::InvalidUrl);
}
