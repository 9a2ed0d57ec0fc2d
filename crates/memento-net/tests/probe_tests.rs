//! Accessibility probe tests against a mock server.

use std::time::Duration;

use memento_net::http::HttpClient;
use memento_net::probe::{HttpProbe, UrlProbe};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_success_status_is_accessible() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let probe = HttpProbe::new(HttpClient::new());
    let result = probe
        .check(&format!("{}/video.mp4", mock_server.uri()))
        .await;

    assert!(result.tested);
    assert!(result.accessible);
    assert_eq!(result.http_status, Some(200));
    assert_eq!(result.error_message, None);
}

#[tokio::test]
async fn test_not_found_is_inaccessible() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/gone.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let probe = HttpProbe::default();
    let result = probe.check(&format!("{}/gone.mp4", mock_server.uri())).await;

    assert!(!result.accessible);
    assert_eq!(result.http_status, Some(404));
    assert_eq!(result.error_message.as_deref(), Some("HTTP 404"));
}

#[tokio::test]
async fn test_head_rejected_falls_back_to_ranged_get() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/song.mp3"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/song.mp3"))
        .and(header("range", "bytes=0-0"))
        .respond_with(ResponseTemplate::new(206))
        .expect(1)
        .mount(&mock_server)
        .await;

    let probe = HttpProbe::default();
    let result = probe.check(&format!("{}/song.mp3", mock_server.uri())).await;

    assert!(result.accessible);
    assert_eq!(result.http_status, Some(206));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/slow.mp4"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let probe = HttpProbe::default().with_timeout(Duration::from_millis(100));
    let result = probe.check(&format!("{}/slow.mp4", mock_server.uri())).await;

    assert!(result.tested);
    assert!(!result.accessible);
    assert_eq!(result.http_status, None);
    assert!(result.error_message.is_some());
}

#[tokio::test]
async fn test_invalid_url_never_errors() {
    let probe = HttpProbe::default();
    let result = probe.check("::not-a-url::").await;

    assert!(result.tested);
    assert!(!result.accessible);
    assert!(
        result
            .error_message
            .as_deref()
            .is_some_and(|msg| msg.starts_with("Invalid URL"))
    );
}
