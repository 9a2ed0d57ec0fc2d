//! Controllers probing real HTTP endpoints served by a mock server.

use std::sync::Arc;

use memento_media::testing::ScriptedFactory;
use memento_media::{Asset, ErrorKind, Lifecycle, MediaContext, ResourceController};
use memento_net::{HttpClient, HttpProbe};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn context() -> MediaContext {
    MediaContext::new(
        Arc::new(HttpProbe::new(HttpClient::new())),
        Arc::new(ScriptedFactory::new()),
    )
}

#[tokio::test]
async fn test_reachable_source_loads() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/memorial.mp4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let controller = ResourceController::new(
        Asset::video("hero", format!("{}/memorial.mp4", mock_server.uri())),
        context(),
    );

    assert!(controller.request_load(false).await);
    let state = controller.snapshot();
    assert_eq!(state.lifecycle, Lifecycle::Ready);
    let probe = state.url_probe_result.unwrap();
    assert!(probe.accessible);
    assert_eq!(probe.http_status, Some(200));
}

#[tokio::test]
async fn test_missing_source_is_unreachable() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/missing.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let controller = ResourceController::new(
        Asset::video("gone", format!("{}/missing.mp4", mock_server.uri())),
        context(),
    );

    assert!(!controller.request_load(false).await);
    let state = controller.snapshot();
    assert_eq!(state.lifecycle, Lifecycle::Error(ErrorKind::UrlUnreachable));
    assert_eq!(state.url_probe_result.unwrap().http_status, Some(404));
    assert_eq!(state.last_error.unwrap().message, "HTTP 404");
}

#[tokio::test]
async fn test_forced_probe_sees_recovery() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/track.mp3"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/track.mp3"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let controller = ResourceController::new(
        Asset::audio("song", format!("{}/track.mp3", mock_server.uri())),
        context(),
    );

    assert!(!controller.request_load(false).await);
    let probe = controller.forced_probe().await;

    assert!(probe.accessible);
    assert_eq!(
        controller.lifecycle(),
        Lifecycle::Error(ErrorKind::UrlUnreachable)
    );
    assert!(controller.retry().await);
}
