mod common;

use common::{unreachable_settings, TestApp};
use menu_client::error::{MALFORMED_RESPONSE, NETWORK_ERROR};
use menu_client::models::FilePart;
use menu_client::services::{StaticTokenProvider, Transport, UploadEvent};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct Ping {
    ok: bool,
}

#[tokio::test]
async fn request_attaches_bearer_token_and_request_id() {
    let app = TestApp::spawn().await;
    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .and(header("authorization", app.bearer().as_str()))
        .and(header_exists("x-request-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&app.server)
        .await;

    let ping: Ping = app
        .client
        .transport
        .request("/api/ping", Method::GET, None, None)
        .await
        .expect("Request failed");

    assert!(ping.ok);
}

#[tokio::test]
async fn request_sends_json_body() {
    let app = TestApp::spawn().await;
    Mock::given(method("PUT"))
        .and(path("/api/echo"))
        .and(wiremock::matchers::body_json(json!({"a": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&app.server)
        .await;

    let ping: Ping = app
        .client
        .transport
        .request("/api/echo", Method::PUT, Some(&json!({"a": 1})), None)
        .await
        .expect("Request failed");

    assert!(ping.ok);
}

#[tokio::test]
async fn missing_token_is_not_fatal() {
    let app = TestApp::spawn_with_token(None).await;
    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&app.server)
        .await;

    let ping: Ping = app
        .client
        .transport
        .request("/api/ping", Method::GET, None, None)
        .await
        .expect("Request failed");

    assert!(ping.ok);
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let transport = Transport::new(&unreachable_settings(), Arc::new(StaticTokenProvider::anonymous()));

    let err = transport
        .request::<Value>("/api/ping", Method::GET, None, None)
        .await
        .unwrap_err();

    assert!(err.is_network_error());
    assert_eq!(err.code.as_deref(), Some(NETWORK_ERROR));
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn non_json_failure_carries_status_text() {
    let app = TestApp::spawn().await;
    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&app.server)
        .await;

    let err = app
        .client
        .transport
        .request::<Value>("/api/ping", Method::GET, None, None)
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(502));
    assert_eq!(err.message, "HTTP error: Bad Gateway");
}

#[tokio::test]
async fn non_json_success_yields_empty_value() {
    let app = TestApp::spawn().await;
    Mock::given(method("PUT"))
        .and(path("/api/menus/m1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&app.server)
        .await;

    app.client
        .transport
        .request::<()>("/api/menus/m1", Method::PUT, Some(&json!({})), None)
        .await
        .expect("No-content response should succeed");
}

#[tokio::test]
async fn embedded_error_object_is_preferred() {
    let app = TestApp::spawn().await;
    Mock::given(method("GET"))
        .and(path("/api/menus/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"message": "Menu not found", "code": "MENU_NOT_FOUND"},
            "detail": "ignored"
        })))
        .mount(&app.server)
        .await;

    let err = app
        .client
        .transport
        .request::<Value>("/api/menus/missing", Method::GET, None, None)
        .await
        .unwrap_err();

    assert_eq!(err.message, "Menu not found");
    assert_eq!(err.code.as_deref(), Some("MENU_NOT_FOUND"));
    assert_eq!(err.status, Some(404));
}

#[tokio::test]
async fn detail_string_is_used_for_failures() {
    let app = TestApp::spawn().await;
    Mock::given(method("GET"))
        .and(path("/api/menus/m1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Not your menu"})))
        .mount(&app.server)
        .await;

    let err = app
        .client
        .transport
        .request::<Value>("/api/menus/m1", Method::GET, None, None)
        .await
        .unwrap_err();

    assert_eq!(err.message, "Not your menu");
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn unparsable_success_body_is_malformed() {
    let app = TestApp::spawn().await;
    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
        .mount(&app.server)
        .await;

    let err = app
        .client
        .transport
        .request::<Ping>("/api/ping", Method::GET, None, None)
        .await
        .unwrap_err();

    assert_eq!(err.code.as_deref(), Some(MALFORMED_RESPONSE));
    assert_eq!(err.status, Some(200));
}

#[derive(Debug, Deserialize)]
struct Uploaded {
    count: usize,
}

fn parts(n: usize, size: usize) -> Vec<FilePart> {
    (0..n)
        .map(|i| FilePart {
            file_name: format!("photo-{}.jpg", i),
            media_type: "image/jpeg".to_string(),
            data: vec![1u8; size].into(),
        })
        .collect()
}

#[tokio::test]
async fn upload_progress_is_monotonic_and_ends_with_completion() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/api/uploads"))
        .and(header("authorization", app.bearer().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 2})))
        .expect(1)
        .mount(&app.server)
        .await;

    let events: Vec<UploadEvent<Uploaded>> = app
        .client
        .transport
        .upload_multipart("/api/uploads", "files", parts(2, 8 * 1024), CancellationToken::new())
        .collect()
        .await;

    let (last, progress) = events.split_last().expect("No events");
    match last {
        UploadEvent::Completed(body) => assert_eq!(body.count, 2),
        other => panic!("Expected completion, got {:?}", other),
    }

    let ticks: Vec<u8> = progress
        .iter()
        .map(|e| match e {
            UploadEvent::Progress(p) => *p,
            other => panic!("Unexpected event before terminal: {:?}", other),
        })
        .collect();
    assert!(!ticks.is_empty());
    assert!(ticks.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(ticks.last(), Some(&100));

    let requests = app.server.received_requests().await.expect("Recording disabled");
    let body = String::from_utf8_lossy(&requests[0].body);
    assert_eq!(body.matches("name=\"files\"").count(), 2);
}

#[tokio::test]
async fn upload_failure_prefers_detail() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/api/uploads"))
        .respond_with(ResponseTemplate::new(413).set_body_json(json!({"detail": "Too many files"})))
        .mount(&app.server)
        .await;

    let events: Vec<UploadEvent<Uploaded>> = app
        .client
        .transport
        .upload_multipart("/api/uploads", "files", parts(1, 2048), CancellationToken::new())
        .collect()
        .await;

    match events.last() {
        Some(UploadEvent::Failed(err)) => {
            assert_eq!(err.message, "Too many files");
            assert_eq!(err.status, Some(413));
        }
        other => panic!("Expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn upload_failure_without_body_uses_status_fallback() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/api/uploads"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.server)
        .await;

    let events: Vec<UploadEvent<Uploaded>> = app
        .client
        .transport
        .upload_multipart("/api/uploads", "files", parts(1, 2048), CancellationToken::new())
        .collect()
        .await;

    match events.last() {
        Some(UploadEvent::Failed(err)) => assert_eq!(err.message, "Upload failed (500)"),
        other => panic!("Expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn cancelled_upload_ends_with_cancelled_failure() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/api/uploads"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"count": 1}))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&app.server)
        .await;

    let cancel = CancellationToken::new();
    let mut events = app.client.transport.upload_multipart::<Uploaded>(
        "/api/uploads",
        "files",
        parts(1, 2048),
        cancel.clone(),
    );
    cancel.cancel();

    let mut terminal = None;
    while let Some(event) = events.next().await {
        if !matches!(event, UploadEvent::Progress(_)) {
            terminal = Some(event);
        }
    }

    match terminal {
        Some(UploadEvent::Failed(err)) => assert!(err.is_cancelled()),
        other => panic!("Expected cancellation, got {:?}", other),
    }
}
