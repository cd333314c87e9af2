mod common;

use common::{jpeg, TestApp, TEST_MENU_ID};
use menu_client::services::SessionPhase;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn images_path() -> String {
    format!("/api/menus/{}/images", TEST_MENU_ID)
}

#[tokio::test]
async fn stage_and_upload_three_files() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path(images_path()))
        .and(header("authorization", app.bearer().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [
                {"path": "menu-123/a.jpg", "url": "https://cdn.example.com/menu-123/a.jpg"},
                {"path": "menu-123/b.jpg", "url": "https://cdn.example.com/menu-123/b.jpg"},
                {"path": "menu-123/c.jpg", "url": "https://cdn.example.com/menu-123/c.jpg"}
            ]
        })))
        .expect(1)
        .mount(&app.server)
        .await;

    let session = app.client.upload_session();
    let staged = session.add_files(vec![
        jpeg("a.jpg", 1024 * 1024),
        jpeg("b.jpg", 2 * 1024 * 1024),
        jpeg("c.jpg", 3 * 1024 * 1024),
    ]);
    assert!(staged.valid);
    assert_eq!(session.snapshot().previews.len(), 3);

    let results = session.upload(TEST_MENU_ID).await.expect("Upload failed");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].url, "https://cdn.example.com/menu-123/a.jpg");
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Completed);
    assert_eq!(snapshot.progress, 100);
    assert!(!snapshot.uploading);
    assert_eq!(snapshot.results, results);

    let requests = app.server.received_requests().await.expect("Recording disabled");
    let body = String::from_utf8_lossy(&requests[0].body);
    assert_eq!(body.matches("name=\"files\"").count(), 3);
    assert!(body.contains("filename=\"b.jpg\""));
}

#[tokio::test]
async fn server_failure_keeps_files_staged() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path(images_path()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.server)
        .await;

    let session = app.client.upload_session();
    session.add_files(vec![jpeg("a.jpg", 4096), jpeg("b.jpg", 4096)]);

    let err = session.upload(TEST_MENU_ID).await.unwrap_err();

    assert_eq!(err.api_error().and_then(|e| e.status), Some(500));
    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Staged);
    assert_eq!(snapshot.progress, 0);
    assert_eq!(snapshot.files.len(), 2);
    assert_eq!(snapshot.error.as_deref(), Some("Upload failed (500)"));
}

#[tokio::test]
async fn rejected_batch_never_reaches_the_server() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"images": []})))
        .expect(0)
        .mount(&app.server)
        .await;

    let session = app.client.upload_session();
    let rejected = session.add_files(vec![jpeg("huge.jpg", 6 * 1024 * 1024)]);

    assert!(!rejected.valid);
    assert!(rejected.error.unwrap().contains("too large"));
    assert!(session.upload(TEST_MENU_ID).await.is_err());
    assert_eq!(app.client.previews.live_count(), 0);
}

#[tokio::test]
async fn clear_after_upload_releases_previews_and_keeps_results() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path(images_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [{"path": "menu-123/a.jpg", "url": "https://cdn.example.com/menu-123/a.jpg"}]
        })))
        .mount(&app.server)
        .await;

    let session = app.client.upload_session();
    session.add_files(vec![jpeg("a.jpg", 2048)]);
    session.upload(TEST_MENU_ID).await.expect("Upload failed");

    session.clear_files().expect("Clear rejected");

    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert_eq!(snapshot.results.len(), 1);
    assert_eq!(app.client.previews.live_count(), 0);
}

#[tokio::test]
async fn upload_target_is_percent_encoded() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/api/menus/team%2Flunch/images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"images": []})))
        .expect(1)
        .mount(&app.server)
        .await;

    let session = app.client.upload_session();
    session.add_files(vec![jpeg("a.jpg", 2048)]);

    let results = session.upload("team/lunch").await.expect("Upload failed");
    assert!(results.is_empty());
}
