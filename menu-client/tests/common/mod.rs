#![allow(dead_code)]

use menu_client::config::ApiSettings;
use menu_client::models::CandidateFile;
use menu_client::MenuClient;
use secrecy::Secret;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_MENU_ID: &str = "menu-123";

pub struct TestApp {
    pub server: MockServer,
    pub client: MenuClient,
}

impl TestApp {
    /// Mock API plus a client authenticated with [`TEST_TOKEN`].
    pub async fn spawn() -> Self {
        Self::spawn_with_token(Some(TEST_TOKEN)).await
    }

    pub async fn spawn_with_token(token: Option<&str>) -> Self {
        let server = MockServer::start().await;
        let mut settings = ApiSettings::with_base_url(server.uri());
        settings.request_timeout_secs = 5;
        settings.upload_timeout_secs = 5;
        settings.upload_chunk_size = 1024;
        settings.access_token = token.map(|t| Secret::new(t.to_string()));

        let client = MenuClient::build(&settings);
        Self { server, client }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", TEST_TOKEN)
    }
}

/// Settings for a port nothing listens on.
pub fn unreachable_settings() -> ApiSettings {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No local address").port();
    drop(listener);

    let mut settings = ApiSettings::with_base_url(format!("http://127.0.0.1:{}", port));
    settings.request_timeout_secs = 2;
    settings
}

pub fn jpeg(name: &str, size: usize) -> CandidateFile {
    CandidateFile::new(name, "image/jpeg", vec![0xFFu8; size])
}

pub fn menu_json() -> Value {
    json!({
        "schema_version": 1,
        "title": "Lunch",
        "categories": [
            {"name": "Mains", "items": [{"name": "Pasta", "price": 12.5}]}
        ]
    })
}

pub fn menu_record_json(id: &str) -> Value {
    json!({
        "id": id,
        "user_id": "user-1",
        "data": menu_json(),
        "is_published": false,
        "created_at": "2026-01-01T10:00:00Z",
        "updated_at": null
    })
}
