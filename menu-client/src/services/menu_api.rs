use reqwest::Method;
use serde_json::Value;
use urlencoding::encode;

use crate::error::{ApiError, ClientError, SchemaErrors, SchemaViolation};
use crate::models::{
    CandidateFile, CreateMenuResponse, FilePart, MenuDocument, MenuRecord, PublishMenuResponse,
};
use crate::services::file_policy::validate_files;
use crate::services::menu_schema::validate_menu_data;
use crate::services::transport::Transport;

/// Typed calls against the menu endpoints.
#[derive(Clone)]
pub struct MenuApi {
    transport: Transport,
}

impl MenuApi {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Create a menu from a set of images; the server drafts the document.
    pub async fn create_menu(&self, images: &[CandidateFile]) -> Result<CreateMenuResponse, ClientError> {
        let validation = validate_files(images);
        if let Some(error) = validation.error {
            return Err(ClientError::Validation(error));
        }

        let parts: Vec<FilePart> = images.iter().map(FilePart::from).collect();
        tracing::info!(image_count = parts.len(), "Creating menu");

        let created: CreateMenuResponse = self
            .transport
            .request_multipart("/api/menus", parts, |i| format!("image_{}", i))
            .await?;

        tracing::info!(menu_id = %created.menu_id, "Menu created");
        Ok(created)
    }

    pub async fn get_menu(&self, menu_id: &str) -> Result<MenuRecord, ClientError> {
        let path = format!("/api/menus/{}", encode(menu_id));
        self.fetch_record(&path, menu_id).await
    }

    /// Replace the stored document. Invalid documents never leave the client.
    pub async fn update_menu(&self, menu_id: &str, document: &MenuDocument) -> Result<(), ClientError> {
        let body = serde_json::to_value(document).map_err(|e| {
            ClientError::Api(ApiError::invalid_request(format!(
                "Failed to serialize menu document: {}",
                e
            )))
        })?;

        let validation = validate_menu_data(&body);
        if !validation.valid {
            tracing::warn!(menu_id = %menu_id, errors = validation.errors.len(), "Refusing to send invalid menu");
            return Err(ClientError::Schema(SchemaErrors(validation.errors)));
        }

        let path = format!("/api/menus/{}", encode(menu_id));
        let _: Value = self
            .transport
            .request(&path, Method::PUT, Some(&body), None)
            .await?;

        tracing::info!(menu_id = %menu_id, "Menu updated");
        Ok(())
    }

    pub async fn publish_menu(&self, menu_id: &str) -> Result<PublishMenuResponse, ClientError> {
        let path = format!("/api/menus/{}/publish", encode(menu_id));
        let published: PublishMenuResponse = self
            .transport
            .request(&path, Method::POST, None, None)
            .await?;

        tracing::info!(menu_id = %menu_id, public_url = %published.public_url, "Menu published");
        Ok(published)
    }

    /// Fetch a published menu; works without an access token.
    pub async fn get_public_menu(&self, menu_id: &str) -> Result<MenuRecord, ClientError> {
        let path = format!("/api/public/menus/{}", encode(menu_id));
        self.fetch_record(&path, menu_id).await
    }

    /// Records whose document breaks the schema are rejected wholesale.
    async fn fetch_record(&self, path: &str, menu_id: &str) -> Result<MenuRecord, ClientError> {
        let raw: Value = self.transport.request(path, Method::GET, None, None).await?;

        let validation = validate_menu_data(raw.get("data").unwrap_or(&Value::Null));
        if !validation.valid {
            tracing::warn!(menu_id = %menu_id, errors = validation.errors.len(), "Fetched menu breaks the schema");
            let errors = validation
                .errors
                .into_iter()
                .map(|v| SchemaViolation {
                    path: if v.path.is_empty() {
                        "data".to_string()
                    } else {
                        format!("data.{}", v.path)
                    },
                    message: v.message,
                })
                .collect();
            return Err(ClientError::Schema(SchemaErrors(errors)));
        }

        serde_json::from_value(raw).map_err(|e| {
            tracing::error!(menu_id = %menu_id, error = %e, "Menu record does not match the expected shape");
            ClientError::Api(ApiError::malformed("Failed to parse server response", 200))
        })
    }
}
