use client_core::config as core_config;
use client_core::error::CoreError;
use secrecy::Secret;
use serde::Deserialize;
use validator::Validate;

#[derive(Deserialize, Clone, Debug, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub api: ApiSettings,
    pub logging: LoggingSettings,
}

#[derive(Deserialize, Clone, Debug, Validate)]
pub struct ApiSettings {
    /// Menu API root, without the `/api` suffix (e.g. http://localhost:8000).
    #[validate(url)]
    pub base_url: String,
    /// Timeout for JSON request/response calls.
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
    /// Timeout for multipart uploads, which carry up to 25MB.
    #[validate(range(min = 1))]
    pub upload_timeout_secs: u64,
    /// Size of the body chunks progress is reported on.
    #[validate(range(min = 1024))]
    pub upload_chunk_size: usize,
    /// Static bearer token; omit to call public endpoints only.
    #[serde(default)]
    pub access_token: Option<Secret<String>>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LoggingSettings {
    pub level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

impl ApiSettings {
    /// Settings pointing at `base_url` with every other knob at its default.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_secs: 30,
            upload_timeout_secs: 120,
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            access_token: None,
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

pub fn get_configuration() -> Result<Settings, CoreError> {
    let settings: Settings = core_config::load("menu-client", |builder| {
        builder
            .set_default("api.base_url", DEFAULT_BASE_URL)?
            .set_default("api.request_timeout_secs", 30)?
            .set_default("api.upload_timeout_secs", 120)?
            .set_default("api.upload_chunk_size", DEFAULT_UPLOAD_CHUNK_SIZE as u64)?
            .set_default("logging.level", "info")
    })?;

    settings
        .validate()
        .map_err(|e| CoreError::InvalidConfig(e.to_string()))?;

    Ok(settings)
}
