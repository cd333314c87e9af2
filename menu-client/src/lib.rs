pub mod config;
pub mod error;
pub mod models;
pub mod services;

use std::sync::Arc;

use crate::config::ApiSettings;
use crate::services::{
    MenuApi, PreviewRegistry, StaticTokenProvider, TokenProvider, Transport, UploadOrchestrator,
};

/// Shared client state: one transport and preview registry for every session.
#[derive(Clone)]
pub struct MenuClient {
    pub transport: Transport,
    pub menus: MenuApi,
    pub previews: PreviewRegistry,
}

impl MenuClient {
    /// Build a client whose token comes from `settings.access_token`.
    pub fn build(settings: &ApiSettings) -> Self {
        let tokens = Arc::new(StaticTokenProvider::new(settings.access_token.clone()));
        Self::with_token_provider(settings, tokens)
    }

    pub fn with_token_provider(settings: &ApiSettings, tokens: Arc<dyn TokenProvider>) -> Self {
        let transport = Transport::new(settings, tokens);
        if settings.access_token.is_none() {
            tracing::debug!(base_url = %transport.base_url(), "No static access token configured");
        }

        Self {
            menus: MenuApi::new(transport.clone()),
            transport,
            previews: PreviewRegistry::new(),
        }
    }

    /// A fresh staging session uploading through this client's transport.
    pub fn upload_session(&self) -> UploadOrchestrator {
        UploadOrchestrator::new(Arc::new(self.transport.clone()), self.previews.clone())
    }
}
