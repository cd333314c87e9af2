use async_trait::async_trait;
use secrecy::Secret;

/// Source of the bearer token attached to outgoing requests.
///
/// Returning `None` is not an error: public endpoints work without a token.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Option<Secret<String>>;
}

/// A token fixed at construction, e.g. from settings.
pub struct StaticTokenProvider {
    token: Option<Secret<String>>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<Secret<String>>) -> Self {
        Self { token }
    }

    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Option<Secret<String>> {
        self.token.clone()
    }
}
