//! Third-party wearable providers.

pub mod oura;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::provider_link::ProviderCredentials;

pub use oura::OuraClient;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("provider configuration error: {0}")]
    Configuration(String),
}

/// The calls the OAuth flow makes against a provider. Implemented over HTTP
/// by [`OuraClient`]; tests substitute a stub.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Key under which links for this provider are stored.
    fn name(&self) -> &'static str;

    /// Consent-screen URL carrying `state`.
    fn authorization_url(&self, state: &str) -> Result<String, ProviderError>;

    /// Server-to-server authorization-code exchange.
    async fn exchange_code(&self, code: &str) -> Result<ProviderCredentials, ProviderError>;

    /// Raw daily sleep documents for `start..=end`.
    async fn fetch_daily_sleep(
        &self,
        access_token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<serde_json::Value, ProviderError>;
}
