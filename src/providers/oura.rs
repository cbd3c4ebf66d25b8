use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use url::Url;

use super::{ProviderApi, ProviderError};
use crate::config::Config;
use crate::models::provider_link::ProviderCredentials;

pub const PROVIDER_NAME: &str = "oura";
const SCOPES: &str = "email personal daily";

/// Oura Cloud v2 client. One instance (and one connection pool) per process.
pub struct OuraClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_url: String,
    token_url: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct OuraTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

impl OuraClient {
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            client_id: config.oura_client_id.clone(),
            client_secret: config.oura_client_secret.clone(),
            redirect_uri: config.oura_redirect_uri.clone(),
            authorize_url: config.oura_authorize_url.clone(),
            token_url: config.oura_token_url.clone(),
            api_base: config.oura_api_base.trim_end_matches('/').to_string(),
        })
    }
}

fn credentials_from_response(
    body: OuraTokenResponse,
    now: DateTime<Utc>,
) -> Result<ProviderCredentials, ProviderError> {
    if let Some(error) = body.error {
        let detail = body.error_description.unwrap_or_default();
        return Err(ProviderError::InvalidResponse(format!("{error} {detail}").trim().to_string()));
    }

    let access_token = body
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("missing access_token".into()))?;

    Ok(ProviderCredentials {
        access_token,
        refresh_token: body.refresh_token,
        expires_at: body
            .expires_in
            .map(|secs| now + chrono::Duration::seconds(secs)),
    })
}

#[async_trait]
impl ProviderApi for OuraClient {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn authorization_url(&self, state: &str) -> Result<String, ProviderError> {
        let url = Url::parse_with_params(
            &self.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", state),
            ],
        )
        .map_err(|e| ProviderError::Configuration(format!("OURA_AUTHORIZE_URL: {e}")))?;

        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderCredentials, ProviderError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self.http.post(&self.token_url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let body: OuraTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        credentials_from_response(body, Utc::now())
    }

    async fn fetch_daily_sleep(
        &self,
        access_token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<serde_json::Value, ProviderError> {
        let start_date = start.format("%Y-%m-%d").to_string();
        let end_date = end.format("%Y-%m-%d").to_string();

        let response = self
            .http
            .get(format!("{}/v2/usercollection/daily_sleep", self.api_base))
            .bearer_auth(access_token)
            .query(&[("start_date", start_date), ("end_date", end_date)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}
