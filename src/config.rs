use std::env;

use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,

    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,

    pub oura_client_id: String,
    pub oura_client_secret: String,
    pub oura_redirect_uri: String,
    pub oura_authorize_url: String,
    pub oura_token_url: String,
    pub oura_api_base: String,

    pub provider_timeout_secs: u64,
    pub oauth_state_ttl_secs: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => anyhow::bail!("STORAGE_BACKEND must be `postgres` or `memory`, got `{other}`"),
        };

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        Ok(Self {
            storage_backend,
            database_url,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "4000".into())
                .parse()
                .context("PORT must be a number")?,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),

            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_ttl_secs: env::var("JWT_TTL_SECS")
                .unwrap_or_else(|_| "604800".into()) // 7 days
                .parse()
                .context("JWT_TTL_SECS must be a number")?,

            oura_client_id: env::var("OURA_CLIENT_ID").unwrap_or_default(),
            oura_client_secret: env::var("OURA_CLIENT_SECRET").unwrap_or_default(),
            oura_redirect_uri: env::var("OURA_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:4000/oura/callback".into()),
            oura_authorize_url: env::var("OURA_AUTHORIZE_URL")
                .unwrap_or_else(|_| "https://cloud.ouraring.com/oauth/authorize".into()),
            oura_token_url: env::var("OURA_TOKEN_URL")
                .unwrap_or_else(|_| "https://cloud.ouraring.com/oauth/token".into()),
            oura_api_base: env::var("OURA_API_BASE")
                .unwrap_or_else(|_| "https://api.ouraring.com".into()),

            provider_timeout_secs: env::var("PROVIDER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .context("PROVIDER_TIMEOUT_SECS must be a number")?,
            oauth_state_ttl_secs: env::var("OAUTH_STATE_TTL_SECS")
                .unwrap_or_else(|_| "600".into())
                .parse()
                .context("OAUTH_STATE_TTL_SECS must be a number")?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            storage_backend: StorageBackend::Memory,
            database_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: Vec::new(),
            jwt_secret: "test-secret-0123456789".into(),
            jwt_ttl_secs: 3600,
            oura_client_id: "test-client".into(),
            oura_client_secret: "test-client-secret".into(),
            oura_redirect_uri: "http://localhost:4000/oura/callback".into(),
            oura_authorize_url: "https://cloud.ouraring.com/oauth/authorize".into(),
            oura_token_url: "https://cloud.ouraring.com/oauth/token".into(),
            oura_api_base: "https://api.ouraring.com".into(),
            provider_timeout_secs: 10,
            oauth_state_ttl_secs: 600,
        }
    }
}
