use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Stored third-party authorization. Never serialized to clients.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ProviderLink {
    pub user_id: Uuid,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Credential bundle returned by a token exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Origin of a pending authorization, recovered from the state token.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PendingAuthorization {
    pub user_id: Uuid,
    pub provider: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
