//! Authorization-code handshake with a wearable provider.
//!
//! `connect` issues a random state token and remembers (by hash) which user
//! asked for it; `callback` consumes that token exactly once before spending
//! the authorization code; `pull` reads provider data with the stored
//! credential.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rand::RngCore;
use uuid::Uuid;

use crate::auth::jwt::hash_token;
use crate::db::{LinkStore, UserStore};
use crate::error::{AppError, AppResult};
use crate::models::provider_link::PendingAuthorization;
use crate::providers::ProviderApi;

/// Days of history fetched by `pull`, ending today.
pub const PULL_WINDOW_DAYS: i64 = 14;

#[derive(Clone)]
pub struct OAuthFlow {
    users: Arc<dyn UserStore>,
    links: Arc<dyn LinkStore>,
    provider: Arc<dyn ProviderApi>,
    state_ttl: Duration,
}

impl OAuthFlow {
    pub fn new(
        users: Arc<dyn UserStore>,
        links: Arc<dyn LinkStore>,
        provider: Arc<dyn ProviderApi>,
        state_ttl_secs: i64,
    ) -> Self {
        Self {
            users,
            links,
            provider,
            state_ttl: Duration::seconds(state_ttl_secs),
        }
    }

    /// Returns the consent URL the caller should be redirected to.
    pub async fn connect(&self, user_id: Uuid) -> AppResult<String> {
        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".into()));
        }

        let state = generate_state();
        let pending = PendingAuthorization {
            user_id,
            provider: self.provider.name().to_string(),
            expires_at: Utc::now() + self.state_ttl,
        };
        self.links.put_pending(&hash_token(&state), &pending).await?;

        let url = self.provider.authorization_url(&state)?;
        tracing::info!(user_id = %user_id, provider = self.provider.name(), "OAuth connect started");
        Ok(url)
    }

    /// Completes the handshake and returns the linked user.
    ///
    /// Nothing is sent to the provider unless `code` and a live `state` are
    /// present, and nothing is stored unless the exchange succeeds.
    pub async fn callback(
        &self,
        code: Option<&str>,
        state: Option<&str>,
        provider_error: Option<&str>,
    ) -> AppResult<Uuid> {
        if let Some(error) = provider_error.filter(|e| !e.is_empty()) {
            tracing::warn!(provider = self.provider.name(), error = %error, "Provider denied authorization");
            return Err(AppError::BadRequest(format!("Authorization was not granted: {error}")));
        }

        let (code, state) = match (
            code.map(str::trim).filter(|c| !c.is_empty()),
            state.map(str::trim).filter(|s| !s.is_empty()),
        ) {
            (Some(code), Some(state)) => (code, state),
            _ => return Err(AppError::BadRequest("Missing code/state".into())),
        };

        let pending = self
            .links
            .take_pending(&hash_token(state), Utc::now())
            .await?
            .filter(|p| p.provider == self.provider.name())
            .ok_or_else(|| AppError::BadRequest("Invalid or expired state".into()))?;

        let credentials = self.provider.exchange_code(code).await?;
        self.links
            .save_link(pending.user_id, self.provider.name(), &credentials)
            .await?;

        tracing::info!(
            user_id = %pending.user_id,
            provider = self.provider.name(),
            has_refresh_token = credentials.refresh_token.is_some(),
            "Provider linked"
        );
        Ok(pending.user_id)
    }

    /// Raw provider sleep data for the trailing window ending `today`.
    pub async fn pull(&self, user_id: Uuid, today: NaiveDate) -> AppResult<serde_json::Value> {
        let link = self
            .links
            .get_link(user_id, self.provider.name())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No {} link for user", self.provider.name())))?;

        let (start, end) = pull_window(today);
        let data = self
            .provider
            .fetch_daily_sleep(&link.access_token, start, end)
            .await?;

        tracing::debug!(user_id = %user_id, provider = self.provider.name(), %start, %end, "Provider data pulled");
        Ok(data)
    }
}

pub fn pull_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(PULL_WINDOW_DAYS), today)
}

/// 256 random bits, hex-encoded.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}


#[cfg(test)]
mod tests {
    use super::testing::StubProvider;
    use super::*;
    use crate::db::MemoryStore;

    fn flow(store: &MemoryStore, provider: Arc<StubProvider>) -> OAuthFlow {
        OAuthFlow::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            provider,
            600,
        )
    }

    async fn user(store: &MemoryStore) -> Uuid {
        store.find_or_create_by_email("jane@example.com").await.unwrap().id
    }

    #[test]
    fn state_tokens_are_random_hex() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn pull_window_is_fourteen_days() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let (start, end) = pull_window(today);
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(end, today);
    }

    #[tokio::test]
    async fn full_handshake_links_the_originating_user() {
        let store = MemoryStore::new();
        let provider = Arc::new(StubProvider::default());
        let flow = flow(&store, provider.clone());
        let user_id = user(&store).await;

        let url = flow.connect(user_id).await.unwrap();
        let state = provider.issued_state();
        assert!(url.contains(&state));
        assert_ne!(state, user_id.to_string());

        let linked = flow.callback(Some("code-1"), Some(&state), None).await.unwrap();
        assert_eq!(linked, user_id);
        let link = store.get_link(user_id, "oura").await.unwrap().unwrap();
        assert_eq!(link.access_token, "access-for-code-1");

        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let data = flow.pull(user_id, today).await.unwrap();
        assert_eq!(data["start"], "2025-06-01");
        assert_eq!(provider.last_token.lock().unwrap().as_deref(), Some("access-for-code-1"));
    }

    #[tokio::test]
    async fn connect_rejects_unknown_user() {
        let store = MemoryStore::new();
        let flow = flow(&store, Arc::new(StubProvider::default()));
        let err = flow.connect(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn callback_without_code_or_state_makes_no_call() {
        let store = MemoryStore::new();
        let provider = Arc::new(StubProvider::default());
        let flow = flow(&store, provider.clone());

        for (code, state) in [(None, Some("s")), (Some("c"), None), (Some(""), Some("s"))] {
            let err = flow.callback(code, state, None).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
        }
        assert_eq!(provider.exchanges(), 0);
    }

    #[tokio::test]
    async fn forged_or_reused_state_is_rejected() {
        let store = MemoryStore::new();
        let provider = Arc::new(StubProvider::default());
        let flow = flow(&store, provider.clone());
        let user_id = user(&store).await;

        // A raw user id is not a valid state.
        let err = flow
            .callback(Some("code"), Some(&user_id.to_string()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(provider.exchanges(), 0);

        flow.connect(user_id).await.unwrap();
        let state = provider.issued_state();
        flow.callback(Some("code"), Some(&state), None).await.unwrap();
        let err = flow.callback(Some("code"), Some(&state), None).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(provider.exchanges(), 1);
    }

    #[tokio::test]
    async fn expired_state_is_rejected() {
        let store = MemoryStore::new();
        let provider = Arc::new(StubProvider::default());
        let flow = OAuthFlow::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            provider.clone(),
            -1,
        );
        let user_id = user(&store).await;

        flow.connect(user_id).await.unwrap();
        let err = flow
            .callback(Some("code"), Some(&provider.issued_state()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(provider.exchanges(), 0);
    }

    #[tokio::test]
    async fn failed_exchange_writes_no_link() {
        let store = MemoryStore::new();
        let provider = Arc::new(StubProvider {
            fail_exchange: true,
            ..Default::default()
        });
        let flow = flow(&store, provider.clone());
        let user_id = user(&store).await;

        flow.connect(user_id).await.unwrap();
        let err = flow
            .callback(Some("code"), Some(&provider.issued_state()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
        assert!(store.get_link(user_id, "oura").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn provider_denial_is_a_bad_request() {
        let store = MemoryStore::new();
        let provider = Arc::new(StubProvider::default());
        let flow = flow(&store, provider.clone());

        let err = flow
            .callback(None, Some("state"), Some("access_denied"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(provider.exchanges(), 0);
    }

    #[tokio::test]
    async fn pull_without_link_is_not_found_and_skips_provider() {
        let store = MemoryStore::new();
        let provider = Arc::new(StubProvider::default());
        let flow = flow(&store, provider.clone());
        let user_id = user(&store).await;

        let today = Utc::now().date_naive();
        let err = flow.pull(user_id, today).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(provider.fetches(), 0);
    }
}
