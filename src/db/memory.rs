use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{EntryStore, LinkStore, UserStore};
use crate::error::AppResult;
use crate::models::daily_entry::{DailyEntry, EntryPatch};
use crate::models::provider_link::{PendingAuthorization, ProviderCredentials, ProviderLink};
use crate::models::user::User;

/// Process-local stores for tests and `STORAGE_BACKEND=memory`.
///
/// Each map sits behind one mutex, so a read-merge-write on a key is atomic
/// the same way the Postgres `ON CONFLICT` upsert is.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<Mutex<HashMap<String, User>>>,
    entries: Arc<Mutex<BTreeMap<(Uuid, String), DailyEntry>>>,
    links: Arc<Mutex<HashMap<(Uuid, String), ProviderLink>>>,
    pending: Arc<Mutex<HashMap<String, PendingAuthorization>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_or_create_by_email(&self, email: &str) -> AppResult<User> {
        let mut users = self.users.lock().await;
        let now = Utc::now();
        let user = users
            .entry(email.to_string())
            .and_modify(|u| u.updated_at = now)
            .or_insert_with(|| User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                created_at: now,
                updated_at: now,
            });
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| u.id == id).cloned())
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn upsert_entry(
        &self,
        user_id: Uuid,
        date: &str,
        patch: &EntryPatch,
    ) -> AppResult<DailyEntry> {
        let mut entries = self.entries.lock().await;
        let now = Utc::now();
        let entry = entries
            .entry((user_id, date.to_string()))
            .or_insert_with(|| DailyEntry::new(user_id, date, now));
        entry.apply(patch, now);
        Ok(entry.clone())
    }

    async fn query_range(&self, user_id: Uuid, from: &str, to: &str) -> AppResult<Vec<DailyEntry>> {
        if from > to {
            return Ok(Vec::new());
        }
        let entries = self.entries.lock().await;
        Ok(entries
            .range((user_id, from.to_string())..=(user_id, to.to_string()))
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn save_link(
        &self,
        user_id: Uuid,
        provider: &str,
        credentials: &ProviderCredentials,
    ) -> AppResult<ProviderLink> {
        let mut links = self.links.lock().await;
        let now = Utc::now();
        let created_at = links
            .get(&(user_id, provider.to_string()))
            .map_or(now, |existing| existing.created_at);

        let link = ProviderLink {
            user_id,
            provider: provider.to_string(),
            access_token: credentials.access_token.clone(),
            refresh_token: credentials.refresh_token.clone(),
            expires_at: credentials.expires_at,
            created_at,
            updated_at: now,
        };
        links.insert((user_id, provider.to_string()), link.clone());
        Ok(link)
    }

    async fn get_link(&self, user_id: Uuid, provider: &str) -> AppResult<Option<ProviderLink>> {
        let links = self.links.lock().await;
        Ok(links.get(&(user_id, provider.to_string())).cloned())
    }

    async fn put_pending(&self, state_hash: &str, pending: &PendingAuthorization) -> AppResult<()> {
        let mut states = self.pending.lock().await;
        let now = Utc::now();
        states.retain(|_, p| p.expires_at > now);
        states.insert(state_hash.to_string(), pending.clone());
        Ok(())
    }

    async fn take_pending(
        &self,
        state_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PendingAuthorization>> {
        let mut states = self.pending.lock().await;
        Ok(states.remove(state_hash).filter(|p| p.expires_at > now))
    }
}
