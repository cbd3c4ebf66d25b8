//! Storage seams. Handlers and the OAuth flow only see these traits; `main`
//! picks the Postgres or in-memory implementation.

pub mod memory;
pub mod pool;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::daily_entry::{DailyEntry, EntryPatch};
use crate::models::provider_link::{PendingAuthorization, ProviderCredentials, ProviderLink};
use crate::models::user::User;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the user with this (already normalized) email, creating it
    /// on first sight.
    async fn find_or_create_by_email(&self, email: &str) -> AppResult<User>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
}

#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Creates or field-merges the entry for `(user_id, date)` and returns
    /// the merged record. Concurrent callers for the same key never produce
    /// a second row or a duplicate-key error.
    async fn upsert_entry(&self, user_id: Uuid, date: &str, patch: &EntryPatch)
        -> AppResult<DailyEntry>;

    /// Entries with `from <= date <= to`, ascending by date.
    async fn query_range(&self, user_id: Uuid, from: &str, to: &str) -> AppResult<Vec<DailyEntry>>;
}

#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Replaces any existing link for `(user_id, provider)`.
    async fn save_link(
        &self,
        user_id: Uuid,
        provider: &str,
        credentials: &ProviderCredentials,
    ) -> AppResult<ProviderLink>;

    async fn get_link(&self, user_id: Uuid, provider: &str) -> AppResult<Option<ProviderLink>>;

    async fn put_pending(
        &self,
        state_hash: &str,
        pending: &PendingAuthorization,
    ) -> AppResult<()>;

    /// Removes the pending authorization and returns it if it was still live
    /// at `now`. A second call with the same hash returns `None`.
    async fn take_pending(
        &self,
        state_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PendingAuthorization>>;
}
