use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{EntryStore, LinkStore, UserStore};
use crate::error::AppResult;
use crate::models::daily_entry::{DailyEntry, EntryPatch};
use crate::models::provider_link::{PendingAuthorization, ProviderCredentials, ProviderLink};
use crate::models::user::User;

/// Postgres-backed stores. Uniqueness lives in the schema: every write is a
/// single `INSERT ... ON CONFLICT` so racing creators resolve inside the
/// database.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_or_create_by_email(&self, email: &str) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email)
            VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE SET updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .fetch_one(&self.db)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl EntryStore for PgStore {
    async fn upsert_entry(
        &self,
        user_id: Uuid,
        date: &str,
        patch: &EntryPatch,
    ) -> AppResult<DailyEntry> {
        let m = patch.metrics.clone().unwrap_or_default();
        let s = patch.symptoms.clone().unwrap_or_default();
        let sup = patch.supplements.clone().unwrap_or_default();
        let o = patch.manual_override.clone().unwrap_or_default();

        let entry = sqlx::query_as::<_, DailyEntry>(
            r#"
            INSERT INTO daily_entries (
                id, user_id, entry_date,
                steps, sleep_hours, hrv, mindfulness_min, water_ml, mood,
                hot_flash_count, hot_flash_intensity_avg, night_sweats, dryness_level, notes,
                glycine_mg, magnesium_mg, collagen, omega3,
                override_steps, override_sleep_hours, override_hrv, override_mindfulness_min
            )
            VALUES (
                $1, $2, $3,
                $4, $5, $6, $7, $8, $9,
                $10, $11, $12, $13, $14,
                $15, $16, $17, $18,
                $19, $20, $21, $22
            )
            ON CONFLICT (user_id, entry_date) DO UPDATE SET
                steps = COALESCE(EXCLUDED.steps, daily_entries.steps),
                sleep_hours = COALESCE(EXCLUDED.sleep_hours, daily_entries.sleep_hours),
                hrv = COALESCE(EXCLUDED.hrv, daily_entries.hrv),
                mindfulness_min = COALESCE(EXCLUDED.mindfulness_min, daily_entries.mindfulness_min),
                water_ml = COALESCE(EXCLUDED.water_ml, daily_entries.water_ml),
                mood = COALESCE(EXCLUDED.mood, daily_entries.mood),
                hot_flash_count = COALESCE(EXCLUDED.hot_flash_count, daily_entries.hot_flash_count),
                hot_flash_intensity_avg = COALESCE(EXCLUDED.hot_flash_intensity_avg, daily_entries.hot_flash_intensity_avg),
                night_sweats = COALESCE(EXCLUDED.night_sweats, daily_entries.night_sweats),
                dryness_level = COALESCE(EXCLUDED.dryness_level, daily_entries.dryness_level),
                notes = COALESCE(EXCLUDED.notes, daily_entries.notes),
                glycine_mg = COALESCE(EXCLUDED.glycine_mg, daily_entries.glycine_mg),
                magnesium_mg = COALESCE(EXCLUDED.magnesium_mg, daily_entries.magnesium_mg),
                collagen = COALESCE(EXCLUDED.collagen, daily_entries.collagen),
                omega3 = COALESCE(EXCLUDED.omega3, daily_entries.omega3),
                override_steps = COALESCE(EXCLUDED.override_steps, daily_entries.override_steps),
                override_sleep_hours = COALESCE(EXCLUDED.override_sleep_hours, daily_entries.override_sleep_hours),
                override_hrv = COALESCE(EXCLUDED.override_hrv, daily_entries.override_hrv),
                override_mindfulness_min = COALESCE(EXCLUDED.override_mindfulness_min, daily_entries.override_mindfulness_min),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(date)
        .bind(m.steps)
        .bind(m.sleep_hours)
        .bind(m.hrv)
        .bind(m.mindfulness_min)
        .bind(m.water_ml)
        .bind(m.mood)
        .bind(s.hot_flash_count)
        .bind(s.hot_flash_intensity_avg)
        .bind(s.night_sweats)
        .bind(s.dryness_level)
        .bind(&s.notes)
        .bind(sup.glycine_mg)
        .bind(sup.magnesium_mg)
        .bind(sup.collagen)
        .bind(sup.omega3)
        .bind(o.steps)
        .bind(o.sleep_hours)
        .bind(o.hrv)
        .bind(o.mindfulness_min)
        .fetch_one(&self.db)
        .await?;

        Ok(entry)
    }

    async fn query_range(&self, user_id: Uuid, from: &str, to: &str) -> AppResult<Vec<DailyEntry>> {
        let entries = sqlx::query_as::<_, DailyEntry>(
            r#"
            SELECT * FROM daily_entries
            WHERE user_id = $1 AND entry_date >= $2 AND entry_date <= $3
            ORDER BY entry_date ASC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }
}

#[async_trait]
impl LinkStore for PgStore {
    async fn save_link(
        &self,
        user_id: Uuid,
        provider: &str,
        credentials: &ProviderCredentials,
    ) -> AppResult<ProviderLink> {
        // Full replace: a NULL refresh token or expiry clears the old one.
        let link = sqlx::query_as::<_, ProviderLink>(
            r#"
            INSERT INTO provider_links (user_id, provider, access_token, refresh_token, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, provider) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(&credentials.access_token)
        .bind(&credentials.refresh_token)
        .bind(credentials.expires_at)
        .fetch_one(&self.db)
        .await?;

        Ok(link)
    }

    async fn get_link(&self, user_id: Uuid, provider: &str) -> AppResult<Option<ProviderLink>> {
        let link = sqlx::query_as::<_, ProviderLink>(
            "SELECT * FROM provider_links WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.db)
        .await?;

        Ok(link)
    }

    async fn put_pending(&self, state_hash: &str, pending: &PendingAuthorization) -> AppResult<()> {
        sqlx::query("DELETE FROM oauth_states WHERE expires_at < NOW()")
            .execute(&self.db)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO oauth_states (state_hash, user_id, provider, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(state_hash)
        .bind(pending.user_id)
        .bind(&pending.provider)
        .bind(pending.expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn take_pending(
        &self,
        state_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PendingAuthorization>> {
        let pending = sqlx::query_as::<_, PendingAuthorization>(
            r#"
            DELETE FROM oauth_states
            WHERE state_hash = $1
            RETURNING user_id, provider, expires_at
            "#,
        )
        .bind(state_hash)
        .fetch_optional(&self.db)
        .await?;

        Ok(pending.filter(|p| p.expires_at > now))
    }
}
