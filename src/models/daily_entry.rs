use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// One user's wellness snapshot for a single calendar day.
///
/// `date` is the `YYYY-MM-DD` string the client sent, stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "entry_date")]
    pub date: String,
    #[sqlx(flatten)]
    pub metrics: Metrics,
    #[sqlx(flatten)]
    pub symptoms: Symptoms,
    #[sqlx(flatten)]
    pub supplements: Supplements,
    #[sqlx(flatten)]
    pub manual_override: ManualOverride,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyEntry {
    pub fn new(user_id: Uuid, date: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            date: date.to_string(),
            metrics: Metrics::default(),
            symptoms: Symptoms::default(),
            supplements: Supplements::default(),
            manual_override: ManualOverride::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Field-level merge: every field present in `patch` overwrites, absent
    /// fields keep their stored value.
    pub fn apply(&mut self, patch: &EntryPatch, now: DateTime<Utc>) {
        if let Some(m) = &patch.metrics {
            self.metrics.merge(m);
        }
        if let Some(s) = &patch.symptoms {
            self.symptoms.merge(s);
        }
        if let Some(s) = &patch.supplements {
            self.supplements.merge(s);
        }
        if let Some(o) = &patch.manual_override {
            self.manual_override.merge(o);
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "must be 0 or greater"))]
    pub steps: Option<i32>,

    /// Hours slept, fractional (7.5).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 24.0, message = "must be between 0 and 24"))]
    pub sleep_hours: Option<f64>,

    /// Heart-rate variability in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, message = "must be 0 or greater"))]
    pub hrv: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "must be 0 or greater"))]
    pub mindfulness_min: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "must be 0 or greater"))]
    pub water_ml: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub mood: Option<i32>,
}

impl Metrics {
    fn merge(&mut self, patch: &Metrics) {
        overwrite(&mut self.steps, &patch.steps);
        overwrite(&mut self.sleep_hours, &patch.sleep_hours);
        overwrite(&mut self.hrv, &patch.hrv);
        overwrite(&mut self.mindfulness_min, &patch.mindfulness_min);
        overwrite(&mut self.water_ml, &patch.water_ml);
        overwrite(&mut self.mood, &patch.mood);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Symptoms {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "must be 0 or greater"))]
    pub hot_flash_count: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub hot_flash_intensity_avg: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub night_sweats: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, max = 5, message = "must be between 0 and 5"))]
    pub dryness_level: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub notes: Option<String>,
}

impl Symptoms {
    fn merge(&mut self, patch: &Symptoms) {
        overwrite(&mut self.hot_flash_count, &patch.hot_flash_count);
        overwrite(&mut self.hot_flash_intensity_avg, &patch.hot_flash_intensity_avg);
        overwrite(&mut self.night_sweats, &patch.night_sweats);
        overwrite(&mut self.dryness_level, &patch.dryness_level);
        overwrite(&mut self.notes, &patch.notes);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Supplements {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "must be 0 or greater"))]
    pub glycine_mg: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, message = "must be 0 or greater"))]
    pub magnesium_mg: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collagen: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub omega3: Option<bool>,
}

impl Supplements {
    fn merge(&mut self, patch: &Supplements) {
        overwrite(&mut self.glycine_mg, &patch.glycine_mg);
        overwrite(&mut self.magnesium_mg, &patch.magnesium_mg);
        overwrite(&mut self.collagen, &patch.collagen);
        overwrite(&mut self.omega3, &patch.omega3);
    }
}

/// Marks metrics the user typed in by hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ManualOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[sqlx(rename = "override_steps")]
    pub steps: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[sqlx(rename = "override_sleep_hours")]
    pub sleep_hours: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[sqlx(rename = "override_hrv")]
    pub hrv: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[sqlx(rename = "override_mindfulness_min")]
    pub mindfulness_min: Option<bool>,
}

impl ManualOverride {
    fn merge(&mut self, patch: &ManualOverride) {
        overwrite(&mut self.steps, &patch.steps);
        overwrite(&mut self.sleep_hours, &patch.sleep_hours);
        overwrite(&mut self.hrv, &patch.hrv);
        overwrite(&mut self.mindfulness_min, &patch.mindfulness_min);
    }
}

fn overwrite<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if let Some(v) = value {
        *slot = Some(v.clone());
    }
}

/// Partial write for `POST /daily/:date`.
///
/// Every group and every field is optional; `null` counts as absent.
/// Unknown keys are ignored. `symptoms` is also accepted under its legacy
/// key `menopause`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[validate]
    pub metrics: Option<Metrics>,

    #[validate]
    #[serde(alias = "menopause")]
    pub symptoms: Option<Symptoms>,

    #[validate]
    pub supplements: Option<Supplements>,

    pub manual_override: Option<ManualOverride>,
}

#[derive(Debug, Deserialize)]
pub struct DailyRangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_merges_fields_without_clearing_others() {
        let now = Utc::now();
        let mut entry = DailyEntry::new(Uuid::new_v4(), "2025-06-01", now);

        let first: EntryPatch = serde_json::from_value(json!({ "metrics": { "mood": 4 } })).unwrap();
        let second: EntryPatch =
            serde_json::from_value(json!({ "metrics": { "sleepHours": 7.0 } })).unwrap();
        entry.apply(&first, now);
        entry.apply(&second, now);

        assert_eq!(entry.metrics.mood, Some(4));
        assert_eq!(entry.metrics.sleep_hours, Some(7.0));
    }

    #[test]
    fn legacy_menopause_key_maps_to_symptoms() {
        let patch: EntryPatch = serde_json::from_value(json!({
            "menopause": { "hotFlashCount": 3, "nightSweats": true }
        }))
        .unwrap();
        let symptoms = patch.symptoms.unwrap();
        assert_eq!(symptoms.hot_flash_count, Some(3));
        assert_eq!(symptoms.night_sweats, Some(true));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let patch: EntryPatch = serde_json::from_value(json!({
            "metrics": { "steps": 1200, "vo2max": 41 },
            "futureGroup": { "x": 1 }
        }))
        .unwrap();
        assert_eq!(patch.metrics.unwrap().steps, Some(1200));
    }

    #[test]
    fn serialized_entry_omits_absent_fields() {
        let mut entry = DailyEntry::new(Uuid::new_v4(), "2025-06-01", Utc::now());
        entry.metrics.sleep_hours = Some(7.5);

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["date"], "2025-06-01");
        assert_eq!(value["metrics"], json!({ "sleepHours": 7.5 }));
        assert!(value.get("userId").is_some());
    }
}
