use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult, FieldIssue};
use crate::models::daily_entry::{DailyRangeQuery, SortOrder};
use crate::validation::{validate_range, validate_write};

/// `POST /daily/:date`: upsert-merge the caller's entry for one day.
pub async fn upsert_entry(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(date): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let body = payload
        .map(|Json(raw)| raw)
        .map_err(|e| FieldIssue::new("body", e.body_text()));
    let patch = validate_write(&date, body)?;

    let entry = state.entries.upsert_entry(auth_user.id, &date, &patch).await?;
    tracing::debug!(user_id = %auth_user.id, date = %date, "Daily entry upserted");

    Ok(Json(json!({ "ok": true, "data": entry })))
}

/// `GET /daily?from=&to=[&order=desc]`: the caller's entries in `[from, to]`.
pub async fn list_entries(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    query: Result<Query<DailyRangeQuery>, QueryRejection>,
) -> AppResult<Json<Value>> {
    let Query(query) = query.map_err(|e| AppError::invalid("query", e.body_text()))?;
    let range = validate_range(query)?;

    let mut entries = state
        .entries
        .query_range(auth_user.id, &range.from, &range.to)
        .await?;
    if range.order == SortOrder::Desc {
        entries.reverse();
    }

    Ok(Json(json!({
        "ok": true,
        "count": entries.len(),
        "data": entries,
    })))
}
