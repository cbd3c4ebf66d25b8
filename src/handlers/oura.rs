use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::models::provider_link::{CallbackQuery, UserIdQuery};

fn parse_user_id(query: &UserIdQuery) -> AppResult<Uuid> {
    let raw = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::invalid("userId", "is required"))?;

    Uuid::parse_str(raw).map_err(|_| AppError::invalid("userId", "must be a valid user id"))
}

/// `GET /oura/connect?userId=`: 302 to the provider's consent screen.
pub async fn connect(
    State(state): State<AppState>,
    Query(query): Query<UserIdQuery>,
) -> AppResult<Response> {
    let user_id = parse_user_id(&query)?;
    let url = state.oauth.connect(user_id).await?;

    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

/// `GET /oura/callback?code=&state=`: finishes the handshake; answers with
/// a page the user sees in their browser.
pub async fn callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Response {
    let result = state
        .oauth
        .callback(
            query.code.as_deref(),
            query.state.as_deref(),
            query.error.as_deref(),
        )
        .await;

    match result {
        Ok(_) => Html(page(
            "Oura connected",
            "You can close this tab and return to the app.",
        ))
        .into_response(),
        Err(err) => {
            err.log();
            let status = err.status();
            let message = err.public_message();
            (status, Html(page("Could not connect Oura", &message))).into_response()
        }
    }
}

/// `GET /oura/pull?userId=`: raw provider sleep data for the last 14 days.
pub async fn pull(
    State(state): State<AppState>,
    Query(query): Query<UserIdQuery>,
) -> AppResult<Json<Value>> {
    let user_id = parse_user_id(&query)?;
    let data = state.oauth.pull(user_id, Utc::now().date_naive()).await?;

    Ok(Json(json!({ "ok": true, "data": data })))
}

fn page(title: &str, message: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{message}</p></body></html>",
        title = html_escape::encode_text(title),
        message = html_escape::encode_text(message),
    )
}
