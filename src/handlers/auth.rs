use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use validator::Validate;

use crate::app::AppState;
use crate::auth::jwt::create_session_token;
use crate::error::{AppError, AppResult};
use crate::models::user::{normalize_email, LoginRequest, LoginResponse};
use crate::validation::flatten_errors;

/// `POST /auth/login`: find-or-create by email and issue a session token.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(body) = payload.map_err(|e| AppError::invalid("body", e.body_text()))?;

    let body = LoginRequest {
        email: normalize_email(&body.email),
    };
    body.validate()
        .map_err(|errors| AppError::Validation(flatten_errors(&errors)))?;

    let user = state.users.find_or_create_by_email(&body.email).await?;
    let token = create_session_token(user.id, &user.email, &state.config)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse {
        ok: true,
        user_id: user.id,
        email: user.email,
        token,
        expires_in: state.config.jwt_ttl_secs,
    }))
}
