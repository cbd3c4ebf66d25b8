use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::providers::ProviderError;

/// One offending input field, named by its dotted camelCase path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed")]
    Validation(Vec<FieldIssue>),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldIssue::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Provider(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable error kind sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "Unauthorized",
            AppError::NotFound(_) => "NotFound",
            AppError::Validation(_) => "ValidationError",
            AppError::BadRequest(_) => "BadRequest",
            AppError::RateLimited => "RateLimited",
            AppError::Database(_) | AppError::Provider(_) | AppError::Internal(_) => {
                "ServerError"
            }
        }
    }

    /// Client-safe message. Server failures get an opaque message.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::Unauthorized | AppError::Validation(_) | AppError::RateLimited => {
                self.to_string()
            }
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".into(),
            AppError::Provider(_) => "Provider request failed".into(),
        }
    }

    /// Logs the full detail of server failures; client errors are not logged.
    pub fn log(&self) {
        match self {
            AppError::Database(e) => tracing::error!(error = %e, "Database error"),
            AppError::Provider(e) => tracing::error!(error = %e, "Provider error"),
            AppError::Internal(e) => tracing::error!(error = %e, "Internal error"),
            _ => {}
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();
        let message = self.public_message();

        let mut body = json!({
            "ok": false,
            "error": self.kind(),
            "message": message,
        });
        if let AppError::Validation(issues) = &self {
            body["details"] = json!(issues);
        }

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_lists_every_field() {
        let err = AppError::Validation(vec![
            FieldIssue::new("metrics.mood", "mood must be between 1 and 5"),
            FieldIssue::new("metrics.steps", "steps must be 0 or greater"),
        ]);
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "ValidationError");
        assert_eq!(body["details"].as_array().unwrap().len(), 2);
        assert_eq!(body["details"][0]["field"], "metrics.mood");
    }

    #[tokio::test]
    async fn server_errors_are_opaque() {
        let err = AppError::Internal(anyhow::anyhow!("access_token=secret leaked"));
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "ServerError");
        assert!(!body.to_string().contains("secret"));
    }

    #[test]
    fn public_message_hides_server_detail() {
        let provider = AppError::Provider(ProviderError::Status {
            status: 401,
            body: "token revoked for jane@example.com".into(),
        });
        assert_eq!(provider.public_message(), "Provider request failed");
        assert_eq!(provider.kind(), "ServerError");

        let missing = AppError::NotFound("No oura link for user".into());
        assert_eq!(missing.public_message(), "No oura link for user");
    }
}
