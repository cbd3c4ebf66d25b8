use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::jwt::verify_token;
use crate::error::AppError;

/// Identity resolved for the current request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Rejects the request with 401 unless it carries a valid session token.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AppError::Unauthorized)?;
    let token_data = verify_token(bearer.token(), &state.config)?;

    req.extensions_mut().insert(AuthUser {
        id: token_data.claims.sub,
    });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::jwt::create_session_token;
    use crate::config::Config;
    use crate::db::MemoryStore;
    use crate::services::oauth::testing::StubProvider;

    async fn whoami(Extension(user): Extension<AuthUser>) -> String {
        user.id.to_string()
    }

    fn router(config: Arc<Config>) -> Router {
        let state = AppState::new(MemoryStore::new(), Arc::new(StubProvider::default()), config);
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), require_auth))
            .with_state(state)
    }

    fn request(authorization: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn token_subject_becomes_the_request_identity() {
        let config = Arc::new(Config::for_tests());
        let user_id = Uuid::new_v4();
        let token = create_session_token(user_id, "jane@example.com", &config).unwrap();

        let response = router(config)
            .oneshot(request(Some(format!("Bearer {token}"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, user_id.to_string().as_bytes());
    }

    #[tokio::test]
    async fn missing_or_foreign_scheme_is_unauthorized() {
        let config = Arc::new(Config::for_tests());
        for authorization in [None, Some("Basic amFuZTpwdw==".to_string())] {
            let response = router(config.clone())
                .oneshot(request(authorization))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
