use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{self, rate_limit::RateLimitState};
use crate::config::Config;
use crate::db::{EntryStore, LinkStore, UserStore};
use crate::handlers;
use crate::providers::ProviderApi;
use crate::services::oauth::OAuthFlow;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserStore>,
    pub entries: Arc<dyn EntryStore>,
    pub oauth: OAuthFlow,
    pub rate_limiter: RateLimitState,
}

impl AppState {
    /// Wires every store seam to one backend.
    pub fn new<S>(store: S, provider: Arc<dyn ProviderApi>, config: Arc<Config>) -> Self
    where
        S: UserStore + EntryStore + LinkStore + Clone + 'static,
    {
        let users: Arc<dyn UserStore> = Arc::new(store.clone());
        let links: Arc<dyn LinkStore> = Arc::new(store.clone());
        let oauth = OAuthFlow::new(users.clone(), links, provider, config.oauth_state_ttl_secs);

        Self {
            users,
            entries: Arc::new(store),
            oauth,
            rate_limiter: RateLimitState::new(),
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_auth,
        ));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/oura/connect", get(handlers::oura::connect))
        .route("/oura/callback", get(handlers::oura::callback))
        .route("/oura/pull", get(handlers::oura::pull))
        .merge(auth_routes);

    let protected_routes = Router::new()
        .route("/daily", get(handlers::daily::list_entries))
        .route("/daily/:date", post(handlers::daily::upsert_entry))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let cors = cors_layer(&state.config);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    if config.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}
