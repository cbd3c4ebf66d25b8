use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crate::app::AppState;
use crate::error::AppError;

/// Rate limiter configuration
const MAX_REQUESTS: u32 = 10; // Max requests per window
const WINDOW_SECS: u64 = 60; // Window duration in seconds

/// In-memory fixed-window limiter (single-instance deployments).
#[derive(Clone, Default)]
pub struct RateLimitState {
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

impl RateLimitState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ok(remaining) when allowed, Err(retry_after) when limited.
    pub async fn check(&self, key: &str) -> Result<u32, Duration> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(WINDOW_SECS);

        // Drop stale keys so the map stays bounded by active clients.
        entries.retain(|_, e| now.duration_since(e.window_start) < window * 2);

        let entry = entries.entry(key.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) > window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= MAX_REQUESTS {
            let retry_after = window.saturating_sub(now.duration_since(entry.window_start));
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(MAX_REQUESTS - entry.count)
    }
}

/// Rate limiting middleware for the login route.
pub async fn rate_limit_auth(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = addr.ip().to_string();
    let path = req.uri().path().to_string();
    let key = format!("{}:{}", ip, path);

    match state.rate_limiter.check(&key).await {
        Ok(remaining) => {
            tracing::debug!(ip = %ip, path = %path, remaining = remaining, "Rate limit check passed");
            Ok(next.run(req).await)
        }
        Err(retry_after) => {
            tracing::warn!(
                ip = %ip,
                path = %path,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            Err(AppError::RateLimited)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limit_allows_under_limit() {
        let limiter = RateLimitState::new();

        for i in 0..MAX_REQUESTS {
            let result = limiter.check("test_key").await;
            assert!(result.is_ok(), "Request {} should be allowed", i + 1);
        }
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_over_limit() {
        let limiter = RateLimitState::new();

        for _ in 0..MAX_REQUESTS {
            let _ = limiter.check("test_key").await;
        }

        let result = limiter.check("test_key").await;
        assert!(result.is_err(), "Request over limit should be blocked");
    }

    #[tokio::test]
    async fn test_different_keys_have_separate_limits() {
        let limiter = RateLimitState::new();

        for _ in 0..MAX_REQUESTS {
            let _ = limiter.check("key1").await;
        }

        let result = limiter.check("key2").await;
        assert!(result.is_ok(), "Different key should have separate limit");
    }
}
