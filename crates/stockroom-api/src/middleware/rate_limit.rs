//! # Per-Caller Rate Limiting
//!
//! Fixed-window counter keyed by the authenticated caller (issuer and
//! subject). Runs inside the auth middleware so every request it sees
//! carries a [`Caller`]. State is in-process; each replica limits
//! independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;

use crate::auth::Caller;
use crate::error::AppError;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u64,
    /// Window length.
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn per_minute(max_requests: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(600)
    }
}

#[derive(Debug, Clone)]
struct BucketState {
    count: u64,
    window_start: Instant,
}

/// Shared rate limiter state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<Mutex<HashMap<String, BucketState>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request for `key` at `now`.
    ///
    /// Returns `Err(retry_after)` when the window's budget is spent.
    fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut buckets = self.buckets.lock();

        // Drop idle buckets so the map does not grow without bound.
        if buckets.len() > 10_000 {
            let window = self.config.window;
            buckets.retain(|_, b| now.duration_since(b.window_start) < window);
        }

        let bucket = buckets.entry(key.to_string()).or_insert(BucketState {
            count: 0,
            window_start: now,
        });

        let elapsed = now.duration_since(bucket.window_start);
        if elapsed >= self.config.window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= self.config.max_requests {
            Err(self.config.window.saturating_sub(elapsed))
        } else {
            bucket.count += 1;
            Ok(())
        }
    }

    fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }
}

/// Middleware that enforces per-caller rate limits.
///
/// Requests without a [`Caller`] share the `"anonymous"` bucket.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let limiter = request.extensions().get::<RateLimiter>().cloned();

    if let Some(limiter) = limiter {
        let key = request
            .extensions()
            .get::<Caller>()
            .map(Caller::key)
            .unwrap_or_else(|| "anonymous".to_string());

        if let Err(retry_after) = limiter.check(&key) {
            tracing::warn!(caller = %key, "rate limit exceeded");
            let mut response = AppError::RateLimited.into_response();
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after.as_secs().max(1)),
            );
            return response;
        }
    }

    next.run(request).await
}
