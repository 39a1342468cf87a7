//! # stockroom-api: HTTP Service for Stockroom
//!
//! Versioned CRUD over the catalog entities, scoped to the organization
//! named in the caller's bearer token, plus read access to the audit chain.
//!
//! ## API Surface
//!
//! | Prefix               | Module                   | Auth |
//! |----------------------|--------------------------|------|
//! | `/v1/products/*`     | [`routes::products`]     | yes  |
//! | `/v1/categories/*`   | [`routes::categories`]   | yes  |
//! | `/v1/discounts/*`    | [`routes::discounts`]    | yes  |
//! | `/v1/audit/*`        | [`routes::audit`]        | yes  |
//! | `/health/*`          | this module              | no   |
//! | `/metrics`           | this module              | no   |
//! | `/openapi.json`      | [`openapi`]              | no   |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! Extensions → TraceLayer → MetricsMiddleware → AuthMiddleware → RateLimitMiddleware → Handler
//! ```
//!
//! Auth runs before rate limiting, so rejected tokens never spend a
//! caller's budget and every bucket belongs to a verified principal.

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod service;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};

use crate::error::AppError;
use crate::middleware::tracing_layer;
use crate::state::AppState;

/// Largest accepted request body.
const BODY_LIMIT: usize = 1024 * 1024;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::products::router())
        .merge(routes::categories::router())
        .merge(routes::discounts::router())
        .merge(routes::audit::router())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(from_fn(auth::auth_middleware));

    let unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .merge(openapi::router());

    Router::new()
        .merge(unauthenticated)
        .merge(api)
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(tracing_layer::layer())
        .layer(Extension(state.limiter.clone()))
        .layer(Extension(state.metrics.clone()))
        .layer(Extension(state.authenticator.clone()))
        .with_state(state)
}

/// GET /metrics: Prometheus scrape endpoint.
async fn prometheus_metrics(State(state): State<AppState>) -> Result<Response, AppError> {
    let issuers = state.authenticator.trust().snapshot().len();
    state.metrics.trust_issuers().set(issuers as i64);

    let body = state.metrics.gather_and_encode().map_err(AppError::Internal)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response())
}

/// Liveness probe: 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 once the storage backend answers, else 503.
async fn readiness(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    if let Err(e) = state.products.ping().await {
        tracing::warn!(backend = state.backend.as_str(), error = %e, "readiness check failed");
        return Err(AppError::ServiceUnavailable(
            "storage backend unreachable".into(),
        ));
    }
    Ok(Json(serde_json::json!({
        "status": "ready",
        "backend": state.backend.as_str(),
    })))
}
