//! # Bearer Authentication Middleware
//!
//! Verifies `Authorization: Bearer <jwt>` against the [`Authenticator`]
//! found in request extensions and injects the resulting [`Caller`].
//! Handlers take `Caller` as an extractor; authorization per operation
//! happens in the service layer.
//!
//! A rejected token always yields the same 401 body. The specific reason
//! goes to the log (never the token itself) and to the
//! `stockroom_auth_failures_total` counter.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use stockroom_auth::{AuthError, Authenticator, Principal};

use crate::error::{AppError, ErrorBody, ErrorDetail};
use crate::middleware::metrics::ApiMetrics;

// ── Caller ──────────────────────────────────────────────────────────────────

/// The authenticated principal of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Principal);

impl Caller {
    pub fn principal(&self) -> &Principal {
        &self.0
    }

    /// Key identifying this caller across requests.
    pub fn key(&self) -> String {
        format!("{}|{}", self.0.issuer, self.0.subject)
    }
}

/// Extracts the caller that [`auth_middleware`] injected into extensions.
/// Returns 401 if no caller is present (middleware didn't run or failed).
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

// ── Token extraction ────────────────────────────────────────────────────────

/// Pull the token out of an `Authorization` header value.
fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Metric label for a verification failure.
fn failure_reason(err: &AuthError) -> &'static str {
    match err {
        AuthError::Malformed(_) => "malformed",
        AuthError::InvalidSignature => "invalid_signature",
        AuthError::Expired => "expired",
        AuthError::UnknownIssuer(_) => "unknown_issuer",
        AuthError::InvalidClaims(_) => "invalid_claims",
        AuthError::Encoding(_) => "encoding",
    }
}

// ── Middleware ──────────────────────────────────────────────────────────────

/// Authenticate the request or answer 401.
///
/// Requires an `Arc<Authenticator>` extension. Without one every request
/// is rejected; there is no unauthenticated mode.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let authenticator = request.extensions().get::<Arc<Authenticator>>().cloned();
    let metrics = request.extensions().get::<ApiMetrics>().cloned();

    let Some(authenticator) = authenticator else {
        tracing::error!("authentication failed: no authenticator configured");
        return unauthorized_response("authentication is not configured");
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = match header_value {
        Some(value) => match bearer_token(value) {
            Some(token) => token,
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                record_failure(metrics.as_ref(), "scheme");
                return unauthorized_response("authorization header must use Bearer scheme");
            }
        },
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            record_failure(metrics.as_ref(), "missing");
            return unauthorized_response("missing authorization header");
        }
    };

    match authenticator.authenticate(token) {
        Ok(principal) => {
            tracing::debug!(subject = %principal.subject, issuer = %principal.issuer, "authenticated");
            request.extensions_mut().insert(Caller(principal));
            next.run(request).await
        }
        Err(err) => {
            let reason = failure_reason(&err);
            tracing::warn!(reason, error = %err, "authentication failed: token rejected");
            record_failure(metrics.as_ref(), reason);
            unauthorized_response("invalid bearer token")
        }
    }
}

fn record_failure(metrics: Option<&ApiMetrics>, reason: &str) {
    if let Some(metrics) = metrics {
        metrics.record_auth_failure(reason);
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(body),
    )
        .into_response()
}
