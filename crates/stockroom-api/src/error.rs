//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps service, authentication and request-parsing failures to stable
//! HTTP status codes and machine-readable error codes. Storage detail is
//! logged and never returned to clients.
//!
//! | Variant | Status | Code |
//! |---------|--------|------|
//! | `BadRequest` | 400 | `BAD_REQUEST` |
//! | `Unauthorized` | 401 | `UNAUTHORIZED` |
//! | `Forbidden` | 403 | `FORBIDDEN` |
//! | `NotFound` | 404 | `NOT_FOUND` |
//! | `VersionConflict` | 409 | `VERSION_CONFLICT` |
//! | `Duplicate` | 409 | `DUPLICATE` |
//! | `Validation` | 422 | `VALIDATION_ERROR` |
//! | `PreconditionRequired` | 428 | `PRECONDITION_REQUIRED` |
//! | `RateLimited` | 429 | `RATE_LIMITED` |
//! | `Internal` | 500 | `INTERNAL_ERROR` |
//! | `ServiceUnavailable` | 503 | `SERVICE_UNAVAILABLE` |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use stockroom_auth::{AuthError, Denied};
use stockroom_core::{CursorError, ValidationErrors, Version};
use thiserror::Error;
use utoipa::ToSchema;

use crate::service::ServiceError;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API surface.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Field map for validation errors, versions for conflicts, the
    /// offending field for duplicates. Never present on 5xx responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found, or owned by another organization (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Payload failed entity validation (422).
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Request body, path or query could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing, malformed or untrusted bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated caller may not perform the operation (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The supplied version is not the stored one (409).
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: Version, actual: Version },

    /// A per-organization unique field collides with a live record (409).
    #[error("duplicate value for {field}")]
    Duplicate { field: String },

    /// A write was sent without an expected version (428).
    #[error("precondition required: {0}")]
    PreconditionRequired(String),

    /// Caller exceeded its request budget (429).
    #[error("rate limit exceeded")]
    RateLimited,

    /// A dependency the request needs is down (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::VersionConflict { .. } => (StatusCode::CONFLICT, "VERSION_CONFLICT"),
            Self::Duplicate { .. } => (StatusCode::CONFLICT, "DUPLICATE"),
            Self::PreconditionRequired(_) => {
                (StatusCode::PRECONDITION_REQUIRED, "PRECONDITION_REQUIRED")
            }
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            Self::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation(errors) => serde_json::to_value(errors).ok(),
            Self::VersionConflict { expected, actual } => Some(serde_json::json!({
                "expected": expected.get(),
                "actual": actual.get(),
            })),
            Self::Duplicate { field } => Some(serde_json::json!({ "field": field })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Denied(denied) => denied.into(),
            ServiceError::Invalid(errors) => Self::Validation(errors),
            ServiceError::NotFound { kind, id } => Self::NotFound(format!("{kind} {id}")),
            ServiceError::Conflict { expected, actual } => {
                Self::VersionConflict { expected, actual }
            }
            ServiceError::Duplicate { field } => Self::Duplicate { field },
            ServiceError::InvalidQuery(msg) => Self::BadRequest(msg),
            ServiceError::Storage(msg) => Self::Internal(msg),
        }
    }
}

impl From<Denied> for AppError {
    fn from(err: Denied) -> Self {
        Self::Forbidden(err.reason)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        Self::Unauthorized(err.to_string())
    }
}

impl From<CursorError> for AppError {
    fn from(err: CursorError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::{EntityKind, RecordId};

    #[test]
    fn not_found_status_code() {
        let err = AppError::NotFound("product 123".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn validation_status_code() {
        let err = AppError::Validation(ValidationErrors::single("name", "must not be blank"));
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn bad_request_status_code() {
        let err = AppError::BadRequest("malformed JSON".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn unauthorized_status_code() {
        let err = AppError::Unauthorized("no token".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "UNAUTHORIZED");
    }

    #[test]
    fn forbidden_status_code() {
        let err = AppError::Forbidden("missing permission PRODUCT_WRITE".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "FORBIDDEN");
    }

    #[test]
    fn conflict_and_duplicate_share_status_but_not_code() {
        let conflict = AppError::VersionConflict {
            expected: Version(1),
            actual: Version(2),
        };
        let duplicate = AppError::Duplicate {
            field: "sku".into(),
        };
        assert_eq!(
            conflict.status_and_code(),
            (StatusCode::CONFLICT, "VERSION_CONFLICT")
        );
        assert_eq!(duplicate.status_and_code(), (StatusCode::CONFLICT, "DUPLICATE"));
    }

    #[test]
    fn precondition_and_rate_limit_status_codes() {
        assert_eq!(
            AppError::PreconditionRequired("x".into()).status_and_code().0,
            StatusCode::PRECONDITION_REQUIRED
        );
        assert_eq!(
            AppError::RateLimited.status_and_code().0,
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn internal_status_code() {
        let err = AppError::Internal("db connection failed".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
    }

    #[test]
    fn service_errors_translate() {
        let id = RecordId::new();
        let not_found = AppError::from(ServiceError::NotFound {
            kind: EntityKind::Product,
            id,
        });
        assert!(matches!(not_found, AppError::NotFound(ref m) if m.contains(&id.to_string())));

        let denied = AppError::from(ServiceError::Denied(Denied {
            reason: "token carries no organization".into(),
        }));
        assert_eq!(denied.status_and_code().0, StatusCode::FORBIDDEN);

        let storage = AppError::from(ServiceError::Storage("pool timed out".into()));
        assert_eq!(storage.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn auth_error_becomes_unauthorized() {
        let err = AppError::from(AuthError::Expired);
        assert_eq!(err.status_and_code().1, "UNAUTHORIZED");
    }

    #[test]
    fn cursor_error_becomes_bad_request() {
        let err = AppError::from(CursorError::Malformed);
        assert_eq!(err.status_and_code().1, "BAD_REQUEST");
    }

    #[test]
    fn error_body_serializes_without_details() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "TEST".to_string(),
                message: "test message".to_string(),
                details: None,
            },
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("TEST"));
        assert!(!json.contains("details"));
    }

    // ── into_response tests ──────────────────────────────────────

    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn into_response_validation_carries_field_map() {
        let mut errors = ValidationErrors::new();
        errors.add("sku", "must be between 2 and 20 characters");
        errors.add("retail_price", "must be at least 0.01");
        let (status, body) = response_parts(AppError::Validation(errors)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error.code, "VALIDATION_ERROR");
        let details = body.error.details.unwrap();
        assert_eq!(details["sku"], "must be between 2 and 20 characters");
        assert_eq!(details["retail_price"], "must be at least 0.01");
    }

    #[tokio::test]
    async fn into_response_conflict_carries_versions() {
        let (status, body) = response_parts(AppError::VersionConflict {
            expected: Version(1),
            actual: Version(2),
        })
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let details = body.error.details.unwrap();
        assert_eq!(details["expected"], 1);
        assert_eq!(details["actual"], 2);
    }

    #[tokio::test]
    async fn into_response_duplicate_names_field() {
        let (_, body) = response_parts(AppError::Duplicate {
            field: "barcode".into(),
        })
        .await;
        assert_eq!(body.error.code, "DUPLICATE");
        assert_eq!(body.error.details.unwrap()["field"], "barcode");
    }

    #[tokio::test]
    async fn into_response_not_found() {
        let (status, body) = response_parts(AppError::NotFound("product 123".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.error.message.contains("product 123"));
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(
            !body.error.message.contains("db connection"),
            "internal error details must not leak: {}",
            body.error.message
        );
        assert_eq!(body.error.message, "An internal error occurred");
        assert!(body.error.details.is_none());
    }
}
