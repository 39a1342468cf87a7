//! # Custom Extractors
//!
//! Helpers that turn axum's extractor rejections into [`AppError`]s with
//! the standard JSON error body, plus `ETag`/`If-Match` handling for the
//! record version.
//!
//! Handlers take `Result<Json<T>, JsonRejection>` (and the `Path`/`Query`
//! equivalents) and unwrap it with these helpers:
//! ```ignore
//! async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
//!     let req = extract_json(body)?;
//! }
//! ```

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::Json;
use stockroom_core::Version;

use crate::error::AppError;

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract path parameters, mapping parse errors to [`AppError::BadRequest`].
pub fn extract_path<T>(result: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    result
        .map(|Path(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract query parameters, mapping parse errors to [`AppError::BadRequest`].
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Strong entity tag for a record version: `"3"`.
pub fn etag(version: Version) -> HeaderValue {
    HeaderValue::from_str(&format!("\"{version}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("\"0\""))
}

/// Parse `If-Match` into a version, if the header is present.
///
/// Accepts `"N"`, `W/"N"` and a bare `N`. A list of tags or `*` is
/// rejected: a write must name exactly one version.
pub fn if_match(headers: &HeaderMap) -> Result<Option<Version>, AppError> {
    let Some(raw) = headers.get(header::IF_MATCH) else {
        return Ok(None);
    };
    let value = raw
        .to_str()
        .map_err(|_| AppError::BadRequest("If-Match is not valid ASCII".into()))?
        .trim();
    let tag = value.strip_prefix("W/").unwrap_or(value);
    let tag = tag
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(tag);
    tag.parse::<u64>()
        .map(|n| Some(Version(n)))
        .map_err(|_| AppError::BadRequest(format!("If-Match must be a single version tag, got {value}")))
}

/// Pick the expected version from `If-Match` or the request's own field.
///
/// Both may be given only if they agree. Neither is a 428.
pub fn expected_version(
    header: Option<Version>,
    field: Option<u64>,
) -> Result<Version, AppError> {
    match (header, field.map(Version)) {
        (Some(h), Some(f)) if h != f => Err(AppError::BadRequest(format!(
            "If-Match {h} disagrees with expected_version {f}"
        ))),
        (Some(v), _) | (None, Some(v)) => Ok(v),
        (None, None) => Err(AppError::PreconditionRequired(
            "supply the expected version as If-Match or expected_version".into(),
        )),
    }
}
