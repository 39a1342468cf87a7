//! # Shared Record Handlers
//!
//! The product, category and discount routers expose the same five
//! operations. Their handlers unwrap extractors and delegate here; this
//! module owns the HTTP shape of each operation (status codes, `ETag`,
//! `Location`, the expected-version rules).

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use stockroom_core::query::{DEFAULT_LIMIT, MAX_LIMIT};
use stockroom_core::{Cursor, Direction, Entity, Order, Page, Query, Record, RecordId, SortField};
use stockroom_store::DeleteMode;
use utoipa::{IntoParams, ToSchema};

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{etag, expected_version, if_match};
use crate::service::RecordService;

// ── Request types ───────────────────────────────────────────────────

/// Ordering and pagination of a list request.
///
/// `offset` and `cursor` are mutually exclusive. Without either, the
/// first cursor page is returned.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Window {
    /// Page size, 1 to 500 (default 50).
    pub limit: Option<u32>,
    /// Rows to skip (offset pagination).
    pub offset: Option<u64>,
    /// `next_cursor` of the previous page (keyset pagination).
    pub cursor: Option<String>,
    /// `id` (default), `created_at` or `updated_at`.
    #[param(value_type = Option<String>)]
    pub order: Option<SortField>,
    /// `asc` (default) or `desc`.
    #[param(value_type = Option<String>)]
    pub direction: Option<Direction>,
}

impl Window {
    /// Combine with a filter into a repository query.
    pub fn into_query<F>(self, filter: F) -> Result<Query<F>, AppError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > MAX_LIMIT {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        let order = Order::new(
            self.order.unwrap_or_default(),
            self.direction.unwrap_or_default(),
        );
        let query = Query::new(filter).ordered(order);

        match (self.offset, self.cursor) {
            (Some(_), Some(_)) => Err(AppError::BadRequest(
                "offset and cursor are mutually exclusive".into(),
            )),
            (Some(offset), None) => Ok(query.offset(offset, limit)),
            (None, cursor) => {
                let after = cursor
                    .map(|token| Cursor::decode(&token, order))
                    .transpose()?;
                Ok(query.after(after, limit))
            }
        }
    }
}

/// PATCH body: the entity's patch fields plus an optional
/// `expected_version`, used when no `If-Match` header is sent.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest<P> {
    pub expected_version: Option<u64>,
    #[serde(flatten)]
    pub patch: P,
}

/// DELETE query parameters.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteParams {
    /// Version the caller last saw. May be sent as `If-Match` instead.
    pub expected_version: Option<u64>,
    /// Remove the row instead of marking it deleted. Requires ADMIN.
    #[serde(default)]
    pub hard: bool,
}

/// A page of records as returned by list endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct PageDoc {
    /// Records, each with `id`, `organization_id`, `version`,
    /// `created_at`, `updated_at` and the entity fields.
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<serde_json::Value>,
    pub next_cursor: Option<String>,
    pub next_offset: Option<u64>,
}

// ── Operations ──────────────────────────────────────────────────────

fn record_response<E: Serialize>(status: StatusCode, record: &Record<E>) -> Response {
    (status, [(header::ETAG, etag(record.version))], Json(record)).into_response()
}

pub async fn create<E: Entity>(
    service: &RecordService<E>,
    caller: &Caller,
    collection: &str,
    fields: E,
) -> Result<Response, AppError> {
    let record = service.create(caller.principal(), fields).await?;
    let mut response = record_response(StatusCode::CREATED, &record);
    if let Ok(location) = HeaderValue::from_str(&format!("{collection}/{}", record.id)) {
        response.headers_mut().insert(header::LOCATION, location);
    }
    Ok(response)
}

pub async fn read<E: Entity>(
    service: &RecordService<E>,
    caller: &Caller,
    id: RecordId,
) -> Result<Response, AppError> {
    let record = service.read(caller.principal(), id).await?;
    Ok(record_response(StatusCode::OK, &record))
}

pub async fn update<E: Entity>(
    service: &RecordService<E>,
    caller: &Caller,
    id: RecordId,
    headers: &HeaderMap,
    request: UpdateRequest<E::Patch>,
) -> Result<Response, AppError> {
    let expected = expected_version(if_match(headers)?, request.expected_version)?;
    let record = service
        .update(caller.principal(), id, expected, request.patch)
        .await?;
    Ok(record_response(StatusCode::OK, &record))
}

pub async fn delete<E: Entity>(
    service: &RecordService<E>,
    caller: &Caller,
    id: RecordId,
    headers: &HeaderMap,
    params: DeleteParams,
) -> Result<StatusCode, AppError> {
    let expected = expected_version(if_match(headers)?, params.expected_version)?;
    let mode = if params.hard {
        DeleteMode::Hard
    } else {
        DeleteMode::Soft
    };
    service
        .delete(caller.principal(), id, expected, mode)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list<E: Entity>(
    service: &RecordService<E>,
    caller: &Caller,
    window: Window,
    filter: E::Filter,
) -> Result<Json<Page<Record<E>>>, AppError> {
    let query = window.into_query(filter)?;
    let page = service.query(caller.principal(), &query).await?;
    Ok(Json(page))
}
