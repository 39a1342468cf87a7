//! # Discounts API
//!
//! ## Endpoints
//!
//! - `POST /v1/discounts`: create discount
//! - `GET /v1/discounts`: list discounts (`q`, `active`, `kind`, `in_effect_on`)
//! - `GET /v1/discounts/:id`: get discount
//! - `PATCH /v1/discounts/:id`: update discount (`If-Match` or `expected_version`)
//! - `DELETE /v1/discounts/:id`: delete discount (`expected_version`, `hard`)

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use stockroom_core::{Page, Discount, DiscountFilter, DiscountPatch, Record, RecordId};

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_path, extract_query};
use crate::routes::common::{self, DeleteParams, UpdateRequest, Window};
use crate::state::AppState;

const COLLECTION: &str = "/v1/discounts";

/// Build the discounts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/discounts", get(list_discounts).post(create_discount))
        .route(
            "/v1/discounts/:id",
            get(get_discount).patch(update_discount).delete(delete_discount),
        )
}

/// POST /v1/discounts: Create a discount.
#[utoipa::path(
    post,
    path = "/v1/discounts",
    request_body = Discount,
    responses(
        (status = 201, description = "Discount created; body is the record with envelope fields", body = Discount),
        (status = 400, description = "Malformed JSON", body = crate::error::ErrorBody),
        (status = 409, description = "Duplicate name", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "discounts"
)]
pub async fn create_discount(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<Discount>, JsonRejection>,
) -> Result<Response, AppError> {
    let discount = extract_json(body)?;
    common::create(&state.discounts, &caller, COLLECTION, discount).await
}

/// GET /v1/discounts: List discounts.
#[utoipa::path(
    get,
    path = "/v1/discounts",
    params(
        Window,
        ("q" = Option<String>, Query, description = "Substring of name"),
        ("active" = Option<bool>, Query, description = "Active flag"),
        ("kind" = Option<String>, Query, description = "`percentage` or `fixed_amount`"),
        ("in_effect_on" = Option<String>, Query, description = "Day (YYYY-MM-DD) the discount must cover"),
    ),
    responses(
        (status = 200, description = "Page of discounts", body = crate::routes::common::PageDoc),
        (status = 400, description = "Bad pagination or filter", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "discounts"
)]
pub async fn list_discounts(
    State(state): State<AppState>,
    caller: Caller,
    window: Result<Query<Window>, QueryRejection>,
    filter: Result<Query<DiscountFilter>, QueryRejection>,
) -> Result<Json<Page<Record<Discount>>>, AppError> {
    let window = extract_query(window)?;
    let filter = extract_query(filter)?;
    common::list(&state.discounts, &caller, window, filter).await
}

/// GET /v1/discounts/:id: Get a discount.
#[utoipa::path(
    get,
    path = "/v1/discounts/{id}",
    params(("id" = String, Path, description = "Discount id")),
    responses(
        (status = 200, description = "Discount found; ETag carries the version", body = Discount),
        (status = 404, description = "Discount not found", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "discounts"
)]
pub async fn get_discount(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<RecordId>, PathRejection>,
) -> Result<Response, AppError> {
    let id = extract_path(id)?;
    common::read(&state.discounts, &caller, id).await
}

/// PATCH /v1/discounts/:id: Update a discount.
#[utoipa::path(
    patch,
    path = "/v1/discounts/{id}",
    params(("id" = String, Path, description = "Discount id")),
    request_body(content = DiscountPatch, description = "Fields to change, optionally with expected_version"),
    responses(
        (status = 200, description = "Discount updated", body = Discount),
        (status = 404, description = "Discount not found", body = crate::error::ErrorBody),
        (status = 409, description = "Version conflict or duplicate", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
        (status = 428, description = "No expected version supplied", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "discounts"
)]
pub async fn update_discount(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<RecordId>, PathRejection>,
    headers: HeaderMap,
    body: Result<Json<UpdateRequest<DiscountPatch>>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = extract_path(id)?;
    let request = extract_json(body)?;
    common::update(&state.discounts, &caller, id, &headers, request).await
}

/// DELETE /v1/discounts/:id: Delete a discount.
#[utoipa::path(
    delete,
    path = "/v1/discounts/{id}",
    params(("id" = String, Path, description = "Discount id"), DeleteParams),
    responses(
        (status = 204, description = "Discount deleted"),
        (status = 403, description = "Hard delete without ADMIN", body = crate::error::ErrorBody),
        (status = 404, description = "Discount not found", body = crate::error::ErrorBody),
        (status = 409, description = "Version conflict", body = crate::error::ErrorBody),
        (status = 428, description = "No expected version supplied", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "discounts"
)]
pub async fn delete_discount(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<RecordId>, PathRejection>,
    headers: HeaderMap,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<StatusCode, AppError> {
    let id = extract_path(id)?;
    let params = extract_query(params)?;
    common::delete(&state.discounts, &caller, id, &headers, params).await
}
