//! # Categories API
//!
//! ## Endpoints
//!
//! - `POST /v1/categories`: create category
//! - `GET /v1/categories`: list categories (`q`, `active`)
//! - `GET /v1/categories/:id`: get category
//! - `PATCH /v1/categories/:id`: update category (`If-Match` or `expected_version`)
//! - `DELETE /v1/categories/:id`: delete category (`expected_version`, `hard`)

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use stockroom_core::{Page, Category, CategoryFilter, CategoryPatch, Record, RecordId};

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_path, extract_query};
use crate::routes::common::{self, DeleteParams, UpdateRequest, Window};
use crate::state::AppState;

const COLLECTION: &str = "/v1/categories";

/// Build the categories router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/categories", get(list_categories).post(create_category))
        .route(
            "/v1/categories/:id",
            get(get_category).patch(update_category).delete(delete_category),
        )
}

/// POST /v1/categories: Create a category.
#[utoipa::path(
    post,
    path = "/v1/categories",
    request_body = Category,
    responses(
        (status = 201, description = "Category created; body is the record with envelope fields", body = Category),
        (status = 400, description = "Malformed JSON", body = crate::error::ErrorBody),
        (status = 409, description = "Duplicate code or name", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<Category>, JsonRejection>,
) -> Result<Response, AppError> {
    let category = extract_json(body)?;
    common::create(&state.categories, &caller, COLLECTION, category).await
}

/// GET /v1/categories: List categories.
#[utoipa::path(
    get,
    path = "/v1/categories",
    params(
        Window,
        ("q" = Option<String>, Query, description = "Substring of code or name"),
        ("active" = Option<bool>, Query, description = "Active flag"),
    ),
    responses(
        (status = 200, description = "Page of categories", body = crate::routes::common::PageDoc),
        (status = 400, description = "Bad pagination or filter", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    caller: Caller,
    window: Result<Query<Window>, QueryRejection>,
    filter: Result<Query<CategoryFilter>, QueryRejection>,
) -> Result<Json<Page<Record<Category>>>, AppError> {
    let window = extract_query(window)?;
    let filter = extract_query(filter)?;
    common::list(&state.categories, &caller, window, filter).await
}

/// GET /v1/categories/:id: Get a category.
#[utoipa::path(
    get,
    path = "/v1/categories/{id}",
    params(("id" = String, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category found; ETag carries the version", body = Category),
        (status = 404, description = "Category not found", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<RecordId>, PathRejection>,
) -> Result<Response, AppError> {
    let id = extract_path(id)?;
    common::read(&state.categories, &caller, id).await
}

/// PATCH /v1/categories/:id: Update a category.
#[utoipa::path(
    patch,
    path = "/v1/categories/{id}",
    params(("id" = String, Path, description = "Category id")),
    request_body(content = CategoryPatch, description = "Fields to change, optionally with expected_version"),
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 404, description = "Category not found", body = crate::error::ErrorBody),
        (status = 409, description = "Version conflict or duplicate", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
        (status = 428, description = "No expected version supplied", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<RecordId>, PathRejection>,
    headers: HeaderMap,
    body: Result<Json<UpdateRequest<CategoryPatch>>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = extract_path(id)?;
    let request = extract_json(body)?;
    common::update(&state.categories, &caller, id, &headers, request).await
}

/// DELETE /v1/categories/:id: Delete a category.
#[utoipa::path(
    delete,
    path = "/v1/categories/{id}",
    params(("id" = String, Path, description = "Category id"), DeleteParams),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 403, description = "Hard delete without ADMIN", body = crate::error::ErrorBody),
        (status = 404, description = "Category not found", body = crate::error::ErrorBody),
        (status = 409, description = "Version conflict", body = crate::error::ErrorBody),
        (status = 428, description = "No expected version supplied", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<RecordId>, PathRejection>,
    headers: HeaderMap,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<StatusCode, AppError> {
    let id = extract_path(id)?;
    let params = extract_query(params)?;
    common::delete(&state.categories, &caller, id, &headers, params).await
}
