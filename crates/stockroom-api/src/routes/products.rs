//! # Products API
//!
//! ## Endpoints
//!
//! - `POST /v1/products`: create product
//! - `GET /v1/products`: list products (`q`, `active`, `category_id`, `brand`)
//! - `GET /v1/products/:id`: get product
//! - `PATCH /v1/products/:id`: update product (`If-Match` or `expected_version`)
//! - `DELETE /v1/products/:id`: delete product (`expected_version`, `hard`)

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use stockroom_core::{Page, Product, ProductFilter, ProductPatch, Record, RecordId};

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_path, extract_query};
use crate::routes::common::{self, DeleteParams, UpdateRequest, Window};
use crate::state::AppState;

const COLLECTION: &str = "/v1/products";

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/products", get(list_products).post(create_product))
        .route(
            "/v1/products/:id",
            get(get_product).patch(update_product).delete(delete_product),
        )
}

/// POST /v1/products: Create a product.
#[utoipa::path(
    post,
    path = "/v1/products",
    request_body = Product,
    responses(
        (status = 201, description = "Product created; body is the record with envelope fields", body = Product),
        (status = 400, description = "Malformed JSON", body = crate::error::ErrorBody),
        (status = 409, description = "Duplicate sku or barcode", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<Product>, JsonRejection>,
) -> Result<Response, AppError> {
    let product = extract_json(body)?;
    common::create(&state.products, &caller, COLLECTION, product).await
}

/// GET /v1/products: List products.
#[utoipa::path(
    get,
    path = "/v1/products",
    params(
        Window,
        ("q" = Option<String>, Query, description = "Substring of name, SKU or barcode"),
        ("active" = Option<bool>, Query, description = "Active flag"),
        ("category_id" = Option<String>, Query, description = "Category id"),
        ("brand" = Option<String>, Query, description = "Brand, case-insensitive"),
    ),
    responses(
        (status = 200, description = "Page of products", body = crate::routes::common::PageDoc),
        (status = 400, description = "Bad pagination or filter", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    caller: Caller,
    window: Result<Query<Window>, QueryRejection>,
    filter: Result<Query<ProductFilter>, QueryRejection>,
) -> Result<Json<Page<Record<Product>>>, AppError> {
    let window = extract_query(window)?;
    let filter = extract_query(filter)?;
    common::list(&state.products, &caller, window, filter).await
}

/// GET /v1/products/:id: Get a product.
#[utoipa::path(
    get,
    path = "/v1/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product found; ETag carries the version", body = Product),
        (status = 404, description = "Product not found", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<RecordId>, PathRejection>,
) -> Result<Response, AppError> {
    let id = extract_path(id)?;
    common::read(&state.products, &caller, id).await
}

/// PATCH /v1/products/:id: Update a product.
#[utoipa::path(
    patch,
    path = "/v1/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    request_body(content = ProductPatch, description = "Fields to change, optionally with expected_version"),
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 404, description = "Product not found", body = crate::error::ErrorBody),
        (status = 409, description = "Version conflict or duplicate", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
        (status = 428, description = "No expected version supplied", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<RecordId>, PathRejection>,
    headers: HeaderMap,
    body: Result<Json<UpdateRequest<ProductPatch>>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = extract_path(id)?;
    let request = extract_json(body)?;
    common::update(&state.products, &caller, id, &headers, request).await
}

/// DELETE /v1/products/:id: Delete a product.
#[utoipa::path(
    delete,
    path = "/v1/products/{id}",
    params(("id" = String, Path, description = "Product id"), DeleteParams),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 403, description = "Hard delete without ADMIN", body = crate::error::ErrorBody),
        (status = 404, description = "Product not found", body = crate::error::ErrorBody),
        (status = 409, description = "Version conflict", body = crate::error::ErrorBody),
        (status = 428, description = "No expected version supplied", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<RecordId>, PathRejection>,
    headers: HeaderMap,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<StatusCode, AppError> {
    let id = extract_path(id)?;
    let params = extract_query(params)?;
    common::delete(&state.products, &caller, id, &headers, params).await
}
