//! # OpenAPI Specification Assembly
//!
//! Collects every utoipa-documented route into one OpenAPI document,
//! served unauthenticated at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer JWT security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Signed JWT (EdDSA or HS256) from an issuer in the trust file.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockroom API",
        version = "0.3.0",
        description = "Multi-tenant retail catalog: products, categories and discounts.\n\nEvery record carries `id`, `organization_id`, `version`, `created_at` and `updated_at`. Updates and deletes name the version they expect, as `If-Match` or `expected_version`; a stale version is a 409.\n\nAll `/v1/*` endpoints require `Authorization: Bearer <jwt>`. Health probes, `/metrics` and this document are unauthenticated."
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Products ────────────────────────────────────────────────────
        crate::routes::products::create_product,
        crate::routes::products::list_products,
        crate::routes::products::get_product,
        crate::routes::products::update_product,
        crate::routes::products::delete_product,
        // ── Categories ──────────────────────────────────────────────────
        crate::routes::categories::create_category,
        crate::routes::categories::list_categories,
        crate::routes::categories::get_category,
        crate::routes::categories::update_category,
        crate::routes::categories::delete_category,
        // ── Discounts ───────────────────────────────────────────────────
        crate::routes::discounts::create_discount,
        crate::routes::discounts::list_discounts,
        crate::routes::discounts::get_discount,
        crate::routes::discounts::update_discount,
        crate::routes::discounts::delete_discount,
        // ── Audit ───────────────────────────────────────────────────────
        crate::routes::audit::list_events,
        crate::routes::audit::verify_chain,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::common::PageDoc,
            stockroom_core::Product,
            stockroom_core::ProductPatch,
            stockroom_core::Category,
            stockroom_core::CategoryPatch,
            stockroom_core::Discount,
            stockroom_core::DiscountPatch,
            stockroom_core::DiscountKind,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "products", description = "Sellable items, unique by SKU and barcode"),
        (name = "categories", description = "Product groupings, unique by code and name"),
        (name = "discounts", description = "Time-boxed percentage or fixed-amount reductions"),
        (name = "audit", description = "Hash-chained log of every write in the organization"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Stockroom API");
    }

    #[test]
    fn spec_has_every_collection() {
        let spec = ApiDoc::openapi();
        for path in [
            "/v1/products",
            "/v1/products/{id}",
            "/v1/categories",
            "/v1/categories/{id}",
            "/v1/discounts",
            "/v1/discounts/{id}",
            "/v1/audit",
            "/v1/audit/verify",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn spec_has_bearer_scheme() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
