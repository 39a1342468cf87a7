//! # Catalog Entities
//!
//! The three record types a store organization manages:
//!
//! | Entity | Table | Unique per organization |
//! |--------|-------|-------------------------|
//! | [`Product`] | `products` | `sku`, `barcode` |
//! | [`Category`] | `categories` | `code`, `name` |
//! | [`Discount`] | `discounts` | `name` |
//!
//! References between entities (`Product::category_id`,
//! `Discount::product_id`) are plain referencing ids: the referencing
//! record does not own the referenced one, and deleting a category does not
//! cascade to its products.

mod category;
mod discount;
mod product;

pub use category::{Category, CategoryFilter, CategoryPatch};
pub use discount::{Discount, DiscountFilter, DiscountKind, DiscountPatch};
pub use product::{Product, ProductFilter, ProductPatch};

pub(crate) fn default_true() -> bool {
    true
}
