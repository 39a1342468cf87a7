//! # stockroom-core: Foundational Types for Stockroom
//!
//! This crate defines the shape of everything Stockroom persists: the
//! versioned [`Record`] envelope, identifier newtypes, fixed-point
//! [`Money`], the catalog entities, their validation pipelines, and the
//! query/pagination primitives shared by every storage backend.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `RecordId` and `OrganizationId` cannot be
//!    swapped for one another. Record identifiers are time-ordered UUIDs so
//!    primary-key order roughly follows creation order.
//!
//! 2. **Explicit validation.** Every entity exposes a [`Pipeline`] of plain
//!    validator functions. Single-field rules run first; cross-field rules
//!    run only when every single-field rule passed.
//!
//! 3. **No floating point money.** Prices are `i64` minor units with a fixed
//!    scale of two. JSON input may be a string or a number, output is always
//!    a string.
//!
//! 4. **Deterministic ordering.** [`Order`] always tie-breaks on the record
//!    identifier, so every backend returns the same sequence for the same
//!    query.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `stockroom-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod catalog;
pub mod entity;
pub mod error;
pub mod identity;
pub mod money;
pub mod patch;
pub mod query;
pub mod record;
pub mod temporal;
pub mod validation;

// Re-export primary types for ergonomic imports.
pub use catalog::{
    Category, CategoryFilter, CategoryPatch, Discount, DiscountFilter, DiscountKind,
    DiscountPatch, Product, ProductFilter, ProductPatch,
};
pub use entity::{Entity, EntityKind, Reference, UniqueKey};
pub use error::{CursorError, MoneyError};
pub use identity::{OrganizationId, RecordId};
pub use money::Money;
pub use query::{Cursor, Direction, Order, Page, Pagination, Query, SortField};
pub use record::{Record, Version};
pub use temporal::Timestamp;
pub use validation::{Pipeline, ValidationErrors};
