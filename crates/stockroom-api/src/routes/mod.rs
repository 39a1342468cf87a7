//! # Route Modules
//!
//! One module per resource. Each exposes `router()` returning a
//! `Router<AppState>` that [`crate::app`] merges behind the auth and
//! rate-limit layers.

pub mod audit;
pub mod categories;
pub mod common;
pub mod discounts;
pub mod products;
