//! # stockroom-store: Record Storage
//!
//! The [`Repository`] contract and its two backends:
//!
//! - [`MemoryStore`]: process-local, used when no database is configured
//!   and throughout the test suites.
//! - [`PgStore`]: PostgreSQL through `sqlx`, schema applied by embedded
//!   migrations ([`postgres::init_pool`]).
//!
//! Both append to a per-organization, hash-chained [`audit`] trail in the
//! same atomic step as each write.
//!
//! ## Crate Policy
//!
//! - Errors carry storage detail for logs only; callers above the service
//!   layer see the stable [`StoreError`] kinds.
//! - No lock is held across an `.await`.

pub mod audit;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use audit::{AuditEvent, AuditFilter, AuditTrail, ChainReport, MemoryAuditLog};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::{init_pool, PgAuditLog, PgEntity, PgStore};
pub use repository::{stream, DeleteMode, Repository, Scope};
