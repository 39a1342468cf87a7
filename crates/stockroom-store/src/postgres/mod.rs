//! # PostgreSQL Backend
//!
//! One table per entity kind holding the envelope columns plus a JSONB
//! `fields` document, and an `audit_events` table. The schema ships as
//! embedded migrations (`migrations/` in this crate).
//!
//! ## Concurrency
//!
//! Writes run in a transaction that locks the target row
//! (`SELECT ... FOR UPDATE`), checks the expected version, and issues
//! `UPDATE ... WHERE id = $id AND version = $expected`. Uniqueness is
//! enforced by partial unique indexes; a violation (SQLSTATE 23505) is
//! mapped back to the offending field by index name. Audit appends take a
//! per-organization advisory lock inside the same transaction.

mod audit;
mod filter;
mod records;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

pub use audit::PgAuditLog;
pub use filter::PgEntity;
pub use records::PgStore;

/// Connect a pool and apply embedded migrations.
pub async fn init_pool(url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
