//! # Application State
//!
//! Shared handles cloned into every request: one service per entity type,
//! the audit service, the authenticator and the middleware state. The
//! repositories behind the services are either all in-memory or all
//! PostgreSQL; they are never mixed.

use std::sync::Arc;

use sqlx::PgPool;
use stockroom_auth::Authenticator;
use stockroom_core::{Category, Discount, Product};
use stockroom_store::{MemoryAuditLog, MemoryStore, PgAuditLog, PgStore, Repository};

use crate::middleware::metrics::ApiMetrics;
use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter};
use crate::service::{AuditService, RecordService, Referents};

/// Which storage backend the state was built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Postgres,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        }
    }
}

/// Handles shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub products: RecordService<Product>,
    pub categories: RecordService<Category>,
    pub discounts: RecordService<Discount>,
    pub audit: AuditService,
    pub authenticator: Arc<Authenticator>,
    pub metrics: ApiMetrics,
    pub limiter: RateLimiter,
    pub backend: Backend,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.backend)
            .field("authenticator", &self.authenticator)
            .field("limiter", &self.limiter.config())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State over process-local stores sharing one audit chain.
    pub fn in_memory(authenticator: Arc<Authenticator>) -> Result<Self, prometheus::Error> {
        let audit = MemoryAuditLog::new();
        let (products, categories, discounts) = catalog(
            Arc::new(MemoryStore::<Product>::new(audit.clone())),
            Arc::new(MemoryStore::<Category>::new(audit.clone())),
            Arc::new(MemoryStore::<Discount>::new(audit.clone())),
        );
        Ok(Self {
            products,
            categories,
            discounts,
            audit: AuditService::new(Arc::new(audit)),
            authenticator,
            metrics: ApiMetrics::new()?,
            limiter: RateLimiter::new(RateLimitConfig::default()),
            backend: Backend::Memory,
        })
    }

    /// State over a migrated PostgreSQL pool.
    pub fn postgres(
        pool: PgPool,
        authenticator: Arc<Authenticator>,
    ) -> Result<Self, prometheus::Error> {
        let (products, categories, discounts) = catalog(
            Arc::new(PgStore::<Product>::new(pool.clone())),
            Arc::new(PgStore::<Category>::new(pool.clone())),
            Arc::new(PgStore::<Discount>::new(pool.clone())),
        );
        Ok(Self {
            products,
            categories,
            discounts,
            audit: AuditService::new(Arc::new(PgAuditLog::new(pool))),
            authenticator,
            metrics: ApiMetrics::new()?,
            limiter: RateLimiter::new(RateLimitConfig::default()),
            backend: Backend::Postgres,
        })
    }

    /// Replace the default per-caller budget.
    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.limiter = RateLimiter::new(config);
        self
    }
}

/// One service per entity type, resolving references across the three
/// repositories.
fn catalog(
    products: Arc<dyn Repository<Product>>,
    categories: Arc<dyn Repository<Category>>,
    discounts: Arc<dyn Repository<Discount>>,
) -> (
    RecordService<Product>,
    RecordService<Category>,
    RecordService<Discount>,
) {
    let referents = Referents::new(products.clone(), categories.clone(), discounts.clone());
    (
        RecordService::new(products, referents.clone()),
        RecordService::new(categories, referents.clone()),
        RecordService::new(discounts, referents),
    )
}
