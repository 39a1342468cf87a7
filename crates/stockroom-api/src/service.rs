//! # Service Layer
//!
//! Every operation runs the same three steps and stops at the first
//! failure:
//!
//! ```text
//! authorize(principal, operation) → validate(payload) → repository call
//! ```
//!
//! Fields that point at other records (a product's category, a discount's
//! target) are resolved in the caller's organization as part of validation:
//! a missing, deleted or foreign target is a field error, never a stored
//! dangling id.
//!
//! Repository errors are translated into [`ServiceError`], which carries no
//! storage detail other than an opaque message destined for logs.

use std::sync::Arc;

use stockroom_auth::{authorize, Denied, Operation, Principal};
use stockroom_core::{
    Category, Discount, Entity, EntityKind, Page, Product, Query, Record, RecordId, Reference,
    ValidationErrors, Version,
};
use stockroom_store::{
    AuditEvent, AuditFilter, AuditTrail, ChainReport, DeleteMode, Repository, Scope, StoreError,
};
use thiserror::Error;

/// Domain-level failure of a service call.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Denied(#[from] Denied),

    #[error(transparent)]
    Invalid(ValidationErrors),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: RecordId },

    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict { expected: Version, actual: Version },

    #[error("duplicate value for {field}")]
    Duplicate { field: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Backend failure. The message is for operators only.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            StoreError::Conflict { expected, actual } => Self::Conflict { expected, actual },
            StoreError::Duplicate { field } => Self::Duplicate { field },
            StoreError::Invalid(errors) => Self::Invalid(errors),
            StoreError::InvalidQuery(msg) => Self::InvalidQuery(msg),
            StoreError::Storage(_) | StoreError::Corrupt(_) => Self::Storage(err.to_string()),
        }
    }
}

/// Authorize `operation` and derive the repository scope from the caller.
fn scope_for(principal: &Principal, operation: Operation) -> Result<Scope, ServiceError> {
    authorize(principal, operation)?;
    let organization_id = principal.organization_id.ok_or_else(|| Denied {
        reason: "token carries no organization".into(),
    })?;
    Ok(Scope::new(organization_id, principal.subject.clone()))
}

/// The repositories a [`Reference`] can point into.
#[derive(Clone)]
pub struct Referents {
    products: Arc<dyn Repository<Product>>,
    categories: Arc<dyn Repository<Category>>,
    discounts: Arc<dyn Repository<Discount>>,
}

impl Referents {
    pub fn new(
        products: Arc<dyn Repository<Product>>,
        categories: Arc<dyn Repository<Category>>,
        discounts: Arc<dyn Repository<Discount>>,
    ) -> Self {
        Self {
            products,
            categories,
            discounts,
        }
    }

    /// Whether `reference` names a live record visible in `scope`.
    async fn exists(&self, scope: &Scope, reference: &Reference) -> Result<bool, StoreError> {
        let found = match reference.kind {
            EntityKind::Product => self.products.read(scope, reference.id).await.map(drop),
            EntityKind::Category => self.categories.read(scope, reference.id).await.map(drop),
            EntityKind::Discount => self.discounts.read(scope, reference.id).await.map(drop),
        };
        match found {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fail with one field error per unresolved reference.
    async fn resolve(&self, scope: &Scope, references: &[Reference]) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        for reference in references {
            if !self.exists(scope, reference).await? {
                errors.add(
                    reference.field,
                    format!("{} {} does not exist", reference.kind, reference.id),
                );
            }
        }
        errors.into_result().map_err(ServiceError::Invalid)
    }
}

/// Create/read/update/delete/query for one entity type.
pub struct RecordService<E: Entity> {
    repo: Arc<dyn Repository<E>>,
    referents: Referents,
}

impl<E: Entity> Clone for RecordService<E> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            referents: self.referents.clone(),
        }
    }
}

impl<E: Entity> RecordService<E> {
    pub fn new(repo: Arc<dyn Repository<E>>, referents: Referents) -> Self {
        Self { repo, referents }
    }

    pub async fn create(&self, principal: &Principal, fields: E) -> Result<Record<E>, ServiceError> {
        let scope = scope_for(principal, Operation::write(E::KIND))?;
        fields.validate().map_err(ServiceError::Invalid)?;
        self.referents.resolve(&scope, &fields.references()).await?;
        let record = self.repo.create(&scope, fields).await?;
        tracing::info!(kind = %E::KIND, id = %record.id, actor = %scope.actor, "record created");
        Ok(record)
    }

    pub async fn read(&self, principal: &Principal, id: RecordId) -> Result<Record<E>, ServiceError> {
        let scope = scope_for(principal, Operation::read(E::KIND))?;
        Ok(self.repo.read(&scope, id).await?)
    }

    /// Apply `patch` if the stored version is `expected`. The merged value
    /// is validated by the repository inside its write step; references the
    /// patch introduces are resolved first.
    pub async fn update(
        &self,
        principal: &Principal,
        id: RecordId,
        expected: Version,
        patch: E::Patch,
    ) -> Result<Record<E>, ServiceError> {
        let scope = scope_for(principal, Operation::write(E::KIND))?;
        let current = self.repo.read(&scope, id).await?;
        let existing = current.fields.references();
        let mut merged = current.fields;
        merged.apply(&patch);
        let introduced: Vec<Reference> = merged
            .references()
            .into_iter()
            .filter(|r| !existing.contains(r))
            .collect();
        self.referents.resolve(&scope, &introduced).await?;

        let record = self.repo.update(&scope, id, expected, patch).await?;
        tracing::info!(
            kind = %E::KIND,
            id = %record.id,
            version = %record.version,
            actor = %scope.actor,
            "record updated"
        );
        Ok(record)
    }

    pub async fn delete(
        &self,
        principal: &Principal,
        id: RecordId,
        expected: Version,
        mode: DeleteMode,
    ) -> Result<(), ServiceError> {
        let operation = match mode {
            DeleteMode::Soft => Operation::write(E::KIND),
            DeleteMode::Hard => Operation::purge(E::KIND),
        };
        let scope = scope_for(principal, operation)?;
        self.repo.delete(&scope, id, expected, mode).await?;
        tracing::info!(
            kind = %E::KIND,
            %id,
            mode = mode.as_str(),
            actor = %scope.actor,
            "record deleted"
        );
        Ok(())
    }

    pub async fn query(
        &self,
        principal: &Principal,
        query: &Query<E::Filter>,
    ) -> Result<Page<Record<E>>, ServiceError> {
        let scope = scope_for(principal, Operation::read(E::KIND))?;
        Ok(self.repo.query(&scope, query).await?)
    }

    /// Backend liveness, for the readiness probe.
    pub async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.repo.ping().await?)
    }
}

/// Read access to the caller's organization audit chain.
#[derive(Clone)]
pub struct AuditService {
    trail: Arc<dyn AuditTrail>,
}

impl AuditService {
    pub fn new(trail: Arc<dyn AuditTrail>) -> Self {
        Self { trail }
    }

    pub async fn events(
        &self,
        principal: &Principal,
        filter: &AuditFilter,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, ServiceError> {
        let scope = scope_for(principal, Operation::read_audit())?;
        Ok(self.trail.events(&scope, filter, limit).await?)
    }

    pub async fn verify(&self, principal: &Principal) -> Result<ChainReport, ServiceError> {
        let scope = scope_for(principal, Operation::read_audit())?;
        Ok(self.trail.verify(&scope).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use chrono::Utc;
    use serde_json::json;
    use stockroom_auth::Role;
    use stockroom_core::{CategoryPatch, OrganizationId, ProductPatch};
    use stockroom_store::{MemoryAuditLog, MemoryStore};

    fn principal(org: Option<OrganizationId>, roles: &[Role]) -> Principal {
        Principal {
            subject: "alice".into(),
            issuer: "https://idp.test".into(),
            organization_id: org,
            store_id: None,
            roles: roles.iter().copied().collect(),
            permissions: BTreeSet::new(),
            expires_at: Utc::now(),
        }
    }

    fn widget() -> Product {
        serde_json::from_value(json!({"sku": "WID-1", "name": "Widget", "retail_price": "9.99"}))
            .unwrap()
    }

    struct Catalog {
        products: RecordService<Product>,
        categories: RecordService<Category>,
        discounts: RecordService<Discount>,
        audit: MemoryAuditLog,
    }

    fn catalog() -> Catalog {
        let audit = MemoryAuditLog::new();
        let products: Arc<dyn Repository<Product>> =
            Arc::new(MemoryStore::<Product>::new(audit.clone()));
        let categories: Arc<dyn Repository<Category>> =
            Arc::new(MemoryStore::<Category>::new(audit.clone()));
        let discounts: Arc<dyn Repository<Discount>> =
            Arc::new(MemoryStore::<Discount>::new(audit.clone()));
        let referents = Referents::new(products.clone(), categories.clone(), discounts.clone());
        Catalog {
            products: RecordService::new(products, referents.clone()),
            categories: RecordService::new(categories, referents.clone()),
            discounts: RecordService::new(discounts, referents),
            audit,
        }
    }

    fn service() -> (RecordService<Product>, MemoryAuditLog) {
        let catalog = catalog();
        (catalog.products, catalog.audit)
    }

    fn beverages() -> Category {
        serde_json::from_value(json!({"code": "BEV", "name": "Beverages"})).unwrap()
    }

    #[tokio::test]
    async fn authorization_runs_before_validation() {
        let (svc, _) = service();
        let cashier = principal(Some(OrganizationId::new()), &[Role::Cashier]);
        let invalid = Product {
            sku: "X".into(),
            ..widget()
        };
        let err = svc.create(&cashier, invalid).await.unwrap_err();
        assert!(matches!(err, ServiceError::Denied(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn invalid_payload_writes_nothing() {
        let (svc, audit) = service();
        let org = OrganizationId::new();
        let manager = principal(Some(org), &[Role::Manager]);
        let invalid = Product {
            sku: "X".into(),
            ..widget()
        };
        let err = svc.create(&manager, invalid).await.unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(ref e) if e.get("sku").is_some()));
        assert!(audit.snapshot(org).is_empty());
    }

    #[tokio::test]
    async fn principal_without_organization_is_denied() {
        let (svc, _) = service();
        let admin = principal(None, &[Role::Admin]);
        let err = svc.read(&admin, RecordId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Denied(_)));
    }

    #[tokio::test]
    async fn hard_delete_needs_admin() {
        let (svc, _) = service();
        let manager = principal(Some(OrganizationId::new()), &[Role::Manager]);
        let created = svc.create(&manager, widget()).await.unwrap();

        let err = svc
            .delete(&manager, created.id, created.version, DeleteMode::Hard)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Denied(_)));

        svc.delete(&manager, created.id, created.version, DeleteMode::Soft)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn store_errors_are_translated() {
        let (svc, _) = service();
        let manager = principal(Some(OrganizationId::new()), &[Role::Manager]);
        let created = svc.create(&manager, widget()).await.unwrap();

        let patch = ProductPatch {
            name: Some("Gadget".into()),
            ..Default::default()
        };
        svc.update(&manager, created.id, created.version, patch.clone())
            .await
            .unwrap();
        let stale = svc
            .update(&manager, created.id, created.version, patch)
            .await
            .unwrap_err();
        assert!(matches!(
            stale,
            ServiceError::Conflict {
                expected: Version(1),
                actual: Version(2)
            }
        ));

        let dup = svc.create(&manager, widget()).await.unwrap_err();
        assert!(matches!(dup, ServiceError::Duplicate { ref field } if field == "sku"));
    }

    #[tokio::test]
    async fn unknown_category_is_a_field_error() {
        let catalog = catalog();
        let manager = principal(Some(OrganizationId::new()), &[Role::Manager]);
        let dangling = Product {
            category_id: Some(RecordId::new()),
            ..widget()
        };
        let err = catalog.products.create(&manager, dangling).await.unwrap_err();
        assert!(
            matches!(err, ServiceError::Invalid(ref e) if e.get("category_id").is_some()),
            "got {err:?}"
        );
        let page = catalog
            .products
            .query(&manager, &Query::new(Default::default()))
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn category_of_another_organization_is_rejected() {
        let catalog = catalog();
        let ours = principal(Some(OrganizationId::new()), &[Role::Manager]);
        let theirs = principal(Some(OrganizationId::new()), &[Role::Manager]);
        let foreign = catalog.categories.create(&theirs, beverages()).await.unwrap();

        let product = Product {
            category_id: Some(foreign.id),
            ..widget()
        };
        let err = catalog.products.create(&ours, product).await.unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(ref e) if e.get("category_id").is_some()));

        let local = catalog.categories.create(&ours, beverages()).await.unwrap();
        let product = Product {
            category_id: Some(local.id),
            ..widget()
        };
        let created = catalog.products.create(&ours, product).await.unwrap();
        assert_eq!(created.fields.category_id, Some(local.id));
    }

    #[tokio::test]
    async fn update_resolves_new_references_only() {
        let catalog = catalog();
        let manager = principal(Some(OrganizationId::new()), &[Role::Manager]);
        let category = catalog.categories.create(&manager, beverages()).await.unwrap();
        let product = Product {
            category_id: Some(category.id),
            ..widget()
        };
        let created = catalog.products.create(&manager, product).await.unwrap();

        let dangling = ProductPatch {
            category_id: Some(Some(RecordId::new())),
            ..Default::default()
        };
        let err = catalog
            .products
            .update(&manager, created.id, created.version, dangling)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(ref e) if e.get("category_id").is_some()));

        // Unrelated edits still go through after the category is retired.
        let renamed = CategoryPatch {
            name: Some("Drinks".into()),
            ..Default::default()
        };
        let category = catalog
            .categories
            .update(&manager, category.id, category.version, renamed)
            .await
            .unwrap();
        catalog
            .categories
            .delete(&manager, category.id, category.version, DeleteMode::Soft)
            .await
            .unwrap();
        let rename = ProductPatch {
            name: Some("Gadget".into()),
            ..Default::default()
        };
        let updated = catalog
            .products
            .update(&manager, created.id, created.version, rename)
            .await
            .unwrap();
        assert_eq!(updated.version, Version(2));
    }

    #[tokio::test]
    async fn discount_target_must_exist() {
        let catalog = catalog();
        let manager = principal(Some(OrganizationId::new()), &[Role::Manager]);
        let sale = |product_id: RecordId| -> Discount {
            serde_json::from_value(json!({
                "name": "Launch",
                "kind": "percentage",
                "value": "10",
                "starts_on": "2026-01-01",
                "ends_on": "2026-01-31",
                "product_id": product_id,
            }))
            .unwrap()
        };

        let err = catalog
            .discounts
            .create(&manager, sale(RecordId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(ref e) if e.get("product_id").is_some()));

        let product = catalog.products.create(&manager, widget()).await.unwrap();
        catalog.discounts.create(&manager, sale(product.id)).await.unwrap();
    }

    #[tokio::test]
    async fn audit_requires_audit_permission() {
        let audit = AuditService::new(Arc::new(MemoryAuditLog::new()));
        let org = Some(OrganizationId::new());
        let cashier = principal(org, &[Role::Cashier]);
        let support = principal(org, &[Role::Support]);

        assert!(audit.verify(&cashier).await.is_err());
        let report = audit.verify(&support).await.unwrap();
        assert!(report.chain_valid);
        assert_eq!(report.total_events, 0);
    }
}
