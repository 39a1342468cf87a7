//! # In-Memory Store
//!
//! A [`Repository`] over a `BTreeMap` guarded by one `parking_lot::RwLock`.
//! Every write takes the write guard for its whole read-check-modify step,
//! including the audit append, so writes are atomic and linearizable.
//! The guard is never held across an `.await`.
//!
//! Used when no database is configured, and by the test suites.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;
use stockroom_core::{
    Entity, OrganizationId, Page, Pagination, Query, Record, RecordId, Timestamp, Version,
};

use crate::audit::{AuditAction, AuditEntry, MemoryAuditLog};
use crate::error::StoreError;
use crate::repository::{DeleteMode, Repository, Scope};

#[derive(Debug, Clone)]
struct Row<E> {
    record: Record<E>,
    deleted_at: Option<Timestamp>,
}

impl<E> Row<E> {
    fn is_live_in(&self, organization_id: OrganizationId) -> bool {
        self.deleted_at.is_none() && self.record.organization_id == organization_id
    }
}

/// In-memory repository for one entity type.
pub struct MemoryStore<E> {
    rows: Arc<RwLock<BTreeMap<RecordId, Row<E>>>>,
    audit: MemoryAuditLog,
}

impl<E> Clone for MemoryStore<E> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            audit: self.audit.clone(),
        }
    }
}

impl<E: Entity> MemoryStore<E> {
    /// A store appending to `audit`. Share one log between the stores of
    /// all entity types so each organization has a single chain.
    pub fn new(audit: MemoryAuditLog) -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            audit,
        }
    }

    /// Number of rows held, including soft-deleted ones.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

/// First unique key of `fields` already taken by another live record.
fn check_unique<E: Entity>(
    rows: &BTreeMap<RecordId, Row<E>>,
    organization_id: OrganizationId,
    exclude: Option<RecordId>,
    fields: &E,
) -> Result<(), StoreError> {
    let keys = fields.unique_keys();
    if keys.is_empty() {
        return Ok(());
    }
    for row in rows.values() {
        if !row.is_live_in(organization_id) || Some(row.record.id) == exclude {
            continue;
        }
        let taken = row.record.fields.unique_keys();
        if let Some(clash) = keys.iter().find(|k| taken.contains(k)) {
            return Err(StoreError::Duplicate {
                field: clash.field.to_string(),
            });
        }
    }
    Ok(())
}

fn live_row<'a, E: Entity>(
    rows: &'a mut BTreeMap<RecordId, Row<E>>,
    scope: &Scope,
    id: RecordId,
    expected: Version,
) -> Result<&'a mut Row<E>, StoreError> {
    let row = rows
        .get_mut(&id)
        .filter(|row| row.is_live_in(scope.organization_id))
        .ok_or_else(|| StoreError::not_found::<E>(id))?;
    if row.record.version != expected {
        return Err(StoreError::Conflict {
            expected,
            actual: row.record.version,
        });
    }
    Ok(row)
}

#[async_trait]
impl<E: Entity> Repository<E> for MemoryStore<E> {
    async fn create(&self, scope: &Scope, fields: E) -> Result<Record<E>, StoreError> {
        fields.validate()?;
        let mut rows = self.rows.write();
        check_unique(&rows, scope.organization_id, None, &fields)?;

        let record = Record::create(scope.organization_id, fields);
        self.audit.append(
            scope,
            AuditEntry::new(E::KIND, AuditAction::Created, record.id, record.version),
        );
        rows.insert(
            record.id,
            Row {
                record: record.clone(),
                deleted_at: None,
            },
        );
        Ok(record)
    }

    async fn read(&self, scope: &Scope, id: RecordId) -> Result<Record<E>, StoreError> {
        self.rows
            .read()
            .get(&id)
            .filter(|row| row.is_live_in(scope.organization_id))
            .map(|row| row.record.clone())
            .ok_or_else(|| StoreError::not_found::<E>(id))
    }

    async fn update(
        &self,
        scope: &Scope,
        id: RecordId,
        expected: Version,
        patch: E::Patch,
    ) -> Result<Record<E>, StoreError> {
        let mut rows = self.rows.write();
        let current = live_row(&mut rows, scope, id, expected)?;

        let mut fields = current.record.fields.clone();
        fields.apply(&patch);
        fields.validate()?;
        check_unique(&rows, scope.organization_id, Some(id), &fields)?;

        let row = live_row(&mut rows, scope, id, expected)?;
        row.record.fields = fields;
        row.record.touch();
        self.audit.append(
            scope,
            AuditEntry::new(E::KIND, AuditAction::Updated, id, row.record.version),
        );
        Ok(row.record.clone())
    }

    async fn delete(
        &self,
        scope: &Scope,
        id: RecordId,
        expected: Version,
        mode: DeleteMode,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        let row = live_row(&mut rows, scope, id, expected)?;

        let version = match mode {
            DeleteMode::Soft => {
                row.record.touch();
                row.deleted_at = Some(row.record.updated_at);
                row.record.version
            }
            DeleteMode::Hard => {
                let version = row.record.version;
                rows.remove(&id);
                version
            }
        };
        self.audit.append(
            scope,
            AuditEntry::new(E::KIND, AuditAction::Deleted, id, version)
                .with_metadata(json!({ "mode": mode.as_str() })),
        );
        Ok(())
    }

    async fn query(
        &self,
        scope: &Scope,
        query: &Query<E::Filter>,
    ) -> Result<Page<Record<E>>, StoreError> {
        let mut matching: Vec<Record<E>> = {
            let rows = self.rows.read();
            rows.values()
                .filter(|row| row.is_live_in(scope.organization_id))
                .filter(|row| row.record.fields.matches(&query.filter))
                .map(|row| row.record.clone())
                .collect()
        };
        matching.sort_by(|a, b| query.order.compare(a, b));

        let window: Vec<Record<E>> = match query.pagination {
            Pagination::Offset { offset, .. } => matching
                .into_iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(query.fetch_limit())
                .collect(),
            Pagination::Cursor { after, .. } => matching
                .into_iter()
                .filter(|r| after.map_or(true, |c| c.admits(r)))
                .take(query.fetch_limit())
                .collect(),
        };
        Ok(Page::assemble(window, query))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use stockroom_core::{
        Category, CategoryFilter, CategoryPatch, Direction, Money, Order, Product, ProductFilter,
        ProductPatch, SortField,
    };

    use crate::audit::AuditTrail;
    use crate::repository::stream;

    fn scope() -> Scope {
        Scope::new(OrganizationId::new(), "tester")
    }

    fn product(sku: &str) -> Product {
        serde_json::from_value(json!({
            "sku": sku,
            "name": "Widget",
            "retail_price": "9.99"
        }))
        .unwrap()
    }

    fn category(code: &str, name: &str) -> Category {
        Category {
            code: code.into(),
            name: name.into(),
            description: None,
            active: true,
        }
    }

    fn price(p: &str) -> ProductPatch {
        ProductPatch {
            retail_price: Some(Money::parse(p).unwrap()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_then_read_returns_same_record() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        let created = store.create(&s, product("WID-1")).await.unwrap();
        assert_eq!(created.version, Version::INITIAL);
        let read = store.read(&s, created.id).await.unwrap();
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn create_rejects_invalid_fields() {
        let store = MemoryStore::<Product>::new(MemoryAuditLog::new());
        let mut p = product("WID-1");
        p.retail_price = Money::ZERO;
        let err = store.create(&scope(), p).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(ref e) if e.get("retail_price").is_some()));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn widget_update_scenario() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        let v1 = store.create(&s, product("WID-1")).await.unwrap();

        let v2 = store.update(&s, v1.id, v1.version, price("12.99")).await.unwrap();
        assert_eq!(v2.version, Version(2));
        assert!(v2.updated_at > v2.created_at);
        assert_eq!(v2.fields.retail_price, Money::parse("12.99").unwrap());

        let stale = store.update(&s, v1.id, v1.version, price("5.00")).await;
        assert!(matches!(
            stale,
            Err(StoreError::Conflict { expected: Version(1), actual: Version(2) })
        ));
        assert_eq!(store.read(&s, v1.id).await.unwrap(), v2);
    }

    #[tokio::test]
    async fn update_validates_merged_result() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        let mut p = product("WID-1");
        p.cost_price = Some(Money::parse("5.00").unwrap());
        let r = store.create(&s, p).await.unwrap();

        let err = store.update(&s, r.id, r.version, price("4.00")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(ref e) if e.get("cost_price").is_some()));
        assert_eq!(store.read(&s, r.id).await.unwrap().version, Version(1));
    }

    #[tokio::test]
    async fn duplicate_sku_is_case_insensitive() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        store.create(&s, product("WID-1")).await.unwrap();
        let err = store.create(&s, product("wid-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field } if field == "sku"));
    }

    #[tokio::test]
    async fn uniqueness_is_per_organization() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        store.create(&scope(), product("WID-1")).await.unwrap();
        assert!(store.create(&scope(), product("WID-1")).await.is_ok());
    }

    #[tokio::test]
    async fn update_into_taken_key_is_duplicate() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        store.create(&s, category("BEV", "Beverages")).await.unwrap();
        let snacks = store.create(&s, category("SNK", "Snacks")).await.unwrap();
        let patch = CategoryPatch {
            name: Some("beverages".into()),
            ..Default::default()
        };
        let err = store.update(&s, snacks.id, snacks.version, patch).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field } if field == "name"));
    }

    #[tokio::test]
    async fn soft_delete_hides_record_and_releases_keys() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        let r = store.create(&s, product("WID-1")).await.unwrap();
        store.delete(&s, r.id, r.version, DeleteMode::Soft).await.unwrap();

        assert!(matches!(store.read(&s, r.id).await, Err(StoreError::NotFound { .. })));
        assert_eq!(store.len(), 1);
        assert!(store.create(&s, product("WID-1")).await.is_ok());
    }

    #[tokio::test]
    async fn hard_delete_removes_row() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        let r = store.create(&s, product("WID-1")).await.unwrap();
        store.delete(&s, r.id, r.version, DeleteMode::Hard).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_with_stale_version_conflicts() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        let r = store.create(&s, product("WID-1")).await.unwrap();
        store.update(&s, r.id, r.version, price("1.00")).await.unwrap();
        let err = store.delete(&s, r.id, r.version, DeleteMode::Soft).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn other_tenant_sees_not_found() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let owner = scope();
        let r = store.create(&owner, product("WID-1")).await.unwrap();
        let intruder = scope();

        assert!(matches!(store.read(&intruder, r.id).await, Err(StoreError::NotFound { .. })));
        assert!(matches!(
            store.update(&intruder, r.id, r.version, price("1.00")).await,
            Err(StoreError::NotFound { .. })
        ));
        let page = store.query(&intruder, &Query::new(ProductFilter::default())).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn concurrent_stale_updates_have_one_winner() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        let r = store.create(&s, product("WID-1")).await.unwrap();
        let (id, version) = (r.id, r.version);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let s = s.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(&s, id, version, price(&format!("{}.00", i + 1)))
                    .await
            }));
        }
        let mut ok = 0;
        let mut conflicts = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::Conflict { .. }) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(conflicts, 15);
        assert_eq!(store.read(&s, r.id).await.unwrap().version, Version(2));
    }

    #[tokio::test]
    async fn writes_append_audit_events() {
        let audit = MemoryAuditLog::new();
        let store = MemoryStore::new(audit.clone());
        let s = scope();
        let r = store.create(&s, product("WID-1")).await.unwrap();
        let r = store.update(&s, r.id, r.version, price("2.00")).await.unwrap();
        store.delete(&s, r.id, r.version, DeleteMode::Hard).await.unwrap();
        // Failed writes leave no trace.
        let _ = store.update(&s, r.id, r.version, price("3.00")).await;

        let events = audit.snapshot(s.organization_id);
        let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["PRODUCT_CREATED", "PRODUCT_UPDATED", "PRODUCT_DELETED"]);
        assert_eq!(events[2].metadata["mode"], "hard");
        assert!(audit.verify(&s).await.unwrap().chain_valid);
    }

    #[tokio::test]
    async fn cursor_pages_cover_everything_once() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        let mut ids = Vec::new();
        for i in 0..7 {
            ids.push(store.create(&s, product(&format!("SKU-{i}"))).await.unwrap().id);
        }

        let mut seen = Vec::new();
        let mut query = Query::new(ProductFilter::default()).after(None, 3);
        loop {
            let page = store.query(&s, &query).await.unwrap();
            seen.extend(page.items.iter().map(|r| r.id));
            match page.next_cursor {
                Some(token) => {
                    let cursor = stockroom_core::Cursor::decode(&token, query.order).unwrap();
                    query = query.after(Some(cursor), 3);
                }
                None => break,
            }
        }
        assert_eq!(seen, ids);
    }

    #[tokio::test]
    async fn offset_pages_and_descending_order() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        for i in 0..5 {
            store.create(&s, product(&format!("SKU-{i}"))).await.unwrap();
        }
        let order = Order::new(SortField::CreatedAt, Direction::Desc);
        let first = store
            .query(&s, &Query::new(ProductFilter::default()).ordered(order).offset(0, 2))
            .await
            .unwrap();
        assert_eq!(first.items[0].fields.sku, "SKU-4");
        assert_eq!(first.next_offset, Some(2));

        let last = store
            .query(&s, &Query::new(ProductFilter::default()).ordered(order).offset(4, 2))
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].fields.sku, "SKU-0");
        assert_eq!(last.next_offset, None);
    }

    #[tokio::test]
    async fn filter_applies_before_paging() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        store.create(&s, category("BEV", "Beverages")).await.unwrap();
        store.create(&s, category("SNK", "Snacks")).await.unwrap();
        let filter = CategoryFilter {
            q: Some("snack".into()),
            active: None,
        };
        let page = store.query(&s, &Query::new(filter)).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].fields.code, "SNK");
    }

    #[tokio::test]
    async fn stream_walks_all_pages_and_resumes() {
        let store = MemoryStore::new(MemoryAuditLog::new());
        let s = scope();
        for i in 0..10 {
            store.create(&s, product(&format!("SKU-{i}"))).await.unwrap();
        }
        let order = Order::default();
        let all: Vec<Record<Product>> =
            stream::<Product>(&store, &s, ProductFilter::default(), order, None, 4)
                .try_collect()
                .await
                .unwrap();
        assert_eq!(all.len(), 10);

        let resume_at = order.cursor_after(&all[5]);
        let rest: Vec<Record<Product>> =
            stream::<Product>(&store, &s, ProductFilter::default(), order, Some(resume_at), 4)
                .try_collect()
                .await
                .unwrap();
        assert_eq!(rest, all[6..].to_vec());
    }

    proptest::proptest! {
        #[test]
        fn page_size_does_not_change_the_sequence(
            n in 0usize..20,
            page_size in 1u32..7,
            descending in proptest::bool::ANY,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStore::new(MemoryAuditLog::new());
                let s = scope();
                for i in 0..n {
                    let r = store.create(&s, product(&format!("SKU-{i}"))).await.unwrap();
                    if i % 3 == 0 {
                        store.update(&s, r.id, r.version, price("1.00")).await.unwrap();
                    }
                }
                let direction = if descending { Direction::Desc } else { Direction::Asc };
                let order = Order::new(SortField::UpdatedAt, direction);

                let whole = store
                    .query(&s, &Query::new(ProductFilter::default()).ordered(order).offset(0, 100))
                    .await
                    .unwrap();
                let paged: Vec<Record<Product>> =
                    stream::<Product>(&store, &s, ProductFilter::default(), order, None, page_size)
                        .try_collect()
                        .await
                        .unwrap();
                assert_eq!(paged, whole.items);
            });
        }
    }
}
