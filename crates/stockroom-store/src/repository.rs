//! # Repository Contract
//!
//! [`Repository`] is the only way records are read or written. Every call
//! is scoped to one organization; a record belonging to another tenant is
//! indistinguishable from one that does not exist.
//!
//! ## Write semantics
//!
//! - `create` validates, assigns id and version 1, and enforces uniqueness
//!   among live records of the organization.
//! - `update` and `delete` take the version the caller last saw. A
//!   mismatch is a `Conflict`; nothing is written.
//! - Each successful write appends one audit event in the same atomic step.

use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use stockroom_core::{
    Cursor, Entity, Order, OrganizationId, Page, Query, Record, RecordId, Version,
};

use crate::error::StoreError;

/// Tenant and actor a repository call runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub organization_id: OrganizationId,
    /// Subject recorded in the audit trail.
    pub actor: String,
}

impl Scope {
    pub fn new(organization_id: OrganizationId, actor: impl Into<String>) -> Self {
        Self {
            organization_id,
            actor: actor.into(),
        }
    }
}

/// How `delete` removes a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Keep the row with `deleted_at` set. Unique keys are released.
    #[default]
    Soft,
    /// Remove the row.
    Hard,
}

impl DeleteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Hard => "hard",
        }
    }
}

/// Versioned, tenant-scoped storage for one entity type.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn create(&self, scope: &Scope, fields: E) -> Result<Record<E>, StoreError>;

    async fn read(&self, scope: &Scope, id: RecordId) -> Result<Record<E>, StoreError>;

    async fn update(
        &self,
        scope: &Scope,
        id: RecordId,
        expected: Version,
        patch: E::Patch,
    ) -> Result<Record<E>, StoreError>;

    async fn delete(
        &self,
        scope: &Scope,
        id: RecordId,
        expected: Version,
        mode: DeleteMode,
    ) -> Result<(), StoreError>;

    async fn query(
        &self,
        scope: &Scope,
        query: &Query<E::Filter>,
    ) -> Result<Page<Record<E>>, StoreError>;

    /// Cheap liveness check of the backing store.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Lazily walk every record matching `filter`, one cursor page at a time.
///
/// The stream ends after the last page. To resume elsewhere, pass
/// `order.cursor_after(&last_record_seen)` as `start`.
pub fn stream<'a, E: Entity>(
    repo: &'a dyn Repository<E>,
    scope: &'a Scope,
    filter: E::Filter,
    order: Order,
    start: Option<Cursor>,
    page_size: u32,
) -> impl Stream<Item = Result<Record<E>, StoreError>> + Send + 'a {
    stream::try_unfold(Some(start), move |position| {
        let filter = filter.clone();
        async move {
            let Some(after) = position else {
                return Ok::<_, StoreError>(None);
            };
            let query = Query::new(filter).ordered(order).after(after, page_size);
            let page = repo.query(scope, &query).await?;
            let next = match page.next_cursor {
                Some(_) => page.items.last().map(|r| Some(order.cursor_after(r))),
                None => None,
            };
            let items = page.items.into_iter().map(Ok::<_, StoreError>);
            Ok(Some((stream::iter(items), next)))
        }
    })
    .try_flatten()
}
