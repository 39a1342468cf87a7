use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use stockroom_core::{EntityKind, OrganizationId, RecordId, Timestamp, Version};
use uuid::Uuid;

use crate::audit::{verify_chain, AuditEntry, AuditEvent, AuditFilter, AuditTrail, ChainReport};
use crate::error::StoreError;
use crate::repository::Scope;

const COLUMNS: &str = "id, organization_id, sequence, event_type, resource_kind, resource_id, \
                       version, actor, metadata, previous_hash, event_hash, created_at";

/// Append `entry` to the organization's chain inside the caller's
/// transaction.
///
/// The advisory lock serializes appends per organization until the
/// transaction ends, so two writers never read the same chain tail.
pub(crate) async fn append(
    conn: &mut PgConnection,
    scope: &Scope,
    entry: AuditEntry,
) -> Result<AuditEvent, StoreError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(scope.organization_id.to_string())
        .execute(&mut *conn)
        .await?;

    let tail: Option<(i64, String)> = sqlx::query_as(
        "SELECT sequence, event_hash FROM audit_events \
         WHERE organization_id = $1 ORDER BY sequence DESC LIMIT 1",
    )
    .bind(scope.organization_id.0)
    .fetch_optional(&mut *conn)
    .await?;

    let event = AuditEvent::chained(
        tail.as_ref().map(|(seq, hash)| (*seq, hash.as_str())),
        scope,
        entry,
    );

    let sql = format!(
        "INSERT INTO audit_events ({COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
    );
    sqlx::query(&sql)
        .bind(event.id)
        .bind(event.organization_id.0)
        .bind(event.sequence)
        .bind(&event.event_type)
        .bind(event.resource_kind.as_str())
        .bind(event.resource_id.0)
        .bind(i64::try_from(event.version.get()).unwrap_or(i64::MAX))
        .bind(&event.actor)
        .bind(&event.metadata)
        .bind(&event.previous_hash)
        .bind(&event.event_hash)
        .bind(*event.created_at.as_datetime())
        .execute(&mut *conn)
        .await?;

    Ok(event)
}

/// Audit trail reader over the `audit_events` table.
#[derive(Debug, Clone)]
pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditTrail for PgAuditLog {
    async fn events(
        &self,
        scope: &Scope,
        filter: &AuditFilter,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, StoreError> {
        let mut sql = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COLUMNS} FROM audit_events WHERE organization_id = "
        ));
        sql.push_bind(scope.organization_id.0);
        if let Some(kind) = filter.resource_kind {
            sql.push(" AND resource_kind = ").push_bind(kind.as_str());
        }
        if let Some(id) = filter.resource_id {
            sql.push(" AND resource_id = ").push_bind(id.0);
        }
        if let Some(after) = filter.after_sequence {
            sql.push(" AND sequence > ").push_bind(after);
        }
        sql.push(" ORDER BY sequence ASC LIMIT ")
            .push_bind(i64::from(limit));

        let rows: Vec<AuditRow> = sql.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(AuditRow::into_event).collect()
    }

    async fn verify(&self, scope: &Scope) -> Result<ChainReport, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM audit_events WHERE organization_id = $1 ORDER BY sequence ASC"
        );
        let rows: Vec<AuditRow> = sqlx::query_as(&sql)
            .bind(scope.organization_id.0)
            .fetch_all(&self.pool)
            .await?;
        let events = rows
            .into_iter()
            .map(AuditRow::into_event)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(verify_chain(&events))
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    organization_id: Uuid,
    sequence: i64,
    event_type: String,
    resource_kind: String,
    resource_id: Uuid,
    version: i64,
    actor: String,
    metadata: serde_json::Value,
    previous_hash: String,
    event_hash: String,
    created_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_event(self) -> Result<AuditEvent, StoreError> {
        let resource_kind = EntityKind::parse(&self.resource_kind).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "audit event {} has unknown resource kind {:?}",
                self.id, self.resource_kind
            ))
        })?;
        Ok(AuditEvent {
            id: self.id,
            organization_id: OrganizationId(self.organization_id),
            sequence: self.sequence,
            event_type: self.event_type,
            resource_kind,
            resource_id: RecordId(self.resource_id),
            version: Version(u64::try_from(self.version).unwrap_or_default()),
            actor: self.actor,
            metadata: self.metadata,
            previous_hash: self.previous_hash,
            event_hash: self.event_hash,
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}
