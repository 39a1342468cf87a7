use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use stockroom_core::{
    Direction, OrganizationId, Page, Pagination, Query, Record, RecordId, SortField,
    Timestamp, Version,
};
use uuid::Uuid;

use super::audit::append;
use super::filter::PgEntity;
use crate::audit::{AuditAction, AuditEntry};
use crate::error::StoreError;
use crate::repository::{DeleteMode, Repository, Scope};

const COLUMNS: &str = "id, organization_id, version, fields, created_at, updated_at";

/// PostgreSQL repository for one entity kind.
pub struct PgStore<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for PgStore<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: PgEntity> PgStore<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    fn table() -> &'static str {
        E::KIND.table()
    }

    /// Lock the live row `id` for the rest of the transaction and check its
    /// version.
    async fn lock_live(
        conn: &mut PgConnection,
        scope: &Scope,
        id: RecordId,
        expected: Version,
    ) -> Result<Record<E>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} \
             WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL \
             FOR UPDATE",
            Self::table()
        );
        let row: RecordRow = sqlx::query_as(&sql)
            .bind(scope.organization_id.0)
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| StoreError::not_found::<E>(id))?;
        let record = row.into_record::<E>()?;
        if record.version != expected {
            return Err(StoreError::Conflict {
                expected,
                actual: record.version,
            });
        }
        Ok(record)
    }
}

#[async_trait]
impl<E: PgEntity> Repository<E> for PgStore<E> {
    async fn create(&self, scope: &Scope, fields: E) -> Result<Record<E>, StoreError> {
        fields.validate()?;
        let record = Record::create(scope.organization_id, fields);
        let document = to_document(&record.fields)?;

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO {} ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)",
            Self::table()
        );
        sqlx::query(&sql)
            .bind(record.id.0)
            .bind(record.organization_id.0)
            .bind(version_to_db(record.version))
            .bind(&document)
            .bind(*record.created_at.as_datetime())
            .bind(*record.updated_at.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(Self::table(), e))?;
        append(
            &mut tx,
            scope,
            AuditEntry::new(E::KIND, AuditAction::Created, record.id, record.version),
        )
        .await?;
        tx.commit().await?;

        tracing::debug!(kind = %E::KIND, id = %record.id, "record created");
        Ok(record)
    }

    async fn read(&self, scope: &Scope, id: RecordId) -> Result<Record<E>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} \
             WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL",
            Self::table()
        );
        let row: Option<RecordRow> = sqlx::query_as(&sql)
            .bind(scope.organization_id.0)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| StoreError::not_found::<E>(id))?
            .into_record()
    }

    async fn update(
        &self,
        scope: &Scope,
        id: RecordId,
        expected: Version,
        patch: E::Patch,
    ) -> Result<Record<E>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut current = Self::lock_live(&mut tx, scope, id, expected).await?;
        current.fields.apply(&patch);
        current.fields.validate()?;
        let document = to_document(&current.fields)?;

        let sql = format!(
            "UPDATE {} SET fields = $1, version = version + 1, \
             updated_at = GREATEST($2, updated_at + interval '1 microsecond') \
             WHERE organization_id = $3 AND id = $4 AND version = $5 AND deleted_at IS NULL \
             RETURNING {COLUMNS}",
            Self::table()
        );
        let row: RecordRow = sqlx::query_as(&sql)
            .bind(&document)
            .bind(*Timestamp::now().as_datetime())
            .bind(scope.organization_id.0)
            .bind(id.0)
            .bind(version_to_db(expected))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_write_error(Self::table(), e))?
            .ok_or(StoreError::Conflict {
                expected,
                actual: expected.next(),
            })?;
        let updated = row.into_record::<E>()?;

        append(
            &mut tx,
            scope,
            AuditEntry::new(E::KIND, AuditAction::Updated, id, updated.version),
        )
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(
        &self,
        scope: &Scope,
        id: RecordId,
        expected: Version,
        mode: DeleteMode,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_live(&mut tx, scope, id, expected).await?;

        let version = match mode {
            DeleteMode::Soft => {
                let sql = format!(
                    "UPDATE {} SET deleted_at = GREATEST($1, updated_at + interval '1 microsecond'), \
                     updated_at = GREATEST($1, updated_at + interval '1 microsecond'), \
                     version = version + 1 \
                     WHERE organization_id = $2 AND id = $3 AND version = $4",
                    Self::table()
                );
                sqlx::query(&sql)
                    .bind(*Timestamp::now().as_datetime())
                    .bind(scope.organization_id.0)
                    .bind(id.0)
                    .bind(version_to_db(expected))
                    .execute(&mut *tx)
                    .await?;
                expected.next()
            }
            DeleteMode::Hard => {
                let sql = format!(
                    "DELETE FROM {} WHERE organization_id = $1 AND id = $2 AND version = $3",
                    Self::table()
                );
                sqlx::query(&sql)
                    .bind(scope.organization_id.0)
                    .bind(id.0)
                    .bind(version_to_db(expected))
                    .execute(&mut *tx)
                    .await?;
                expected
            }
        };

        append(
            &mut tx,
            scope,
            AuditEntry::new(E::KIND, AuditAction::Deleted, id, version)
                .with_metadata(json!({ "mode": mode.as_str() })),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        scope: &Scope,
        query: &Query<E::Filter>,
    ) -> Result<Page<Record<E>>, StoreError> {
        let mut sql = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COLUMNS} FROM {} WHERE deleted_at IS NULL AND organization_id = ",
            Self::table()
        ));
        sql.push_bind(scope.organization_id.0);
        E::push_filter(&query.filter, &mut sql);
        push_window(query, &mut sql)?;

        let rows: Vec<RecordRow> = sql.build_query_as().fetch_all(&self.pool).await?;
        let records = rows
            .into_iter()
            .map(RecordRow::into_record)
            .collect::<Result<Vec<Record<E>>, _>>()?;
        Ok(Page::assemble(records, query))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Append keyset condition, ORDER BY, LIMIT and OFFSET.
fn push_window<F>(query: &Query<F>, sql: &mut QueryBuilder<'_, Postgres>) -> Result<(), StoreError> {
    let column = match query.order.field {
        SortField::Id => None,
        SortField::CreatedAt => Some("created_at"),
        SortField::UpdatedAt => Some("updated_at"),
    };
    let (cmp, dir) = match query.order.direction {
        Direction::Asc => (">", "ASC"),
        Direction::Desc => ("<", "DESC"),
    };

    if let Pagination::Cursor {
        after: Some(cursor),
        ..
    } = query.pagination
    {
        match (column, cursor.sort_value) {
            (Some(column), Some(value)) => {
                sql.push(format!(" AND ({column}, id) {cmp} ("))
                    .push_bind(*value.as_datetime())
                    .push(", ")
                    .push_bind(cursor.id.0)
                    .push(")");
            }
            (None, None) => {
                sql.push(format!(" AND id {cmp} ")).push_bind(cursor.id.0);
            }
            _ => {
                return Err(StoreError::InvalidQuery(
                    "cursor does not match the requested order".into(),
                ))
            }
        }
    }

    match column {
        Some(column) => sql.push(format!(" ORDER BY {column} {dir}, id {dir}")),
        None => sql.push(format!(" ORDER BY id {dir}")),
    };
    let limit = i64::try_from(query.fetch_limit()).unwrap_or(i64::MAX);
    sql.push(" LIMIT ").push_bind(limit);
    if let Pagination::Offset { offset, .. } = query.pagination {
        sql.push(" OFFSET ")
            .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    organization_id: Uuid,
    version: i64,
    fields: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn into_record<E: PgEntity>(self) -> Result<Record<E>, StoreError> {
        let fields: E = serde_json::from_value(self.fields).map_err(|e| {
            StoreError::Corrupt(format!("{} {}: {e}", E::KIND, self.id))
        })?;
        let version = u64::try_from(self.version)
            .map(Version)
            .map_err(|_| StoreError::Corrupt(format!("{} {}: negative version", E::KIND, self.id)))?;
        Ok(Record {
            id: RecordId(self.id),
            organization_id: OrganizationId(self.organization_id),
            version,
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
            fields,
        })
    }
}

fn to_document<E: serde::Serialize>(fields: &E) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(fields).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn version_to_db(version: Version) -> i64 {
    i64::try_from(version.get()).unwrap_or(i64::MAX)
}

/// Map a unique violation on `uq_<table>_<field>` to `Duplicate`.
fn map_write_error(table: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            let prefix = format!("uq_{table}_");
            let field = db
                .constraint()
                .and_then(|name| name.strip_prefix(prefix.as_str()))
                .unwrap_or("unknown")
                .to_string();
            return StoreError::Duplicate { field };
        }
    }
    StoreError::Storage(err)
}
