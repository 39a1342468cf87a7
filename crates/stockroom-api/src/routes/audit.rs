//! # Audit API
//!
//! Read-only view of the caller's organization audit chain. Requires the
//! `AUDIT_READ` permission (SUPPORT and above).
//!
//! - `GET /v1/audit`: events in sequence order
//! - `GET /v1/audit/verify`: recompute every hash and link of the chain

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use stockroom_core::{EntityKind, RecordId};
use stockroom_store::{AuditEvent, AuditFilter, ChainReport};
use utoipa::IntoParams;

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::extract_query;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/audit", get(list_events))
        .route("/v1/audit/verify", get(verify_chain))
}

/// Audit event selection.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditParams {
    /// `product`, `category` or `discount`.
    #[param(value_type = Option<String>)]
    pub resource_kind: Option<EntityKind>,
    #[param(value_type = Option<String>)]
    pub resource_id: Option<RecordId>,
    /// Resume after this sequence number.
    pub after_sequence: Option<i64>,
    /// 1 to 1000 (default 100).
    pub limit: Option<u32>,
}

impl AuditParams {
    fn into_parts(self) -> Result<(AuditFilter, u32), AppError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > MAX_LIMIT {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        let filter = AuditFilter {
            resource_kind: self.resource_kind,
            resource_id: self.resource_id,
            after_sequence: self.after_sequence,
        };
        Ok((filter, limit))
    }
}

/// GET /v1/audit: List audit events.
#[utoipa::path(
    get,
    path = "/v1/audit",
    params(AuditParams),
    responses(
        (status = 200, description = "Events in sequence order"),
        (status = 400, description = "Bad filter or limit", body = crate::error::ErrorBody),
        (status = 403, description = "Caller lacks AUDIT_READ", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "audit"
)]
pub async fn list_events(
    State(state): State<AppState>,
    caller: Caller,
    params: Result<Query<AuditParams>, QueryRejection>,
) -> Result<Json<Vec<AuditEvent>>, AppError> {
    let (filter, limit) = extract_query(params)?.into_parts()?;
    let events = state.audit.events(caller.principal(), &filter, limit).await?;
    Ok(Json(events))
}

/// GET /v1/audit/verify: Verify the audit chain.
#[utoipa::path(
    get,
    path = "/v1/audit/verify",
    responses(
        (status = 200, description = "Chain report: total_events, broken_links, first_broken, chain_valid"),
        (status = 403, description = "Caller lacks AUDIT_READ", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "audit"
)]
pub async fn verify_chain(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ChainReport>, AppError> {
    let report = state.audit.verify(caller.principal()).await?;
    if !report.chain_valid {
        tracing::error!(
            broken_links = report.broken_links,
            first_broken = ?report.first_broken,
            "audit chain verification failed"
        );
    }
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limit() {
        let (filter, limit) = AuditParams::default().into_parts().unwrap();
        assert_eq!(limit, DEFAULT_LIMIT);
        assert_eq!(filter, AuditFilter::default());
    }

    #[test]
    fn limit_out_of_range() {
        for limit in [0, MAX_LIMIT + 1] {
            let params = AuditParams {
                limit: Some(limit),
                ..Default::default()
            };
            assert!(matches!(params.into_parts(), Err(AppError::BadRequest(_))));
        }
    }

    #[test]
    fn parses_kind_and_sequence() {
        let uri: axum::http::Uri = "/v1/audit?resource_kind=discount&after_sequence=4"
            .parse()
            .unwrap();
        let Query(params) = Query::<AuditParams>::try_from_uri(&uri).unwrap();
        let (filter, _) = params.into_parts().unwrap();
        assert_eq!(filter.resource_kind, Some(EntityKind::Discount));
        assert_eq!(filter.after_sequence, Some(4));
    }
}
