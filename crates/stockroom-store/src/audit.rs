//! # Audit Trail: Per-Organization Hash Chain
//!
//! Every successful write appends an [`AuditEvent`] in the same atomic step
//! as the write itself. Events of one organization form a chain: each
//! event's hash covers its own fields and the previous event's hash, with
//! an all-zero hash before the first event.
//!
//! ```text
//! event_hash = SHA-256(previous_hash \n organization_id \n sequence \n
//!                      event_type \n resource_id \n version \n actor \n
//!                      created_at_micros \n metadata_json)
//! ```
//!
//! [`verify_chain`] recomputes every hash and link; any edit, reorder or
//! deletion inside the chain is reported.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use stockroom_core::{EntityKind, OrganizationId, RecordId, Timestamp, Version};
use uuid::Uuid;

use crate::error::StoreError;
use crate::repository::Scope;

/// Hash preceding the first event of every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
        }
    }
}

/// One link of an organization's audit chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub organization_id: OrganizationId,
    /// Position in the organization's chain, starting at 1.
    pub sequence: i64,
    /// `<KIND>_<ACTION>`, e.g. `PRODUCT_UPDATED`.
    pub event_type: String,
    pub resource_kind: EntityKind,
    pub resource_id: RecordId,
    /// Record version the write produced (or removed, for deletes).
    pub version: Version,
    pub actor: String,
    pub metadata: serde_json::Value,
    pub previous_hash: String,
    pub event_hash: String,
    pub created_at: Timestamp,
}

/// What a write did, before it is placed in the chain.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub kind: EntityKind,
    pub action: AuditAction,
    pub resource_id: RecordId,
    pub version: Version,
    pub metadata: serde_json::Value,
}

impl AuditEntry {
    pub fn new(kind: EntityKind, action: AuditAction, resource_id: RecordId, version: Version) -> Self {
        Self {
            kind,
            action,
            resource_id,
            version,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

impl AuditEvent {
    /// Chain `entry` after `previous` (sequence and hash of the tail).
    pub fn chained(previous: Option<(i64, &str)>, scope: &Scope, entry: AuditEntry) -> Self {
        let (sequence, previous_hash) = match previous {
            Some((seq, hash)) => (seq + 1, hash.to_string()),
            None => (1, GENESIS_HASH.to_string()),
        };
        let mut event = Self {
            id: Uuid::now_v7(),
            organization_id: scope.organization_id,
            sequence,
            event_type: format!("{}_{}", entry.kind.label(), entry.action.as_str()),
            resource_kind: entry.kind,
            resource_id: entry.resource_id,
            version: entry.version,
            actor: scope.actor.clone(),
            metadata: entry.metadata,
            previous_hash,
            event_hash: String::new(),
            created_at: Timestamp::now(),
        };
        event.event_hash = event.compute_hash();
        event
    }

    /// Hash over every field except `id` and `event_hash`.
    pub fn compute_hash(&self) -> String {
        let input = format!(
            "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}",
            self.previous_hash,
            self.organization_id,
            self.sequence,
            self.event_type,
            self.resource_id,
            self.version,
            self.actor,
            self.created_at.timestamp_micros(),
            self.metadata,
        );
        let digest = Sha256::digest(input.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Outcome of [`verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub total_events: usize,
    pub broken_links: usize,
    /// Sequence number of the first event that failed a check.
    pub first_broken: Option<i64>,
    pub chain_valid: bool,
}

/// Check hashes and links of one organization's events, in sequence order.
pub fn verify_chain(events: &[AuditEvent]) -> ChainReport {
    let mut broken_links = 0;
    let mut first_broken = None;
    let mut expected_prev = GENESIS_HASH;
    let mut expected_seq = 1;

    for event in events {
        let intact = event.sequence == expected_seq
            && event.previous_hash == expected_prev
            && event.event_hash == event.compute_hash();
        if !intact {
            broken_links += 1;
            first_broken.get_or_insert(event.sequence);
        }
        expected_prev = &event.event_hash;
        expected_seq = event.sequence + 1;
    }

    ChainReport {
        total_events: events.len(),
        broken_links,
        first_broken,
        chain_valid: broken_links == 0,
    }
}

/// Selects audit events of the caller's organization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub resource_kind: Option<EntityKind>,
    pub resource_id: Option<RecordId>,
    /// Only events with a larger sequence number.
    pub after_sequence: Option<i64>,
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        self.resource_kind.map_or(true, |k| k == event.resource_kind)
            && self.resource_id.map_or(true, |id| id == event.resource_id)
            && self.after_sequence.map_or(true, |s| event.sequence > s)
    }
}

/// Read access to the audit chain.
#[async_trait]
pub trait AuditTrail: Send + Sync {
    /// Matching events in sequence order, at most `limit`.
    async fn events(
        &self,
        scope: &Scope,
        filter: &AuditFilter,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, StoreError>;

    /// Verify the organization's whole chain.
    async fn verify(&self, scope: &Scope) -> Result<ChainReport, StoreError>;
}

/// In-process audit chain shared by the in-memory stores.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLog {
    chains: Arc<Mutex<HashMap<OrganizationId, Vec<AuditEvent>>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&self, scope: &Scope, entry: AuditEntry) -> AuditEvent {
        let mut chains = self.chains.lock();
        let chain = chains.entry(scope.organization_id).or_default();
        let tail = chain.last().map(|e| (e.sequence, e.event_hash.as_str()));
        let event = AuditEvent::chained(tail, scope, entry);
        chain.push(event.clone());
        event
    }

    /// Every event of `organization_id`, in order.
    pub fn snapshot(&self, organization_id: OrganizationId) -> Vec<AuditEvent> {
        self.chains
            .lock()
            .get(&organization_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditTrail for MemoryAuditLog {
    async fn events(
        &self,
        scope: &Scope,
        filter: &AuditFilter,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, StoreError> {
        let chains = self.chains.lock();
        Ok(chains
            .get(&scope.organization_id)
            .map(|chain| {
                chain
                    .iter()
                    .filter(|e| filter.matches(e))
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn verify(&self, scope: &Scope) -> Result<ChainReport, StoreError> {
        Ok(verify_chain(&self.snapshot(scope.organization_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new(OrganizationId::new(), "alice")
    }

    fn entry(action: AuditAction) -> AuditEntry {
        AuditEntry::new(EntityKind::Product, action, RecordId::new(), Version::INITIAL)
    }

    #[test]
    fn first_event_links_to_genesis() {
        let log = MemoryAuditLog::new();
        let s = scope();
        let event = log.append(&s, entry(AuditAction::Created));
        assert_eq!(event.sequence, 1);
        assert_eq!(event.previous_hash, GENESIS_HASH);
        assert_eq!(event.event_type, "PRODUCT_CREATED");
        assert_eq!(event.actor, "alice");
        assert_eq!(event.event_hash.len(), 64);
    }

    #[test]
    fn events_link_to_their_predecessor() {
        let log = MemoryAuditLog::new();
        let s = scope();
        let a = log.append(&s, entry(AuditAction::Created));
        let b = log.append(&s, entry(AuditAction::Updated));
        assert_eq!(b.sequence, 2);
        assert_eq!(b.previous_hash, a.event_hash);
        assert!(verify_chain(&log.snapshot(s.organization_id)).chain_valid);
    }

    #[test]
    fn organizations_have_independent_chains() {
        let log = MemoryAuditLog::new();
        let (a, b) = (scope(), scope());
        log.append(&a, entry(AuditAction::Created));
        let first_b = log.append(&b, entry(AuditAction::Created));
        assert_eq!(first_b.sequence, 1);
        assert_eq!(first_b.previous_hash, GENESIS_HASH);
    }

    #[test]
    fn tampering_is_detected() {
        let log = MemoryAuditLog::new();
        let s = scope();
        for _ in 0..3 {
            log.append(&s, entry(AuditAction::Updated));
        }
        let mut events = log.snapshot(s.organization_id);
        events[1].actor = "mallory".into();
        let report = verify_chain(&events);
        assert!(!report.chain_valid);
        assert_eq!(report.first_broken, Some(2));
    }

    #[test]
    fn removed_event_is_detected() {
        let log = MemoryAuditLog::new();
        let s = scope();
        for _ in 0..3 {
            log.append(&s, entry(AuditAction::Updated));
        }
        let mut events = log.snapshot(s.organization_id);
        events.remove(1);
        assert_eq!(verify_chain(&events).first_broken, Some(3));
    }

    #[tokio::test]
    async fn events_are_filtered_and_limited() {
        let log = MemoryAuditLog::new();
        let s = scope();
        let target = RecordId::new();
        log.append(&s, AuditEntry::new(EntityKind::Product, AuditAction::Created, target, Version(1)));
        log.append(&s, entry(AuditAction::Created));
        log.append(&s, AuditEntry::new(EntityKind::Product, AuditAction::Updated, target, Version(2)));

        let filter = AuditFilter {
            resource_id: Some(target),
            ..Default::default()
        };
        let events = log.events(&s, &filter, 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type, "PRODUCT_UPDATED");

        let limited = log.events(&s, &AuditFilter::default(), 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        let other_org = log.events(&scope(), &AuditFilter::default(), 10).await.unwrap();
        assert!(other_org.is_empty());
    }
}
