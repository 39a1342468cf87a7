//! # Record Envelope
//!
//! A [`Record`] wraps an entity's domain fields with the metadata the store
//! owns: identifier, tenant, version and audit timestamps. Callers only
//! ever hold transient copies; the repository owns the persisted form.
//!
//! ## Invariants
//!
//! - `id` is assigned at creation and never changes.
//! - `version` starts at 1 and increases by exactly one per successful write.
//! - `updated_at >= created_at`.

use serde::{Deserialize, Serialize};

use crate::identity::{OrganizationId, RecordId};
use crate::temporal::Timestamp;

/// Optimistic-concurrency version counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// The version assigned at creation.
    pub const INITIAL: Version = Version(1);

    /// The version following this one.
    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }

    /// The raw counter.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A persisted entity together with its store-managed metadata.
///
/// Serializes flat: envelope fields sit alongside the entity's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<E> {
    pub id: RecordId,
    pub organization_id: OrganizationId,
    pub version: Version,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(flatten)]
    pub fields: E,
}

impl<E> Record<E> {
    /// Wrap freshly validated fields as version 1 of a new record.
    pub fn create(organization_id: OrganizationId, fields: E) -> Self {
        let now = Timestamp::now();
        Self {
            id: RecordId::new(),
            organization_id,
            version: Version::INITIAL,
            created_at: now,
            updated_at: now,
            fields,
        }
    }

    /// Advance version and `updated_at` after a successful mutation.
    pub fn touch(&mut self) {
        self.version = self.version.next();
        self.updated_at = Timestamp::after(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        name: String,
    }

    #[test]
    fn create_assigns_initial_version_and_equal_timestamps() {
        let r = Record::create(OrganizationId::new(), Widget { name: "w".into() });
        assert_eq!(r.version, Version::INITIAL);
        assert_eq!(r.created_at, r.updated_at);
    }

    #[test]
    fn touch_bumps_version_and_moves_updated_at_forward() {
        let mut r = Record::create(OrganizationId::new(), Widget { name: "w".into() });
        let before = r.updated_at;
        r.touch();
        assert_eq!(r.version, Version(2));
        assert!(r.updated_at > before);
        assert!(r.updated_at >= r.created_at);
    }

    #[test]
    fn serializes_flat() {
        let r = Record::create(OrganizationId::new(), Widget { name: "Widget".into() });
        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["name"], json!("Widget"));
        assert_eq!(value["version"], json!(1));
        assert!(value.get("fields").is_none());
    }
}
