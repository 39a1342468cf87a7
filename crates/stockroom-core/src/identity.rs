//! # Identifier Newtypes
//!
//! Record and organization identifiers are distinct types so a tenant id
//! can never be passed where a record id is expected.
//!
//! ## Security Invariant
//!
//! Every repository call is scoped by an `OrganizationId` taken from the
//! verified token, never from the request body. Keeping the two id spaces
//! apart at the type level makes a cross-tenant lookup a compile error
//! rather than a data leak.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-generated identifier of a persisted record.
///
/// Backed by a UUIDv7, so identifiers are unique without coordination and
/// sort in roughly the order they were issued. Never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

/// Identifier of the organization (tenant) that owns a record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrganizationId(pub Uuid);

impl RecordId {
    /// Generate a fresh time-ordered record identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl OrganizationId {
    /// Generate a random organization identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrganizationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl FromStr for OrganizationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<Uuid> for OrganizationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
