//! # Entity Schema Contract
//!
//! [`Entity`] is what a domain type declares to become storable: its kind
//! (which names the table and the permission family), its validation
//! pipeline, its patch and filter types, and the uniqueness keys the store
//! must enforce within an organization.
//!
//! Entities carry no behaviour beyond data shape, patch application and
//! filter matching. Persistence, authorization and orchestration live in
//! the store, auth and API crates respectively.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::identity::RecordId;
use crate::validation::{Pipeline, ValidationErrors};

/// The persisted entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Category,
    Discount,
}

impl EntityKind {
    /// Every entity kind, in declaration order.
    pub const ALL: [EntityKind; 3] = [Self::Product, Self::Category, Self::Discount];

    /// Lowercase singular name (`"product"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Category => "category",
            Self::Discount => "discount",
        }
    }

    /// Inverse of [`EntityKind::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Relational table holding this kind (`"products"`).
    pub fn table(&self) -> &'static str {
        match self {
            Self::Product => "products",
            Self::Category => "categories",
            Self::Discount => "discounts",
        }
    }

    /// Uppercase label used in permission and audit names (`"PRODUCT"`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Product => "PRODUCT",
            Self::Category => "CATEGORY",
            Self::Discount => "DISCOUNT",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that must be unique among the live records of one organization.
///
/// `value` is already normalized (trimmed, lowercased) so that `"ABC-1"`
/// and `"abc-1 "` collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    pub field: &'static str,
    pub value: String,
}

impl UniqueKey {
    /// Build a key, normalizing the value.
    pub fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.trim().to_lowercase(),
        }
    }
}

/// A field that points at another record of the same organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub kind: EntityKind,
    pub id: RecordId,
}

impl Reference {
    pub fn new(field: &'static str, kind: EntityKind, id: RecordId) -> Self {
        Self { field, kind, id }
    }
}

/// A storable domain type.
pub trait Entity:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Which entity this is.
    const KIND: EntityKind;

    /// Partial update accepted by `Update`.
    type Patch: Clone + Debug + DeserializeOwned + Send + Sync + 'static;

    /// Query filter accepted by `Query`.
    type Filter: Clone + Debug + Default + Send + Sync + 'static;

    /// The validation pipeline for a complete value of this entity.
    fn pipeline() -> &'static Pipeline<Self>;

    /// Run [`Entity::pipeline`] against `self`.
    fn validate(&self) -> Result<(), ValidationErrors> {
        Self::pipeline().validate(self)
    }

    /// Apply a patch in place. Does not validate.
    fn apply(&mut self, patch: &Self::Patch);

    /// Values that must be unique per organization.
    fn unique_keys(&self) -> Vec<UniqueKey>;

    /// In-process evaluation of a query filter.
    fn matches(&self, filter: &Self::Filter) -> bool;

    /// Records this value points at. Each must exist, live, in the same
    /// organization before the value is written.
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }
}

/// Case-insensitive substring match used by the `q` filters.
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_consistent() {
        assert_eq!(EntityKind::Product.as_str(), "product");
        assert_eq!(EntityKind::Category.table(), "categories");
        assert_eq!(EntityKind::Discount.label(), "DISCOUNT");
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::parse("products"), None);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&EntityKind::Category).unwrap();
        assert_eq!(json, "\"category\"");
    }

    #[test]
    fn unique_key_normalizes() {
        assert_eq!(UniqueKey::new("sku", " ABC-1 "), UniqueKey::new("sku", "abc-1"));
    }

    #[test]
    fn contains_ci_ignores_case() {
        assert!(contains_ci("Blue Widget", "widget"));
        assert!(!contains_ci("Blue Widget", "gadget"));
    }
}
