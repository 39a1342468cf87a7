use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::{contains_ci, Entity, EntityKind, UniqueKey};
use crate::patch::{nullable, set, set_nullable};
use crate::validation::{rules, Pipeline};

use super::default_true;

/// A product grouping such as "Beverages".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    /// Short code, unique per organization (case-insensitive).
    #[schema(example = "BEV")]
    pub code: String,
    /// Display name, unique per organization (case-insensitive).
    #[schema(example = "Beverages")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Partial update of a [`Category`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
pub struct CategoryPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub active: Option<bool>,
}

/// Query filter for categories.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CategoryFilter {
    /// Case-insensitive match on code or name.
    pub q: Option<String>,
    pub active: Option<bool>,
}

impl Entity for Category {
    const KIND: EntityKind = EntityKind::Category;
    type Patch = CategoryPatch;
    type Filter = CategoryFilter;

    fn pipeline() -> &'static Pipeline<Self> {
        static PIPELINE: OnceLock<Pipeline<Category>> = OnceLock::new();
        PIPELINE.get_or_init(|| {
            Pipeline::new()
                .field("code", |c: &Category| {
                    rules::text(&c.code, 2, 20).and_then(|_| rules::code(&c.code))
                })
                .field("name", |c: &Category| rules::text(&c.name, 2, 100))
                .field("description", |c: &Category| {
                    rules::optional_text(c.description.as_deref(), 500)
                })
        })
    }

    fn apply(&mut self, patch: &CategoryPatch) {
        set(&mut self.code, &patch.code);
        set(&mut self.name, &patch.name);
        set_nullable(&mut self.description, &patch.description);
        set(&mut self.active, &patch.active);
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new("code", &self.code),
            UniqueKey::new("name", &self.name),
        ]
    }

    fn matches(&self, filter: &CategoryFilter) -> bool {
        if let Some(q) = &filter.q {
            if !contains_ci(&self.name, q) && !contains_ci(&self.code, q) {
                return false;
            }
        }
        !filter.active.is_some_and(|a| a != self.active)
    }
}
