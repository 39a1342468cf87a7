use std::sync::OnceLock;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::{contains_ci, Entity, EntityKind, Reference, UniqueKey};
use crate::identity::RecordId;
use crate::money::Money;
use crate::patch::{nullable, set, set_nullable};
use crate::validation::{rules, Pipeline};

use super::default_true;

/// How a discount's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is a percentage between 0.01 and 100.00.
    Percentage,
    /// `value` is an amount taken off the price.
    FixedAmount,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::FixedAmount => "fixed_amount",
        }
    }
}

/// A time-boxed price reduction, scoped to one product, one category, or
/// the whole store when neither is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Discount {
    /// Unique per organization (case-insensitive).
    #[schema(example = "Summer Sale")]
    pub name: String,
    pub kind: DiscountKind,
    #[schema(value_type = String, example = "15.00")]
    pub value: Money,
    /// First day the discount applies (inclusive).
    pub starts_on: NaiveDate,
    /// Last day the discount applies (inclusive).
    pub ends_on: NaiveDate,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub product_id: Option<RecordId>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub category_id: Option<RecordId>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "25.00")]
    pub minimum_purchase_amount: Option<Money>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Discount {
    /// Whether `date` falls within `starts_on..=ends_on`.
    pub fn in_effect_on(&self, date: NaiveDate) -> bool {
        self.starts_on <= date && date <= self.ends_on
    }
}

/// Partial update of a [`Discount`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
pub struct DiscountPatch {
    pub name: Option<String>,
    pub kind: Option<DiscountKind>,
    #[schema(value_type = Option<String>)]
    pub value: Option<Money>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub product_id: Option<Option<RecordId>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub category_id: Option<Option<RecordId>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub minimum_purchase_amount: Option<Option<Money>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub active: Option<bool>,
}

/// Query filter for discounts.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DiscountFilter {
    /// Case-insensitive match on name.
    pub q: Option<String>,
    pub active: Option<bool>,
    pub kind: Option<DiscountKind>,
    /// Only discounts whose date range contains this day.
    pub in_effect_on: Option<NaiveDate>,
}

/// 100.00 in minor units.
const HUNDRED_PERCENT: i64 = 10_000;

fn build_pipeline() -> Pipeline<Discount> {
    Pipeline::new()
        .field("name", |d: &Discount| rules::text(&d.name, 2, 255))
        .field("value", |d: &Discount| rules::money_positive(d.value))
        .field("minimum_purchase_amount", |d: &Discount| {
            match d.minimum_purchase_amount {
                Some(min) => rules::money_at_least(min, Money::ZERO),
                None => Ok(()),
            }
        })
        .field("description", |d: &Discount| {
            rules::optional_text(d.description.as_deref(), 500)
        })
        .cross("ends_on", |d: &Discount| {
            if d.starts_on <= d.ends_on {
                Ok(())
            } else {
                Err("must not be before starts_on".to_string())
            }
        })
        .cross("value", |d: &Discount| {
            if d.kind == DiscountKind::Percentage && d.value.minor() > HUNDRED_PERCENT {
                Err("percentage must not exceed 100.00".to_string())
            } else {
                Ok(())
            }
        })
        .cross("product_id", |d: &Discount| {
            if d.product_id.is_some() && d.category_id.is_some() {
                Err("cannot be combined with category_id".to_string())
            } else {
                Ok(())
            }
        })
}

impl Entity for Discount {
    const KIND: EntityKind = EntityKind::Discount;
    type Patch = DiscountPatch;
    type Filter = DiscountFilter;

    fn pipeline() -> &'static Pipeline<Self> {
        static PIPELINE: OnceLock<Pipeline<Discount>> = OnceLock::new();
        PIPELINE.get_or_init(build_pipeline)
    }

    fn apply(&mut self, patch: &DiscountPatch) {
        set(&mut self.name, &patch.name);
        set(&mut self.kind, &patch.kind);
        set(&mut self.value, &patch.value);
        set(&mut self.starts_on, &patch.starts_on);
        set(&mut self.ends_on, &patch.ends_on);
        set_nullable(&mut self.product_id, &patch.product_id);
        set_nullable(&mut self.category_id, &patch.category_id);
        set_nullable(
            &mut self.minimum_purchase_amount,
            &patch.minimum_purchase_amount,
        );
        set_nullable(&mut self.description, &patch.description);
        set(&mut self.active, &patch.active);
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("name", &self.name)]
    }

    fn references(&self) -> Vec<Reference> {
        let product = self
            .product_id
            .map(|id| Reference::new("product_id", EntityKind::Product, id));
        let category = self
            .category_id
            .map(|id| Reference::new("category_id", EntityKind::Category, id));
        product.into_iter().chain(category).collect()
    }

    fn matches(&self, filter: &DiscountFilter) -> bool {
        if filter.q.as_deref().is_some_and(|q| !contains_ci(&self.name, q)) {
            return false;
        }
        if filter.active.is_some_and(|a| a != self.active) {
            return false;
        }
        if filter.kind.is_some_and(|k| k != self.kind) {
            return false;
        }
        if filter.in_effect_on.is_some_and(|d| !self.in_effect_on(d)) {
            return false;
        }
        true
    }
}
