use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::{contains_ci, Entity, EntityKind, Reference, UniqueKey};
use crate::identity::RecordId;
use crate::money::Money;
use crate::patch::{nullable, set, set_nullable};
use crate::validation::{rules, Pipeline};

use super::default_true;

/// A sellable catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    /// Stock keeping unit, unique per organization (case-insensitive).
    #[schema(example = "WID-001")]
    pub sku: String,
    #[schema(example = "Widget")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Shelf price, two decimal places.
    #[schema(value_type = String, example = "9.99")]
    pub retail_price: Money,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "4.50")]
    pub cost_price: Option<Money>,
    /// EAN-13 or UPC-A barcode, unique per organization.
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub category_id: Option<RecordId>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub reorder_point: Option<i32>,
    #[serde(default)]
    pub max_stock_level: Option<i32>,
    #[serde(default)]
    pub requires_expiration_date: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Partial update of a [`Product`]. `null` clears nullable fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
pub struct ProductPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[schema(value_type = Option<String>)]
    pub retail_price: Option<Money>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub cost_price: Option<Option<Money>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub barcode: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub category_id: Option<Option<RecordId>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub brand: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i32>)]
    pub reorder_point: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i32>)]
    pub max_stock_level: Option<Option<i32>>,
    pub requires_expiration_date: Option<bool>,
    pub active: Option<bool>,
}

/// Query filter for products.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductFilter {
    /// Case-insensitive match on name, SKU or barcode.
    pub q: Option<String>,
    pub active: Option<bool>,
    pub category_id: Option<RecordId>,
    /// Exact brand, case-insensitive.
    pub brand: Option<String>,
}

fn build_pipeline() -> Pipeline<Product> {
    Pipeline::new()
        .field("sku", |p: &Product| {
            rules::text(&p.sku, 2, 20).and_then(|_| rules::code(&p.sku))
        })
        .field("name", |p: &Product| rules::text(&p.name, 2, 100))
        .field("description", |p: &Product| {
            rules::optional_text(p.description.as_deref(), 500)
        })
        .field("retail_price", |p: &Product| {
            rules::money_at_least(p.retail_price, Money::CENT)
        })
        .field("cost_price", |p: &Product| match p.cost_price {
            Some(cost) => rules::money_at_least(cost, Money::ZERO),
            None => Ok(()),
        })
        .field("barcode", |p: &Product| match &p.barcode {
            Some(code) => rules::digits(code, &[12, 13]),
            None => Ok(()),
        })
        .field("brand", |p: &Product| rules::optional_text(p.brand.as_deref(), 100))
        .field("image_url", |p: &Product| match &p.image_url {
            Some(url) => rules::optional_text(Some(url), 500).and_then(|_| rules::url(url)),
            None => Ok(()),
        })
        .field("reorder_point", |p: &Product| match p.reorder_point {
            Some(n) => rules::at_least(n, 0),
            None => Ok(()),
        })
        .field("max_stock_level", |p: &Product| match p.max_stock_level {
            Some(n) => rules::at_least(n, 1),
            None => Ok(()),
        })
        .cross("cost_price", |p: &Product| match p.cost_price {
            Some(cost) if cost > p.retail_price => {
                Err("must not exceed retail_price".to_string())
            }
            _ => Ok(()),
        })
        .cross("reorder_point", |p: &Product| {
            match (p.reorder_point, p.max_stock_level) {
                (Some(reorder), Some(max)) if reorder > max => {
                    Err("must not exceed max_stock_level".to_string())
                }
                _ => Ok(()),
            }
        })
}

impl Entity for Product {
    const KIND: EntityKind = EntityKind::Product;
    type Patch = ProductPatch;
    type Filter = ProductFilter;

    fn pipeline() -> &'static Pipeline<Self> {
        static PIPELINE: OnceLock<Pipeline<Product>> = OnceLock::new();
        PIPELINE.get_or_init(build_pipeline)
    }

    fn apply(&mut self, patch: &ProductPatch) {
        set(&mut self.sku, &patch.sku);
        set(&mut self.name, &patch.name);
        set_nullable(&mut self.description, &patch.description);
        set(&mut self.retail_price, &patch.retail_price);
        set_nullable(&mut self.cost_price, &patch.cost_price);
        set_nullable(&mut self.barcode, &patch.barcode);
        set_nullable(&mut self.category_id, &patch.category_id);
        set_nullable(&mut self.brand, &patch.brand);
        set_nullable(&mut self.image_url, &patch.image_url);
        set_nullable(&mut self.reorder_point, &patch.reorder_point);
        set_nullable(&mut self.max_stock_level, &patch.max_stock_level);
        set(
            &mut self.requires_expiration_date,
            &patch.requires_expiration_date,
        );
        set(&mut self.active, &patch.active);
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        let mut keys = vec![UniqueKey::new("sku", &self.sku)];
        if let Some(barcode) = &self.barcode {
            keys.push(UniqueKey::new("barcode", barcode));
        }
        keys
    }

    fn references(&self) -> Vec<Reference> {
        self.category_id
            .map(|id| Reference::new("category_id", EntityKind::Category, id))
            .into_iter()
            .collect()
    }

    fn matches(&self, filter: &ProductFilter) -> bool {
        if let Some(q) = &filter.q {
            let hit = contains_ci(&self.name, q)
                || contains_ci(&self.sku, q)
                || self.barcode.as_deref().is_some_and(|b| contains_ci(b, q));
            if !hit {
                return false;
            }
        }
        if filter.active.is_some_and(|a| a != self.active) {
            return false;
        }
        if filter.category_id.is_some() && filter.category_id != self.category_id {
            return false;
        }
        if let Some(brand) = &filter.brand {
            if !self
                .brand
                .as_deref()
                .is_some_and(|b| b.eq_ignore_ascii_case(brand))
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    fn widget() -> Product {
        Product {
            sku: "WID-001".into(),
            name: "Widget".into(),
            description: None,
            retail_price: money("9.99"),
            cost_price: Some(money("4.50")),
            barcode: Some("012345678905".into()),
            category_id: None,
            brand: Some("Acme".into()),
            image_url: None,
            reorder_point: Some(5),
            max_stock_level: Some(100),
            requires_expiration_date: false,
            active: true,
        }
    }

    #[test]
    fn valid_product_passes() {
        assert!(widget().validate().is_ok());
    }

    #[test]
    fn minimal_json_gets_defaults() {
        let p: Product =
            serde_json::from_str(r#"{"sku":"A1","name":"Widget","retail_price":9.99}"#).unwrap();
        assert!(p.active);
        assert!(!p.requires_expiration_date);
        assert!(p.barcode.is_none());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn zero_price_is_rejected() {
        let p = Product {
            retail_price: Money::ZERO,
            ..widget()
        };
        let errors = p.validate().unwrap_err();
        assert_eq!(errors.get("retail_price"), Some("must be at least 0.01"));
    }

    #[test]
    fn field_failures_are_collected_together() {
        let p = Product {
            sku: "x".into(),
            name: "".into(),
            barcode: Some("123".into()),
            ..widget()
        };
        let errors = p.validate().unwrap_err();
        assert!(errors.get("sku").is_some());
        assert!(errors.get("name").is_some());
        assert!(errors.get("barcode").is_some());
    }

    #[test]
    fn sku_with_spaces_is_rejected() {
        let p = Product {
            sku: "WID 001".into(),
            ..widget()
        };
        assert!(p.validate().unwrap_err().get("sku").is_some());
    }

    #[test]
    fn cost_above_retail_is_a_cross_field_failure() {
        let p = Product {
            cost_price: Some(money("10.00")),
            ..widget()
        };
        let errors = p.validate().unwrap_err();
        assert_eq!(errors.get("cost_price"), Some("must not exceed retail_price"));
    }

    #[test]
    fn cross_field_rules_wait_for_field_rules() {
        let p = Product {
            cost_price: Some(money("10.00")),
            name: "".into(),
            ..widget()
        };
        let errors = p.validate().unwrap_err();
        assert!(errors.get("cost_price").is_none());
        assert!(errors.get("name").is_some());
    }

    #[test]
    fn reorder_point_above_max_stock_is_rejected() {
        let p = Product {
            reorder_point: Some(200),
            ..widget()
        };
        assert_eq!(
            p.validate().unwrap_err().get("reorder_point"),
            Some("must not exceed max_stock_level")
        );
    }

    #[test]
    fn padded_name_over_limit_is_rejected() {
        let p = Product {
            name: format!("ab{}", " ".repeat(200)),
            ..widget()
        };
        assert!(p.validate().unwrap_err().get("name").is_some());
    }

    #[test]
    fn malformed_image_url_is_rejected() {
        for url in ["https:///", "http://%%%", "http://[::1"] {
            let p = Product {
                image_url: Some(url.into()),
                ..widget()
            };
            assert!(p.validate().unwrap_err().get("image_url").is_some(), "{url}");
        }
        let ok = Product {
            image_url: Some("https://cdn.example.com/widget.png".into()),
            ..widget()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn patch_sets_and_clears() {
        let mut p = widget();
        let patch: ProductPatch =
            serde_json::from_str(r#"{"retail_price":"12.99","brand":null}"#).unwrap();
        p.apply(&patch);
        assert_eq!(p.retail_price, money("12.99"));
        assert_eq!(p.brand, None);
        assert_eq!(p.sku, "WID-001");
        assert_eq!(p.cost_price, Some(money("4.50")));
    }

    #[test]
    fn unique_keys_include_barcode_when_present() {
        let keys = widget().unique_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], UniqueKey::new("sku", "wid-001"));

        let no_barcode = Product {
            barcode: None,
            ..widget()
        };
        assert_eq!(no_barcode.unique_keys().len(), 1);
    }

    #[test]
    fn category_is_the_only_reference() {
        assert!(widget().references().is_empty());
        let category = RecordId::new();
        let p = Product {
            category_id: Some(category),
            ..widget()
        };
        assert_eq!(
            p.references(),
            [Reference::new("category_id", EntityKind::Category, category)]
        );
    }

    #[test]
    fn filter_matches() {
        let p = widget();
        assert!(p.matches(&ProductFilter::default()));
        assert!(p.matches(&ProductFilter {
            q: Some("widg".into()),
            ..Default::default()
        }));
        assert!(p.matches(&ProductFilter {
            q: Some("0123".into()),
            ..Default::default()
        }));
        assert!(!p.matches(&ProductFilter {
            active: Some(false),
            ..Default::default()
        }));
        assert!(p.matches(&ProductFilter {
            brand: Some("ACME".into()),
            ..Default::default()
        }));
        assert!(!p.matches(&ProductFilter {
            category_id: Some(RecordId::new()),
            ..Default::default()
        }));
    }
}
