use sqlx::{Postgres, QueryBuilder};
use stockroom_core::{Category, Discount, Entity, Product};

/// An entity whose filter can be pushed down to SQL.
///
/// Implementations append `AND ...` clauses over the `fields` column and
/// must select exactly the rows [`Entity::matches`] accepts.
pub trait PgEntity: Entity {
    fn push_filter(filter: &Self::Filter, sql: &mut QueryBuilder<'_, Postgres>);
}

/// `%needle%` with LIKE metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_active(active: Option<bool>, sql: &mut QueryBuilder<'_, Postgres>) {
    if let Some(active) = active {
        sql.push(" AND (fields->>'active')::boolean = ").push_bind(active);
    }
}

impl PgEntity for Product {
    fn push_filter(filter: &Self::Filter, sql: &mut QueryBuilder<'_, Postgres>) {
        if let Some(q) = &filter.q {
            let pattern = like_pattern(q);
            sql.push(" AND (fields->>'name' ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR fields->>'sku' ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR fields->>'barcode' ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        push_active(filter.active, sql);
        if let Some(category_id) = filter.category_id {
            sql.push(" AND fields->>'category_id' = ")
                .push_bind(category_id.to_string());
        }
        if let Some(brand) = &filter.brand {
            sql.push(" AND lower(fields->>'brand') = lower(")
                .push_bind(brand.clone())
                .push(")");
        }
    }
}

impl PgEntity for Category {
    fn push_filter(filter: &Self::Filter, sql: &mut QueryBuilder<'_, Postgres>) {
        if let Some(q) = &filter.q {
            let pattern = like_pattern(q);
            sql.push(" AND (fields->>'name' ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR fields->>'code' ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        push_active(filter.active, sql);
    }
}

impl PgEntity for Discount {
    fn push_filter(filter: &Self::Filter, sql: &mut QueryBuilder<'_, Postgres>) {
        if let Some(q) = &filter.q {
            sql.push(" AND fields->>'name' ILIKE ")
                .push_bind(like_pattern(q));
        }
        push_active(filter.active, sql);
        if let Some(kind) = filter.kind {
            sql.push(" AND fields->>'kind' = ").push_bind(kind.as_str());
        }
        if let Some(day) = filter.in_effect_on {
            sql.push(" AND (fields->>'starts_on')::date <= ")
                .push_bind(day)
                .push(" AND (fields->>'ends_on')::date >= ")
                .push_bind(day);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::{DiscountFilter, DiscountKind, ProductFilter};

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }

    #[test]
    fn product_filter_pushes_every_clause() {
        let mut sql = QueryBuilder::<Postgres>::new("SELECT 1 FROM products WHERE true");
        let filter = ProductFilter {
            q: Some("wid".into()),
            active: Some(true),
            category_id: None,
            brand: Some("Acme".into()),
        };
        Product::push_filter(&filter, &mut sql);
        let text = sql.sql();
        assert!(text.contains("fields->>'sku' ILIKE $2"));
        assert!(text.contains("(fields->>'active')::boolean = $4"));
        assert!(text.contains("lower(fields->>'brand') = lower($5)"));
    }

    #[test]
    fn empty_filter_pushes_nothing() {
        let mut sql = QueryBuilder::<Postgres>::new("SELECT 1 FROM discounts WHERE true");
        Discount::push_filter(&DiscountFilter::default(), &mut sql);
        assert_eq!(sql.sql(), "SELECT 1 FROM discounts WHERE true");

        let by_kind = DiscountFilter {
            kind: Some(DiscountKind::FixedAmount),
            ..Default::default()
        };
        Discount::push_filter(&by_kind, &mut sql);
        assert!(sql.sql().ends_with("fields->>'kind' = $1"));
    }
}
