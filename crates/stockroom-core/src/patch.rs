//! Partial-update helpers.
//!
//! Patch types use `Option<T>` for required fields (absent means "leave
//! unchanged") and `Option<Option<T>>` for nullable fields, where an
//! explicit JSON `null` clears the stored value.

use serde::{Deserialize, Deserializer};

/// Deserialize a nullable patch field so that a present `null` becomes
/// `Some(None)`. Pair with `#[serde(default)]` so an absent field stays `None`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Overwrite `slot` when the patch carries a value.
pub fn set<T>(slot: &mut T, value: &Option<T>)
where
    T: Clone,
{
    if let Some(v) = value {
        *slot = v.clone();
    }
}

/// Overwrite or clear a nullable `slot` when the patch mentions it.
pub fn set_nullable<T>(slot: &mut Option<T>, value: &Option<Option<T>>)
where
    T: Clone,
{
    if let Some(v) = value {
        *slot = v.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "nullable")]
        brand: Option<Option<String>>,
    }

    #[test]
    fn absent_field_is_none() {
        let s: Sample = serde_json::from_str("{}").unwrap();
        assert_eq!(s.brand, None);
    }

    #[test]
    fn explicit_null_clears() {
        let s: Sample = serde_json::from_str(r#"{"brand": null}"#).unwrap();
        assert_eq!(s.brand, Some(None));
    }

    #[test]
    fn value_sets() {
        let s: Sample = serde_json::from_str(r#"{"brand": "Acme"}"#).unwrap();
        assert_eq!(s.brand, Some(Some("Acme".to_string())));
    }

    #[test]
    fn set_nullable_applies_each_case() {
        let mut slot = Some("old".to_string());
        set_nullable(&mut slot, &None);
        assert_eq!(slot.as_deref(), Some("old"));
        set_nullable(&mut slot, &Some(None));
        assert_eq!(slot, None);
        set_nullable(&mut slot, &Some(Some("new".to_string())));
        assert_eq!(slot.as_deref(), Some("new"));
    }
}
