//! # Validation Pipelines
//!
//! Each entity describes its constraints as a [`Pipeline`] of plain
//! validator functions instead of declarative annotations. A pipeline has
//! two stages:
//!
//! 1. **Field rules**, each bound to one field. Every field rule runs and
//!    the first failure per field is reported.
//! 2. **Cross-field rules** (e.g. `starts_on <= ends_on`), which run only if
//!    stage 1 produced no failures. They may assume every field is
//!    individually well-formed.
//!
//! Validation is pure and deterministic: the same input always yields the
//! same [`ValidationErrors`], in field-name order.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// A single validator: returns the human-readable reason on failure.
pub type Rule<T> = Box<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

/// Field-level validation failures, keyed by field name.
#[derive(Error, Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
#[error("validation failed: {}", summarize(.0))]
pub struct ValidationErrors(BTreeMap<String, String>);

fn summarize(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, reason)| format!("{field}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    /// An empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set containing exactly one failure.
    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, reason);
        errors
    }

    /// Record a failure unless the field already has one.
    pub fn add(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| reason.into());
    }

    /// Whether no failures were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reason recorded for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Iterate over `(field, reason)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of failing fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// An ordered, two-stage set of validators for `T`.
pub struct Pipeline<T> {
    field_rules: Vec<(&'static str, Rule<T>)>,
    cross_rules: Vec<(&'static str, Rule<T>)>,
}

impl<T> Pipeline<T> {
    /// An empty pipeline that accepts everything.
    pub fn new() -> Self {
        Self {
            field_rules: Vec::new(),
            cross_rules: Vec::new(),
        }
    }

    /// Add a single-field rule reported under `field`.
    pub fn field(
        mut self,
        field: &'static str,
        rule: impl Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.field_rules.push((field, Box::new(rule)));
        self
    }

    /// Add a cross-field rule reported under `field`.
    pub fn cross(
        mut self,
        field: &'static str,
        rule: impl Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.cross_rules.push((field, Box::new(rule)));
        self
    }

    /// Run the pipeline against `value`.
    pub fn validate(&self, value: &T) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, rule) in &self.field_rules {
            if let Err(reason) = rule(value) {
                errors.add(*field, reason);
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        for (field, rule) in &self.cross_rules {
            if let Err(reason) = rule(value) {
                errors.add(*field, reason);
            }
        }
        errors.into_result()
    }
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "field_rules",
                &self.field_rules.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
            )
            .field(
                "cross_rules",
                &self.cross_rules.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Reusable single-value validators used by the catalog pipelines.
pub mod rules {
    use crate::Money;

    /// Required text: not blank, at least `min` characters once trimmed and
    /// at most `max` characters as stored.
    pub fn text(value: &str, min: usize, max: usize) -> Result<(), String> {
        let trimmed = value.trim().chars().count();
        if trimmed == 0 {
            return Err("must not be blank".to_string());
        }
        if trimmed < min || value.chars().count() > max {
            return Err(format!("must be between {min} and {max} characters"));
        }
        Ok(())
    }

    /// Optional text: at most `max` characters when present.
    pub fn optional_text(value: Option<&str>, max: usize) -> Result<(), String> {
        match value {
            Some(v) if v.chars().count() > max => {
                Err(format!("must not exceed {max} characters"))
            }
            _ => Ok(()),
        }
    }

    /// Identifier-like code: ASCII letters, digits, `-` and `_` only.
    pub fn code(value: &str) -> Result<(), String> {
        if value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            Ok(())
        } else {
            Err("may only contain letters, digits, '-' and '_'".to_string())
        }
    }

    /// Digits only, with one of the permitted lengths.
    pub fn digits(value: &str, lengths: &[usize]) -> Result<(), String> {
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err("must contain digits only".to_string());
        }
        if !lengths.contains(&value.len()) {
            let allowed = lengths
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(format!("must be {allowed} digits long"));
        }
        Ok(())
    }

    /// Absolute `http` or `https` URL with a host.
    pub fn url(value: &str) -> Result<(), String> {
        const REASON: &str = "must be an http or https URL";
        if value.chars().any(char::is_whitespace) {
            return Err(REASON.to_string());
        }
        let parsed = url::Url::parse(value).map_err(|e| format!("{REASON}: {e}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(REASON.to_string());
        }
        match parsed.host_str() {
            Some(host) if !host.is_empty() => Ok(()),
            _ => Err(REASON.to_string()),
        }
    }

    /// Amount no smaller than `min`.
    pub fn money_at_least(value: Money, min: Money) -> Result<(), String> {
        if value < min {
            Err(format!("must be at least {min}"))
        } else {
            Ok(())
        }
    }

    /// Amount strictly greater than zero.
    pub fn money_positive(value: Money) -> Result<(), String> {
        if value.is_positive() {
            Ok(())
        } else {
            Err("must be greater than 0.00".to_string())
        }
    }

    /// Integer no smaller than `min`.
    pub fn at_least(value: i32, min: i32) -> Result<(), String> {
        if value < min {
            Err(format!("must be at least {min}"))
        } else {
            Ok(())
        }
    }
}
