//! # Fixed-Point Money
//!
//! `Money` is an `i64` count of minor units (cents) with an implied scale
//! of two, matching the `NUMERIC(10, 2)` columns of the catalog.
//!
//! ## Serde
//!
//! - Serializes as a string with exactly two fractional digits (`"12.90"`).
//! - Deserializes from a string (`"12.9"`) or a JSON number (`12.9`).
//! - More than two fractional digits is an error, never a silent rounding.

use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MoneyError;

/// Largest magnitude representable in `NUMERIC(10, 2)`, in minor units.
const MAX_MINOR: i64 = 9_999_999_999;

/// A monetary (or percentage) amount with two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(0);

    /// The smallest positive amount, `0.01`.
    pub const CENT: Money = Money(1);

    /// Build from minor units (`1299` is `12.99`).
    pub fn from_minor(minor: i64) -> Result<Self, MoneyError> {
        if minor.abs() > MAX_MINOR {
            return Err(MoneyError::OutOfRange(minor.to_string()));
        }
        Ok(Self(minor))
    }

    /// Build from whole units (`12` is `12.00`).
    pub fn from_units(units: i64) -> Result<Self, MoneyError> {
        units
            .checked_mul(100)
            .ok_or_else(|| MoneyError::OutOfRange(units.to_string()))
            .and_then(Self::from_minor)
    }

    /// The amount in minor units.
    pub fn minor(&self) -> i64 {
        self.0
    }

    /// Whether the amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Parse a decimal string with at most two fractional digits.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(MoneyError::Empty);
        }

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };

        if int_part.is_empty()
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
            || (digits.contains('.') && frac_part.is_empty())
        {
            return Err(MoneyError::Invalid(input.to_string()));
        }
        if frac_part.len() > 2 {
            return Err(MoneyError::TooPrecise(input.to_string()));
        }

        let int_trimmed = int_part.trim_start_matches('0');
        if int_trimmed.len() > 8 {
            return Err(MoneyError::OutOfRange(input.to_string()));
        }

        let units: i64 = if int_trimmed.is_empty() {
            0
        } else {
            int_trimmed
                .parse()
                .map_err(|_| MoneyError::Invalid(input.to_string()))?
        };
        let cents: i64 = match frac_part.len() {
            0 => 0,
            1 => i64::from(frac_part.as_bytes()[0] - b'0') * 10,
            _ => frac_part
                .parse()
                .map_err(|_| MoneyError::Invalid(input.to_string()))?,
        };

        let minor = units * 100 + cents;
        Ok(Self(if negative { -minor } else { minor }))
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> de::Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a decimal amount as a string or number with at most 2 decimal places")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Money::from_units(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        let units = i64::try_from(v).map_err(|_| E::custom(MoneyError::OutOfRange(v.to_string())))?;
        Money::from_units(units).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        // `Display` for f64 prints the shortest representation that
        // round-trips, so 12.99 renders as "12.99" rather than 12.98999...
        Money::parse(&v.to_string()).map_err(E::custom)
    }
}
