//! # Temporal Types: Server-Assigned Timestamps
//!
//! `Timestamp` is a UTC instant truncated to microseconds, the resolution
//! PostgreSQL `TIMESTAMPTZ` stores. Truncating at construction means a
//! record read back from the database compares equal to the one written.
//!
//! ## Invariant
//!
//! A record's `updated_at` is never earlier than its `created_at`, and each
//! successful write moves `updated_at` strictly forward. [`Timestamp::after`]
//! enforces this even when the wall clock steps backwards.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A UTC timestamp with microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to microseconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Wrap a `DateTime<Utc>`, truncating sub-microsecond components.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.trunc_subsecs(6))
    }

    /// The timestamp for a write that follows `previous`.
    ///
    /// Returns the current time, or `previous` plus one microsecond if the
    /// clock has not advanced past it.
    pub fn after(previous: Timestamp) -> Self {
        let now = Self::now();
        if now > previous {
            now
        } else {
            Self(previous.0 + Duration::microseconds(1))
        }
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Microseconds since the Unix epoch.
    pub fn timestamp_micros(&self) -> i64 {
        self.0.timestamp_micros()
    }

    /// Rebuild a timestamp from microseconds since the Unix epoch.
    pub fn from_micros(micros: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_micros(micros).map(Self)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
    }
}
