//! JWT claim set.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The `aud` claim: a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::One(a) => a == audience,
            Self::Many(all) => all.iter().any(|a| a == audience),
        }
    }
}

/// Registered and Stockroom-specific claims.
///
/// `authorities` follows the Spring convention: entries prefixed `ROLE_`
/// are roles, anything else is a fine-grained permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authorities: Vec<String>,
    /// Space-separated OAuth scopes; treated as extra authorities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Claims {
    /// Claims issued at `now` that expire after `ttl`.
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            iss: issuer.into(),
            sub: subject.into(),
            aud: None,
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
            nbf: None,
            organization_id: None,
            store_id: None,
            authorities: Vec::new(),
            scope: None,
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.aud = Some(Audience::One(audience.into()));
        self
    }

    pub fn with_organization(mut self, organization_id: impl ToString) -> Self {
        self.organization_id = Some(organization_id.to_string());
        self
    }

    pub fn with_store(mut self, store_id: impl ToString) -> Self {
        self.store_id = Some(store_id.to_string());
        self
    }

    pub fn with_authorities<I, S>(mut self, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorities.extend(authorities.into_iter().map(Into::into));
        self
    }

    /// `authorities` followed by the whitespace-split `scope` entries.
    pub fn all_authorities(&self) -> impl Iterator<Item = &str> {
        self.authorities
            .iter()
            .map(String::as_str)
            .chain(self.scope.iter().flat_map(|s| s.split_whitespace()))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
