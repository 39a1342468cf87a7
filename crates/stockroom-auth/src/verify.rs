//! # Token Verification
//!
//! [`Authenticator`] turns a bearer token into a [`Principal`]. Checks run
//! in a fixed order, and the first failure decides the error:
//!
//! 1. structure and algorithm (`Malformed`)
//! 2. issuer is trusted (`UnknownIssuer`)
//! 3. signature under one of the issuer's keys (`InvalidSignature`)
//! 4. `exp` with leeway (`Expired`)
//! 5. `nbf`, `aud`, and the Stockroom claims (`InvalidClaims`)
//!
//! Time-based claims are only looked at once the signature is known good.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AuthError;
use crate::principal::Principal;
use crate::token;
use crate::trust::TrustStore;

/// Audience expected when none is configured explicitly.
pub const DEFAULT_AUDIENCE: &str = "stockroom-api";

/// Clock skew tolerated on `exp` and `nbf`.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Required `aud` value. `None` disables the audience check.
    pub audience: Option<String>,
    pub leeway: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            audience: Some(DEFAULT_AUDIENCE.to_string()),
            leeway: DEFAULT_LEEWAY,
        }
    }
}

/// Verifies bearer tokens against the live trust store.
#[derive(Debug, Clone)]
pub struct Authenticator {
    trust: Arc<TrustStore>,
    config: VerifierConfig,
}

impl Authenticator {
    pub fn new(trust: Arc<TrustStore>, config: VerifierConfig) -> Self {
        Self { trust, config }
    }

    pub fn trust(&self) -> &Arc<TrustStore> {
        &self.trust
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        self.authenticate_at(token, Utc::now())
    }

    /// Verify as of `now`.
    pub fn authenticate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, AuthError> {
        let decoded = token::decode(token)?;
        let claims = &decoded.claims;

        let snapshot = self.trust.snapshot();
        let issuer = snapshot
            .issuer(&claims.iss)
            .ok_or_else(|| AuthError::UnknownIssuer(claims.iss.clone()))?;

        let kid = decoded.header.kid.as_deref();
        let verified = issuer
            .keys
            .iter()
            .filter(|entry| entry.key.algorithm() == decoded.algorithm)
            .filter(|entry| kid.is_none() || entry.kid.as_deref() == kid)
            .any(|entry| {
                entry
                    .key
                    .verify(decoded.signing_input.as_bytes(), &decoded.signature)
            });
        if !verified {
            return Err(AuthError::InvalidSignature);
        }

        let leeway = i64::try_from(self.config.leeway.as_secs()).unwrap_or(i64::MAX);
        let now_secs = now.timestamp();
        if now_secs > claims.exp.saturating_add(leeway) {
            return Err(AuthError::Expired);
        }
        if let Some(nbf) = claims.nbf {
            if now_secs.saturating_add(leeway) < nbf {
                return Err(AuthError::InvalidClaims("token not yet valid".into()));
            }
        }
        if let Some(expected) = &self.config.audience {
            let accepted = claims.aud.as_ref().is_some_and(|aud| aud.contains(expected));
            if !accepted {
                return Err(AuthError::InvalidClaims(format!(
                    "audience does not include {expected}"
                )));
            }
        }

        Principal::from_claims(claims)
    }
}
