//! Error types for token verification and trust store loading.

use std::path::PathBuf;

use thiserror::Error;

/// Why a bearer token was rejected.
///
/// The HTTP layer maps every variant to `401 Unauthorized`; the variant is
/// only logged, never echoed to the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The token is not a well-formed compact JWS or uses an algorithm we
    /// do not accept.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// No trusted key for the issuer produced a matching signature.
    #[error("invalid token signature")]
    InvalidSignature,

    /// `exp` is in the past, beyond the configured leeway.
    #[error("token expired")]
    Expired,

    /// `iss` names an issuer absent from the trust store.
    #[error("unknown token issuer: {0}")]
    UnknownIssuer(String),

    /// Signature is valid but a claim fails a check (`nbf`, `aud`,
    /// `organization_id`).
    #[error("invalid token claims: {0}")]
    InvalidClaims(String),

    /// Token could not be produced (signer side only).
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Failure to load or refresh the issuer trust store.
#[derive(Error, Debug)]
pub enum TrustError {
    #[error("failed to read trust file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse trust file: {0}")]
    Parse(String),

    #[error("invalid key for issuer {issuer}: {reason}")]
    InvalidKey { issuer: String, reason: String },

    #[error("issuer {0} is listed more than once")]
    DuplicateIssuer(String),
}
