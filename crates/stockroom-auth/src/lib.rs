//! # stockroom-auth: Authentication and Authorization
//!
//! Verifies bearer tokens and decides what the caller may do.
//!
//! - [`Authenticator`] checks a compact JWS (EdDSA or HS256) against the
//!   keys in a [`TrustStore`] and yields a [`Principal`].
//! - [`authorize`] maps a principal's roles and permissions onto an
//!   [`Operation`].
//! - [`TokenSigner`] mints tokens for the CLI and tests.
//!
//! ## Crate Policy
//!
//! - Depends only on `stockroom-core` among workspace crates.
//! - No key material in `Debug` output or logs.

pub mod claims;
pub mod error;
pub mod issuer;
pub mod keys;
pub mod policy;
pub mod principal;
pub mod token;
pub mod trust;
pub mod verify;

pub use claims::{Audience, Claims};
pub use error::{AuthError, TrustError};
pub use issuer::TokenSigner;
pub use keys::{Ed25519PublicKey, KeyEntry, SharedSecret, VerificationKey};
pub use policy::{authorize, Action, Denied, Operation, Resource};
pub use principal::{Permission, Principal, Role};
pub use token::{Algorithm, Header};
pub use trust::{spawn_refresh, FileKeySource, IssuerKeys, KeySource, StaticKeySource, TrustSnapshot, TrustStore};
pub use verify::{Authenticator, VerifierConfig, DEFAULT_AUDIENCE, DEFAULT_LEEWAY};
