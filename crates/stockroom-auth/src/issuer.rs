//! # Token Issuing
//!
//! [`TokenSigner`] mints compact tokens that [`crate::Authenticator`]
//! accepts. Stockroom itself never issues tokens on the request path; the
//! signer backs the operator CLI and the test suites.
//!
//! ## Security Invariant
//!
//! Signing keys are never serialized and `Debug` prints only the key id
//! and algorithm.

use ed25519_dalek::Signer;
use hmac::Mac;

use crate::claims::Claims;
use crate::error::AuthError;
use crate::keys::{from_hex, to_hex, KeyEntry, SharedSecret, VerificationKey};
use crate::token::{self, Algorithm, Header};

enum SigningKey {
    Ed25519(ed25519_dalek::SigningKey),
    Hs256(SharedSecret),
}

/// Signs claim sets into compact JWS tokens.
pub struct TokenSigner {
    kid: Option<String>,
    key: SigningKey,
}

impl TokenSigner {
    /// Fresh random Ed25519 key from the OS RNG.
    pub fn generate_ed25519(kid: Option<String>) -> Self {
        let key = ed25519_dalek::SigningKey::generate(&mut rand_core::OsRng);
        Self {
            kid,
            key: SigningKey::Ed25519(key),
        }
    }

    pub fn ed25519_from_seed(kid: Option<String>, seed: [u8; 32]) -> Self {
        Self {
            kid,
            key: SigningKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)),
        }
    }

    /// Parse a 64-character hex Ed25519 seed.
    pub fn ed25519_from_seed_hex(kid: Option<String>, hex: &str) -> Result<Self, AuthError> {
        let bytes = zeroize::Zeroizing::new(from_hex(hex.trim()).map_err(AuthError::Encoding)?);
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AuthError::Encoding(format!("seed must be 32 bytes, got {}", bytes.len())))?;
        Ok(Self::ed25519_from_seed(kid, seed))
    }

    pub fn hs256(kid: Option<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            kid,
            key: SigningKey::Hs256(SharedSecret::new(secret)),
        }
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn algorithm(&self) -> Algorithm {
        match &self.key {
            SigningKey::Ed25519(_) => Algorithm::EdDsa,
            SigningKey::Hs256(_) => Algorithm::Hs256,
        }
    }

    /// The matching entry for a trust snapshot.
    pub fn verification_key(&self) -> KeyEntry {
        let key = match &self.key {
            SigningKey::Ed25519(sk) => VerificationKey::Ed25519(sk.verifying_key()),
            SigningKey::Hs256(secret) => VerificationKey::Hs256(secret.clone()),
        };
        KeyEntry::new(self.kid.clone(), key)
    }

    /// Hex public key, for Ed25519 signers.
    pub fn public_key_hex(&self) -> Option<String> {
        match &self.key {
            SigningKey::Ed25519(sk) => Some(to_hex(sk.verifying_key().as_bytes())),
            SigningKey::Hs256(_) => None,
        }
    }

    /// Hex seed, for Ed25519 signers. Handle with care.
    pub fn seed_hex(&self) -> Option<zeroize::Zeroizing<String>> {
        match &self.key {
            SigningKey::Ed25519(sk) => Some(zeroize::Zeroizing::new(to_hex(&sk.to_bytes()))),
            SigningKey::Hs256(_) => None,
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        let header = Header::new(self.algorithm(), self.kid.clone());
        let signing_input = format!(
            "{}.{}",
            token::encode_segment(&header)?,
            token::encode_segment(claims)?
        );
        let signature = match &self.key {
            SigningKey::Ed25519(sk) => sk.sign(signing_input.as_bytes()).to_bytes().to_vec(),
            SigningKey::Hs256(secret) => {
                let mut mac = secret
                    .mac()
                    .ok_or_else(|| AuthError::Encoding("unusable HMAC key".into()))?;
                mac.update(signing_input.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
        };
        Ok(format!("{signing_input}.{}", token::encode_signature(&signature)))
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}
