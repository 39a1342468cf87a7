//! # Verification Keys
//!
//! Key material the trust store holds for each issuer, and the primitive
//! signature checks behind the two accepted JWS algorithms.
//!
//! ## Security Invariant
//!
//! - HS256 secrets live in [`SharedSecret`], which zeroizes on drop and
//!   never prints its bytes through `Debug`.
//! - Ed25519 verification uses `verify_strict`, rejecting malleable and
//!   small-order signatures.
//! - HMAC tags are compared in constant time.

use ed25519_dalek::Signature;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::token::Algorithm;

/// Shortest HS256 secret the trust store will accept, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// An Ed25519 public key (32 bytes), hex-encoded in trust files.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    /// Render the key as lowercase hex.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        let bytes = from_hex(hex.trim())?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("public key must be 32 bytes, got {}", b.len()))?;
        Ok(Self(arr))
    }

    pub fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, String> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| format!("invalid public key: {e}"))
    }
}

impl Serialize for Ed25519PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519PublicKey({}...)", &self.to_hex()[..16])
    }
}

/// An HS256 shared secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(Zeroizing<Vec<u8>>);

impl SharedSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn mac(&self) -> Option<Hmac<Sha256>> {
        Hmac::<Sha256>::new_from_slice(&self.0).ok()
    }
}

impl<'de> Deserialize<'de> for SharedSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secret = Zeroizing::new(String::deserialize(deserializer)?);
        Ok(Self::new(secret.as_bytes()))
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedSecret([REDACTED; {}])", self.0.len())
    }
}

/// Key material for one algorithm.
#[derive(Debug, Clone)]
pub enum VerificationKey {
    Ed25519(ed25519_dalek::VerifyingKey),
    Hs256(SharedSecret),
}

impl VerificationKey {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Ed25519(_) => Algorithm::EdDsa,
            Self::Hs256(_) => Algorithm::Hs256,
        }
    }

    /// Check `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::Ed25519(key) => match Signature::from_slice(signature) {
                Ok(sig) => key.verify_strict(message, &sig).is_ok(),
                Err(_) => false,
            },
            Self::Hs256(secret) => match secret.mac() {
                Some(mut mac) => {
                    mac.update(message);
                    let tag = mac.finalize().into_bytes();
                    tag.len() == signature.len() && bool::from(tag.as_slice().ct_eq(signature))
                }
                None => false,
            },
        }
    }
}

/// A verification key together with its optional key id.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub kid: Option<String>,
    pub key: VerificationKey,
}

impl KeyEntry {
    pub fn new(kid: Option<String>, key: VerificationKey) -> Self {
        Self { kid, key }
    }
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn from_hex(hex: &str) -> Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err(format!("hex string has odd length {}", hex.len()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex at offset {i}"))
        })
        .collect()
}
