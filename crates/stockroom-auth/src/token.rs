//! # Compact JWS Encoding
//!
//! Splits and decodes `header.claims.signature` tokens. Nothing here checks
//! a signature; see [`crate::verify`] for that.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::claims::Claims;
use crate::error::AuthError;

/// Upper bound on an encoded token, to bound decoding work.
pub const MAX_TOKEN_LEN: usize = 8 * 1024;

/// Accepted JWS algorithms. `none` and every other value is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    EdDsa,
    Hs256,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EdDsa => "EdDSA",
            Self::Hs256 => "HS256",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EdDSA" => Some(Self::EdDsa),
            "HS256" => Some(Self::Hs256),
            _ => None,
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JOSE header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Header {
    pub fn new(algorithm: Algorithm, kid: Option<String>) -> Self {
        Self {
            alg: algorithm.as_str().to_string(),
            typ: Some("JWT".to_string()),
            kid,
        }
    }
}

/// A token split into its parts, signature not yet checked.
#[derive(Debug)]
pub struct Decoded<'a> {
    pub header: Header,
    pub algorithm: Algorithm,
    pub claims: Claims,
    /// `header.claims`, the bytes the signature covers.
    pub signing_input: &'a str,
    pub signature: Vec<u8>,
}

/// Split and decode a compact token.
pub fn decode(token: &str) -> Result<Decoded<'_>, AuthError> {
    if token.len() > MAX_TOKEN_LEN {
        return Err(AuthError::Malformed("token too long".into()));
    }

    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::Malformed("expected three dot-separated parts".into()));
    };

    let header: Header = decode_json(header_b64, "header")?;
    let algorithm = Algorithm::parse(&header.alg)
        .ok_or_else(|| AuthError::Malformed(format!("unsupported algorithm {:?}", header.alg)))?;
    let claims: Claims = decode_json(claims_b64, "claims")?;
    let signature = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| AuthError::Malformed("signature is not base64url".into()))?;

    let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
    Ok(Decoded {
        header,
        algorithm,
        claims,
        signing_input,
        signature,
    })
}

/// Encode `value` as a base64url JSON segment.
pub fn encode_segment<T: Serialize>(value: &T) -> Result<String, AuthError> {
    let json = serde_json::to_vec(value).map_err(|e| AuthError::Encoding(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub(crate) fn encode_signature(signature: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(signature)
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::Malformed(format!("{what} is not base64url")))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::Malformed(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json)
    }

    fn token(header: &str, claims: &str) -> String {
        format!("{}.{}.{}", segment(header), segment(claims), URL_SAFE_NO_PAD.encode([0u8; 4]))
    }

    const CLAIMS: &str = r#"{"iss":"https://idp.test","sub":"alice","exp":4102444800}"#;

    #[test]
    fn decodes_well_formed_token() {
        let t = token(r#"{"alg":"EdDSA","kid":"k1"}"#, CLAIMS);
        let decoded = decode(&t).unwrap();
        assert_eq!(decoded.algorithm, Algorithm::EdDsa);
        assert_eq!(decoded.header.kid.as_deref(), Some("k1"));
        assert_eq!(decoded.claims.sub, "alice");
        assert_eq!(decoded.signature, vec![0u8; 4]);
        assert_eq!(decoded.signing_input.matches('.').count(), 1);
    }

    #[test]
    fn rejects_alg_none() {
        let t = token(r#"{"alg":"none"}"#, CLAIMS);
        assert!(matches!(decode(&t), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn rejects_rs256() {
        let t = token(r#"{"alg":"RS256"}"#, CLAIMS);
        assert!(matches!(decode(&t), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn rejects_wrong_part_count() {
        assert!(matches!(decode("a.b"), Err(AuthError::Malformed(_))));
        assert!(matches!(decode("a.b.c.d"), Err(AuthError::Malformed(_))));
        assert!(matches!(decode(""), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn rejects_non_json_claims() {
        let t = format!("{}.{}.AAAA", segment(r#"{"alg":"HS256"}"#), segment("not json"));
        assert!(matches!(decode(&t), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn rejects_oversized_token() {
        let t = "a".repeat(MAX_TOKEN_LEN + 1);
        assert!(matches!(decode(&t), Err(AuthError::Malformed(_))));
    }
}
