//! # Issuer Trust Store
//!
//! The set of token issuers Stockroom accepts, and the keys each one signs
//! with. Keys come from a [`KeySource`] and are swapped in as an immutable
//! [`TrustSnapshot`], so a verification in flight always sees one
//! consistent key set.
//!
//! ## Trust file
//!
//! ```yaml
//! issuers:
//!   - issuer: https://idp.example.com
//!     keys:
//!       - kid: 2026-10
//!         algorithm: EdDSA
//!         public_key: 3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c
//!       - algorithm: HS256
//!         secret: a-shared-secret-of-at-least-32-bytes
//! ```
//!
//! ## Refresh
//!
//! [`spawn_refresh`] reloads the source on an interval. A failed reload is
//! logged and the previous snapshot stays in force.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::TrustError;
use crate::keys::{Ed25519PublicKey, KeyEntry, SharedSecret, VerificationKey, MIN_SECRET_LEN};

/// Keys trusted for one issuer.
#[derive(Debug, Clone)]
pub struct IssuerKeys {
    pub issuer: String,
    pub keys: Vec<KeyEntry>,
}

/// An immutable view of every trusted issuer.
#[derive(Debug, Clone)]
pub struct TrustSnapshot {
    issuers: HashMap<String, IssuerKeys>,
    loaded_at: DateTime<Utc>,
}

impl TrustSnapshot {
    /// Build a snapshot; an issuer listed twice is an error.
    pub fn new(issuers: Vec<IssuerKeys>) -> Result<Self, TrustError> {
        let mut map = HashMap::with_capacity(issuers.len());
        for entry in issuers {
            if map.contains_key(&entry.issuer) {
                return Err(TrustError::DuplicateIssuer(entry.issuer));
            }
            map.insert(entry.issuer.clone(), entry);
        }
        Ok(Self {
            issuers: map,
            loaded_at: Utc::now(),
        })
    }

    pub fn empty() -> Self {
        Self {
            issuers: HashMap::new(),
            loaded_at: Utc::now(),
        }
    }

    /// Parse the YAML trust file format.
    pub fn from_yaml(yaml: &str) -> Result<Self, TrustError> {
        let file: TrustFile =
            serde_yaml::from_str(yaml).map_err(|e| TrustError::Parse(e.to_string()))?;
        let issuers = file
            .issuers
            .into_iter()
            .map(IssuerConfig::into_keys)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(issuers)
    }

    pub fn issuer(&self, issuer: &str) -> Option<&IssuerKeys> {
        self.issuers.get(issuer)
    }

    pub fn issuer_names(&self) -> impl Iterator<Item = &str> {
        self.issuers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.issuers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issuers.is_empty()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TrustFile {
    #[serde(default)]
    issuers: Vec<IssuerConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IssuerConfig {
    issuer: String,
    keys: Vec<KeyConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "algorithm")]
enum KeyConfig {
    #[serde(rename = "EdDSA")]
    EdDsa {
        #[serde(default)]
        kid: Option<String>,
        public_key: Ed25519PublicKey,
    },
    #[serde(rename = "HS256")]
    Hs256 {
        #[serde(default)]
        kid: Option<String>,
        secret: SharedSecret,
    },
}

impl IssuerConfig {
    fn into_keys(self) -> Result<IssuerKeys, TrustError> {
        let issuer = self.issuer;
        let invalid = |reason: String| TrustError::InvalidKey {
            issuer: issuer.clone(),
            reason,
        };

        let mut keys = Vec::with_capacity(self.keys.len());
        for key in self.keys {
            let entry = match key {
                KeyConfig::EdDsa { kid, public_key } => {
                    let vk = public_key.to_verifying_key().map_err(invalid)?;
                    KeyEntry::new(kid, VerificationKey::Ed25519(vk))
                }
                KeyConfig::Hs256 { kid, secret } => {
                    if secret.len() < MIN_SECRET_LEN {
                        return Err(invalid(format!(
                            "HS256 secret must be at least {MIN_SECRET_LEN} bytes"
                        )));
                    }
                    KeyEntry::new(kid, VerificationKey::Hs256(secret))
                }
            };
            keys.push(entry);
        }
        Ok(IssuerKeys { issuer, keys })
    }
}

/// Where trusted keys come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn load(&self) -> Result<TrustSnapshot, TrustError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Reads the YAML trust file from disk on every load.
#[derive(Debug, Clone)]
pub struct FileKeySource {
    path: PathBuf,
}

impl FileKeySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KeySource for FileKeySource {
    async fn load(&self) -> Result<TrustSnapshot, TrustError> {
        let yaml = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| TrustError::Io {
                path: self.path.clone(),
                source,
            })?;
        TrustSnapshot::from_yaml(&yaml)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// A fixed key set, for tests and embedded use.
#[derive(Debug, Clone)]
pub struct StaticKeySource(TrustSnapshot);

impl StaticKeySource {
    pub fn new(snapshot: TrustSnapshot) -> Self {
        Self(snapshot)
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn load(&self) -> Result<TrustSnapshot, TrustError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("static ({} issuers)", self.0.len())
    }
}

/// The live trust snapshot, replaceable at runtime.
#[derive(Debug)]
pub struct TrustStore {
    current: RwLock<Arc<TrustSnapshot>>,
}

impl TrustStore {
    pub fn new(snapshot: TrustSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Load an initial snapshot from `source`.
    pub async fn load(source: &dyn KeySource) -> Result<Self, TrustError> {
        Ok(Self::new(source.load().await?))
    }

    /// The snapshot currently in force.
    pub fn snapshot(&self) -> Arc<TrustSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn replace(&self, snapshot: TrustSnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }

    /// Reload from `source`. On error the current snapshot is kept.
    pub async fn refresh(&self, source: &dyn KeySource) -> Result<usize, TrustError> {
        let snapshot = source.load().await?;
        let issuers = snapshot.len();
        self.replace(snapshot);
        Ok(issuers)
    }
}

/// Reload `store` from `source` every `every`, until the task is aborted.
pub fn spawn_refresh(
    store: Arc<TrustStore>,
    source: Arc<dyn KeySource>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial load already happened.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.refresh(source.as_ref()).await {
                Ok(issuers) => {
                    tracing::debug!(source = %source.describe(), issuers, "trust store refreshed")
                }
                Err(e) => tracing::warn!(
                    source = %source.describe(),
                    error = %e,
                    "trust store refresh failed, keeping previous keys"
                ),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::keys::to_hex;

    fn public_hex() -> String {
        let sk = ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]);
        to_hex(sk.verifying_key().as_bytes())
    }

    fn yaml(issuer: &str) -> String {
        format!(
            "issuers:\n  - issuer: {issuer}\n    keys:\n      - kid: k1\n        algorithm: EdDSA\n        public_key: {}\n      - algorithm: HS256\n        secret: 0123456789abcdef0123456789abcdef\n",
            public_hex()
        )
    }

    #[test]
    fn parses_trust_file() {
        let snapshot = TrustSnapshot::from_yaml(&yaml("https://idp.test")).unwrap();
        let keys = snapshot.issuer("https://idp.test").unwrap();
        assert_eq!(keys.keys.len(), 2);
        assert_eq!(keys.keys[0].kid.as_deref(), Some("k1"));
        assert!(matches!(keys.keys[1].key, VerificationKey::Hs256(_)));
        assert!(snapshot.issuer("https://other.test").is_none());
    }

    #[test]
    fn short_secret_is_rejected() {
        let yaml = "issuers:\n  - issuer: a\n    keys:\n      - algorithm: HS256\n        secret: short\n";
        assert!(matches!(
            TrustSnapshot::from_yaml(yaml),
            Err(TrustError::InvalidKey { .. })
        ));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let yaml = "issuers:\n  - issuer: a\n    keys:\n      - algorithm: RS256\n        n: abc\n";
        assert!(matches!(TrustSnapshot::from_yaml(yaml), Err(TrustError::Parse(_))));
    }

    #[test]
    fn duplicate_issuer_is_rejected() {
        let twice = format!("{}{}", yaml("a"), yaml("a").replace("issuers:\n", ""));
        assert!(matches!(
            TrustSnapshot::from_yaml(&twice),
            Err(TrustError::DuplicateIssuer(_))
        ));
    }

    #[tokio::test]
    async fn file_source_reloads_changes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml("https://first.test").as_bytes()).unwrap();
        let source = FileKeySource::new(file.path());

        let store = TrustStore::load(&source).await.unwrap();
        assert!(store.snapshot().issuer("https://first.test").is_some());

        std::fs::write(file.path(), yaml("https://second.test")).unwrap();
        assert_eq!(store.refresh(&source).await.unwrap(), 1);
        let snapshot = store.snapshot();
        assert!(snapshot.issuer("https://first.test").is_none());
        assert!(snapshot.issuer("https://second.test").is_some());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml("https://first.test").as_bytes()).unwrap();
        let source = FileKeySource::new(file.path());
        let store = TrustStore::load(&source).await.unwrap();

        std::fs::write(file.path(), "issuers: [ not yaml").unwrap();
        assert!(store.refresh(&source).await.is_err());
        assert!(store.snapshot().issuer("https://first.test").is_some());
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let source = FileKeySource::new("/nonexistent/stockroom-trust.yaml");
        assert!(matches!(
            TrustStore::load(&source).await,
            Err(TrustError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn snapshot_held_across_replace_is_unchanged() {
        let store = TrustStore::new(TrustSnapshot::from_yaml(&yaml("a")).unwrap());
        let held = store.snapshot();
        store.replace(TrustSnapshot::empty());
        assert_eq!(held.len(), 1);
        assert!(store.snapshot().is_empty());
    }
}
