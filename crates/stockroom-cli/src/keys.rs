//! # Key Subcommands
//!
//! `keygen` writes an Ed25519 issuer keypair and prints the trust file
//! entry the API server needs to accept tokens signed with it. `trust`
//! parses a trust file the same way the server does.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use stockroom_auth::{TokenSigner, TrustSnapshot};

/// Arguments for `stockroom keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Output directory for the keypair files.
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,
    /// Prefix for the key filenames.
    #[arg(long, default_value = "stockroom")]
    pub prefix: String,
    /// Issuer URL to put in the printed trust file entry.
    #[arg(long, default_value = "https://idp.example.com")]
    pub issuer: String,
    /// Key id stamped into token headers and the trust entry.
    #[arg(long)]
    pub kid: Option<String>,
}

/// Arguments for `stockroom trust`.
#[derive(Args, Debug)]
pub struct TrustArgs {
    /// Trust file to check.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Serialize)]
struct TrustEntry<'a> {
    issuers: [IssuerEntry<'a>; 1],
}

#[derive(Serialize)]
struct IssuerEntry<'a> {
    issuer: &'a str,
    keys: [KeyEntry<'a>; 1],
}

#[derive(Serialize)]
struct KeyEntry<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
    algorithm: &'static str,
    public_key: String,
}

/// Generate a keypair and write `<prefix>.key` (seed) and `<prefix>.pub`.
pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    std::fs::create_dir_all(&args.output).with_context(|| {
        format!("failed to create output directory: {}", args.output.display())
    })?;

    let signer = TokenSigner::generate_ed25519(args.kid.clone());
    let public_hex = signer
        .public_key_hex()
        .context("generated signer has no public key")?;
    let seed_hex = signer.seed_hex().context("generated signer has no seed")?;

    let key_path = args.output.join(format!("{}.key", args.prefix));
    let pub_path = args.output.join(format!("{}.pub", args.prefix));
    write_private(&key_path, seed_hex.as_bytes())?;
    std::fs::write(&pub_path, &public_hex)
        .with_context(|| format!("failed to write public key: {}", pub_path.display()))?;

    let entry = TrustEntry {
        issuers: [IssuerEntry {
            issuer: &args.issuer,
            keys: [KeyEntry {
                kid: args.kid.as_deref(),
                algorithm: "EdDSA",
                public_key: public_hex.clone(),
            }],
        }],
    };

    println!("OK: generated Ed25519 issuer keypair");
    println!("  Private key: {}", key_path.display());
    println!("  Public key:  {}", pub_path.display());
    println!();
    println!("# trust file entry");
    print!("{}", serde_yaml::to_string(&entry).context("failed to render trust entry")?);

    Ok(0)
}

/// Parse a trust file and list its issuers. Exit 1 if it does not load.
pub fn run_trust(args: &TrustArgs) -> Result<u8> {
    let yaml = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read trust file: {}", args.file.display()))?;
    match TrustSnapshot::from_yaml(&yaml) {
        Ok(snapshot) => {
            println!("OK: {} issuer(s)", snapshot.len());
            for issuer in snapshot.issuer_names() {
                let keys = snapshot.issuer(issuer).map_or(0, |i| i.keys.len());
                println!("  {issuer} ({keys} key(s))");
            }
            Ok(0)
        }
        Err(e) => {
            println!("FAIL: {e}");
            Ok(1)
        }
    }
}

fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write private key: {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict permissions: {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keygen(dir: &Path) -> KeygenArgs {
        KeygenArgs {
            output: dir.to_path_buf(),
            prefix: "test".into(),
            issuer: "https://idp.test".into(),
            kid: Some("k1".into()),
        }
    }

    #[test]
    fn keygen_creates_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(run_keygen(&keygen(dir.path())).unwrap(), 0);

        let seed = std::fs::read_to_string(dir.path().join("test.key")).unwrap();
        let public = std::fs::read_to_string(dir.path().join("test.pub")).unwrap();
        assert_eq!(seed.len(), 64);
        assert_eq!(public.len(), 64);

        let signer = TokenSigner::ed25519_from_seed_hex(None, &seed).unwrap();
        assert_eq!(signer.public_key_hex().unwrap(), public);
    }

    #[cfg(unix)]
    #[test]
    fn private_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        run_keygen(&keygen(dir.path())).unwrap();
        let mode = std::fs::metadata(dir.path().join("test.key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn trust_entry_loads_as_trust_file() {
        let entry = TrustEntry {
            issuers: [IssuerEntry {
                issuer: "https://idp.test",
                keys: [KeyEntry {
                    kid: Some("k1"),
                    algorithm: "EdDSA",
                    public_key: TokenSigner::ed25519_from_seed(None, [3u8; 32])
                        .public_key_hex()
                        .unwrap(),
                }],
            }],
        };
        let yaml = serde_yaml::to_string(&entry).unwrap();
        let snapshot = TrustSnapshot::from_yaml(&yaml).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.issuer("https://idp.test").is_some());
    }

    #[test]
    fn trust_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.yaml");
        std::fs::write(&path, "issuers:\n  - issuer: x\n    keys:\n      - algorithm: HS256\n        secret: short\n").unwrap();
        assert_eq!(run_trust(&TrustArgs { file: path }).unwrap(), 1);
    }
}
