//! # stockroom-cli: Operator Command-Line Interface
//!
//! Tools for running a Stockroom deployment without an external identity
//! provider: generate issuer keys, mint bearer tokens for scripts and
//! smoke tests, and check tokens against the server's trust file.
//!
//! ## Subcommands
//!
//! - `keygen`: Ed25519 issuer keypair plus a trust file entry
//! - `token`: mint a signed bearer token
//! - `inspect`: print a token's header and claims without verifying
//! - `verify`: verify a token the way the API server would
//! - `trust`: parse a trust file and list its issuers
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; handlers here return an exit code.
//! - Verification goes through `stockroom-auth`, never a reimplementation.

pub mod keys;
pub mod tokens;

use std::path::Path;

use anyhow::{bail, Context, Result};

/// Read a file holding one hex string, trimmed.
pub(crate) fn read_hex_file(path: &Path, what: &str) -> Result<zeroize::Zeroizing<String>> {
    if !path.exists() {
        bail!("{what} file not found: {}", path.display());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what}: {}", path.display()))?;
    Ok(zeroize::Zeroizing::new(content.trim().to_string()))
}
