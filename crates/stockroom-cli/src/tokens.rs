//! # Token Subcommands
//!
//! Mint, inspect and verify bearer tokens. `verify` builds the same
//! [`Authenticator`] the API server uses, so a token it accepts is one the
//! server accepts given the same trust file and audience.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::Args;
use stockroom_auth::keys::MIN_SECRET_LEN;
use stockroom_auth::{
    token, Authenticator, Claims, Permission, Role, TokenSigner, TrustSnapshot, TrustStore,
    VerifierConfig, DEFAULT_AUDIENCE, DEFAULT_LEEWAY,
};
use stockroom_core::OrganizationId;
use uuid::Uuid;

use crate::read_hex_file;

/// Arguments for `stockroom token`.
#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Ed25519 seed file written by `keygen`.
    #[arg(long, required_unless_present = "secret_file", conflicts_with = "secret_file")]
    pub key: Option<PathBuf>,
    /// File holding an HS256 shared secret (at least 32 bytes).
    #[arg(long)]
    pub secret_file: Option<PathBuf>,
    /// Key id for the token header.
    #[arg(long)]
    pub kid: Option<String>,
    /// `iss` claim.
    #[arg(long)]
    pub issuer: String,
    /// `sub` claim.
    #[arg(long)]
    pub subject: String,
    /// Organization the token acts for.
    #[arg(long)]
    pub org: Option<OrganizationId>,
    #[arg(long)]
    pub store: Option<Uuid>,
    /// Role, e.g. `MANAGER`. Repeatable.
    #[arg(long = "role")]
    pub roles: Vec<String>,
    /// Extra permission, e.g. `product:write`. Repeatable.
    #[arg(long = "permission")]
    pub permissions: Vec<String>,
    #[arg(long, default_value = DEFAULT_AUDIENCE)]
    pub audience: String,
    /// Lifetime in minutes.
    #[arg(long, default_value_t = 60)]
    pub ttl_minutes: i64,
}

/// Arguments for `stockroom inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[arg(value_name = "TOKEN")]
    pub token: String,
}

/// Arguments for `stockroom verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Trust file the API server is configured with.
    #[arg(long)]
    pub trust_file: PathBuf,
    /// Required `aud`. Pass an empty string to skip the check.
    #[arg(long, default_value = DEFAULT_AUDIENCE)]
    pub audience: String,
    #[arg(value_name = "TOKEN")]
    pub token: String,
}

/// Sign a token and print it on stdout.
pub fn run_token(args: &TokenArgs) -> Result<u8> {
    if args.ttl_minutes <= 0 {
        bail!("--ttl-minutes must be positive");
    }
    let signer = load_signer(args)?;
    let claims = build_claims(args)?;
    let token = signer.sign(&claims).context("failed to sign token")?;
    tracing::debug!(subject = %args.subject, exp = claims.exp, "token minted");
    println!("{token}");
    Ok(0)
}

/// Print header and claims as JSON. The signature is not checked.
pub fn run_inspect(args: &InspectArgs) -> Result<u8> {
    let decoded = token::decode(args.token.trim()).context("not a compact JWS token")?;
    let view = serde_json::json!({
        "header": decoded.header,
        "claims": decoded.claims,
        "expires_at": decoded.claims.expires_at(),
        "verified": false,
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(0)
}

/// Verify against a trust file. Exit 0 and print the principal, or exit 1.
pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let yaml = std::fs::read_to_string(&args.trust_file)
        .with_context(|| format!("failed to read trust file: {}", args.trust_file.display()))?;
    let snapshot = TrustSnapshot::from_yaml(&yaml).context("invalid trust file")?;
    let audience = args.audience.trim();
    let authenticator = Authenticator::new(
        Arc::new(TrustStore::new(snapshot)),
        VerifierConfig {
            audience: (!audience.is_empty()).then(|| audience.to_string()),
            leeway: DEFAULT_LEEWAY,
        },
    );

    match authenticator.authenticate(args.token.trim()) {
        Ok(principal) => {
            println!("OK: token is valid");
            println!("{}", serde_json::to_string_pretty(&principal)?);
            Ok(0)
        }
        Err(e) => {
            println!("FAIL: {e}");
            Ok(1)
        }
    }
}

fn load_signer(args: &TokenArgs) -> Result<TokenSigner> {
    match (&args.key, &args.secret_file) {
        (Some(key), _) => {
            let seed = read_hex_file(key, "private key")?;
            TokenSigner::ed25519_from_seed_hex(args.kid.clone(), &seed)
                .map_err(|e| anyhow::anyhow!("invalid private key: {e}"))
        }
        (None, Some(path)) => {
            let secret = zeroize::Zeroizing::new(
                std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read secret: {}", path.display()))?,
            );
            let secret = secret.trim();
            if secret.len() < MIN_SECRET_LEN {
                bail!("HS256 secret must be at least {MIN_SECRET_LEN} bytes");
            }
            Ok(TokenSigner::hs256(args.kid.clone(), secret.as_bytes().to_vec()))
        }
        (None, None) => bail!("one of --key or --secret-file is required"),
    }
}

fn build_claims(args: &TokenArgs) -> Result<Claims> {
    let mut authorities = Vec::with_capacity(args.roles.len() + args.permissions.len());
    for name in &args.roles {
        let role = Role::parse(name).with_context(|| format!("unknown role {name:?}"))?;
        authorities.push(format!("ROLE_{}", role.as_str()));
    }
    for name in &args.permissions {
        let permission =
            Permission::parse(name).with_context(|| format!("unknown permission {name:?}"))?;
        authorities.push(permission.as_str().to_string());
    }

    let mut claims = Claims::new(
        &args.issuer,
        &args.subject,
        Utc::now(),
        Duration::minutes(args.ttl_minutes),
    )
    .with_authorities(authorities);
    if !args.audience.trim().is_empty() {
        claims = claims.with_audience(args.audience.trim());
    }
    if let Some(org) = args.org {
        claims = claims.with_organization(org);
    }
    if let Some(store) = args.store {
        claims = claims.with_store(store);
    }
    Ok(claims)
}
