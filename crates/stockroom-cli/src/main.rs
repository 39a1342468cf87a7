//! # stockroom CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stockroom_cli::keys::{run_keygen, run_trust, KeygenArgs, TrustArgs};
use stockroom_cli::tokens::{run_inspect, run_token, run_verify, InspectArgs, TokenArgs, VerifyArgs};

/// Stockroom operator CLI: issuer keys and bearer tokens.
#[derive(Parser, Debug)]
#[command(name = "stockroom", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an Ed25519 issuer keypair and print its trust file entry.
    Keygen(KeygenArgs),

    /// Mint a signed bearer token.
    Token(TokenArgs),

    /// Print a token's header and claims without verifying it.
    Inspect(InspectArgs),

    /// Verify a token against a trust file, as the API server would.
    Verify(VerifyArgs),

    /// Check that a trust file loads and list its issuers.
    Trust(TrustArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Keygen(args) => run_keygen(args),
        Commands::Token(args) => run_token(args),
        Commands::Inspect(args) => run_inspect(args),
        Commands::Verify(args) => run_verify(args),
        Commands::Trust(args) => run_trust(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_token_with_repeated_roles() {
        let cli = Cli::try_parse_from([
            "stockroom",
            "token",
            "--key",
            "ops.key",
            "--issuer",
            "https://idp.test",
            "--subject",
            "ops",
            "--role",
            "MANAGER",
            "--role",
            "SUPPORT",
        ])
        .unwrap();
        match cli.command {
            Commands::Token(args) => {
                assert_eq!(args.roles, ["MANAGER", "SUPPORT"]);
                assert_eq!(args.ttl_minutes, 60);
                assert_eq!(args.audience, "stockroom-api");
            }
            other => panic!("expected token, got {other:?}"),
        }
    }

    #[test]
    fn token_needs_exactly_one_key_source() {
        let base = ["stockroom", "token", "--issuer", "i", "--subject", "s"];
        assert!(Cli::try_parse_from(base).is_err());

        let both = [&base[..], &["--key", "a", "--secret-file", "b"]].concat();
        assert!(Cli::try_parse_from(both).is_err());
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["stockroom", "-vv", "trust", "trust.yaml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Trust(_)));
    }
}
