//! # Server Configuration
//!
//! Command-line flags with environment fallbacks. Every value has a
//! default except the trust file; an absent database URL selects the
//! in-memory store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use stockroom_auth::{VerifierConfig, DEFAULT_AUDIENCE};

use crate::middleware::rate_limit::RateLimitConfig;

/// Stockroom API server.
#[derive(Parser, Clone)]
#[command(name = "stockroom-api", version, about, long_about = None)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[arg(long, env = "STOCKROOM_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// PostgreSQL connection URL. Without one, records live in memory.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// YAML file listing trusted token issuers and their keys.
    #[arg(long, env = "STOCKROOM_TRUST_FILE")]
    pub trust_file: PathBuf,

    /// Required `aud` claim. Pass an empty string to skip the check.
    #[arg(long, env = "STOCKROOM_AUDIENCE", default_value = DEFAULT_AUDIENCE)]
    pub audience: String,

    /// Clock skew tolerated on `exp` and `nbf`, in seconds.
    #[arg(long, env = "STOCKROOM_LEEWAY_SECS", default_value_t = 30)]
    pub leeway_secs: u64,

    /// How often the trust file is re-read, in seconds.
    #[arg(
        long,
        env = "STOCKROOM_TRUST_REFRESH_SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub trust_refresh_secs: u64,

    /// Requests each caller may make per minute.
    #[arg(long, env = "STOCKROOM_RATE_LIMIT_PER_MINUTE", default_value_t = 600)]
    pub rate_limit_per_minute: u64,

    /// Emit logs as JSON lines. The variable accepts `1`, `true`, `yes` or `on`.
    #[arg(
        long,
        env = "STOCKROOM_LOG_JSON",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub log_json: bool,
}

impl ServerConfig {
    pub fn verifier(&self) -> VerifierConfig {
        let audience = self.audience.trim();
        VerifierConfig {
            audience: (!audience.is_empty()).then(|| audience.to_string()),
            leeway: Duration::from_secs(self.leeway_secs),
        }
    }

    pub fn trust_refresh(&self) -> Duration {
        Duration::from_secs(self.trust_refresh_secs)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::per_minute(self.rate_limit_per_minute)
    }
}

/// Custom `Debug` redacts the database URL, which may embed a password.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("trust_file", &self.trust_file)
            .field("audience", &self.audience)
            .field("leeway_secs", &self.leeway_secs)
            .field("trust_refresh_secs", &self.trust_refresh_secs)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("log_json", &self.log_json)
            .finish()
    }
}
