//! # stockroom-api: Binary Entry Point
//!
//! Loads the issuer trust file, picks a storage backend and serves the API
//! until SIGINT or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use stockroom_api::config::ServerConfig;
use stockroom_api::state::AppState;
use stockroom_auth::{spawn_refresh, Authenticator, FileKeySource, KeySource, TrustStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.log_json);
    tracing::info!(?config, "starting stockroom-api");

    let source: Arc<dyn KeySource> = Arc::new(FileKeySource::new(config.trust_file.clone()));
    let trust = Arc::new(
        TrustStore::load(source.as_ref())
            .await
            .with_context(|| format!("loading trust file {}", config.trust_file.display()))?,
    );
    let issuers = trust.snapshot().len();
    if issuers == 0 {
        tracing::warn!("trust file lists no issuers; every request will be rejected");
    } else {
        tracing::info!(issuers, "trust store loaded");
    }
    let refresher = spawn_refresh(trust.clone(), source, config.trust_refresh());
    let authenticator = Arc::new(Authenticator::new(trust, config.verifier()));

    let state = match &config.database_url {
        Some(url) => {
            let pool = stockroom_store::init_pool(url)
                .await
                .context("connecting to PostgreSQL")?;
            AppState::postgres(pool, authenticator)?
        }
        None => {
            tracing::warn!("DATABASE_URL not set; records are kept in memory and lost on exit");
            AppState::in_memory(authenticator)?
        }
    }
    .with_rate_limit(config.rate_limit());

    let app = stockroom_api::app(state);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!("Stockroom API listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresher.abort();
    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}
