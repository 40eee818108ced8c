// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process;

use catalog_rust_server::{
    api::router,
    auth::{JwksManager, TokenVerifier},
    config::AppConfig,
    state::AppState,
    storage::CatalogDatabase,
    telemetry::init_tracing,
};

#[tokio::main]
async fn main() {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            process::exit(1);
        }
    };
    init_tracing(config.log_format);

    if let Err(err) = run(config).await {
        tracing::error!(error = %err, "Catalog server failed");
        process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db = CatalogDatabase::open(&config.database_path)?;
    tracing::info!(path = %config.database_path.display(), "Database opened");

    let keys = JwksManager::new(config.oidc.jwks_url.clone())?
        .with_cache_ttl(config.oidc.jwks_cache_ttl);
    let verifier = TokenVerifier::new(keys, config.oidc.issuer.clone())
        .with_audience(config.oidc.audience.clone())
        .with_leeway(config.oidc.leeway_secs);
    tracing::info!(
        issuer = %config.oidc.issuer,
        jwks_url = %config.oidc.jwks_url,
        audience = ?config.oidc.audience,
        "Token verification configured"
    );

    let state = AppState::new(db, verifier, config.access.clone());
    let app = router(state, &config.cors_allowed_origins);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Catalog server listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Catalog server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
