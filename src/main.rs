// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use thimar_identity::{
    api::router,
    config::{Config, LogFormat, PRINCIPAL_DB_FILE},
    state::AppState,
    storage::{InMemoryPrincipalStore, PrincipalRepository, RedbPrincipalStore},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() {
    let config = Config::from_env().expect("Invalid configuration");
    init_tracing(config.log_format);

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let principals: Arc<dyn PrincipalRepository> = match &config.data_dir {
        Some(dir) => {
            let path = dir.join(PRINCIPAL_DB_FILE);
            tracing::info!(path = %path.display(), "Opening principal database");
            Arc::new(RedbPrincipalStore::open(&path).expect("Failed to open principal database"))
        }
        None => {
            tracing::warn!("DATA_DIR not set, principals are kept in memory only");
            Arc::new(InMemoryPrincipalStore::new())
        }
    };

    let state = AppState::new(&config.auth, principals);
    tracing::info!(
        jwks_url = %config.auth.jwks_url,
        issuer = %config.auth.issuer,
        audience_check = config.auth.audience.is_some(),
        "Clerk authentication configured"
    );

    // Warm the key cache; verification still refreshes on demand if this fails.
    if let Err(e) = state.key_set().refresh().await {
        tracing::warn!(error = %e, "Initial JWKS fetch failed");
    }

    let app = router(state);
    let addr = config.bind_address;
    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .expect("Failed to load TLS certificate and key");

            let handle: Handle<std::net::SocketAddr> = Handle::new();
            let on_shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                on_shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            tracing::info!(%addr, "Thimar identity server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("Failed to bind address");

            tracing::info!(%addr, "Thimar identity server listening on http (docs at /docs)");
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .expect("HTTP server failed");
        }
    }
}
