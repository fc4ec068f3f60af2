// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Hati

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::tls_rustls::RustlsConfig;
use chrono::Utc;
use hati_gateway::{
    api::router,
    bridge_poller::BridgePoller,
    config::{GatewayConfig, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    state::AppState,
    storage::{GatewayDatabase, SessionRepository},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Grace period for in-flight TLS connections on shutdown.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Gateway failed");
        std::process::exit(1);
    }
}

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => subscriber
            .with(fmt::layer().json().with_target(true))
            .init(),
        _ => subscriber
            .with(fmt::layer().pretty().with_target(true))
            .init(),
    }
}

async fn run() -> Result<(), BoxError> {
    // Must happen before any TLS use (vendor clients and the HTTPS listener).
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let config = GatewayConfig::from_env()?;
    let db_path = config.database_path();
    let db = Arc::new(GatewayDatabase::open(&db_path)?);
    tracing::info!(path = %db_path.display(), "Database opened");

    if std::env::args().nth(1).as_deref() == Some("cleanup-sessions") {
        let purged = SessionRepository::new(&db).purge_expired(Utc::now())?;
        tracing::info!(purged, "Expired sessions removed");
        return Ok(());
    }

    let state = AppState::from_config(&config, db.clone())?;
    tracing::info!(
        network = %config.settlement_network,
        circle = config.circle.is_some(),
        moralis = config.moralis.is_some(),
        fast_protocols = ?config.fast_protocols,
        "Gateway state ready"
    );

    let shutdown = CancellationToken::new();
    let poller = BridgePoller::new(db, state.routes.clone())
        .with_interval(config.bridge_poll_interval)
        .with_max_attempts(config.bridge_poll_max_attempts)
        .with_retry_policy(state.retry);
    let poller_task = tokio::spawn(poller.run(shutdown.clone()));

    let app = router(state);
    let addr: SocketAddr = config.bind_address().parse()?;

    let served: Result<(), BoxError> = match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
            let handle = axum_server::Handle::new();
            {
                let handle = handle.clone();
                tokio::spawn(async move {
                    shutdown_signal().await;
                    handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
                });
            }
            tracing::info!(%addr, "Hati gateway listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(Into::into)
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!(%addr, "Hati gateway listening on http (docs at /docs)");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(Into::into)
        }
    };

    shutdown.cancel();
    if let Err(e) = poller_task.await {
        tracing::warn!(error = %e, "Bridge poller task ended abnormally");
    }
    tracing::info!("Gateway stopped");
    served
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
