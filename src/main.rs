// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc};

use access_gate::{
    api::router,
    auth::{AccessValidator, Clock, HttpKeySetFetcher, KeySetCache, RequestAuthorizer, SystemClock},
    config::Settings,
    logging,
    state::AppState,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let settings = Settings::from_env();
    logging::init(settings.log_format);

    if settings.api_token.is_none() {
        tracing::warn!("API_TOKEN not set; bearer authentication disabled");
    }
    if settings.access_audiences.is_empty() {
        tracing::warn!("CLOUDFLARE_ACCESS_AUD not set; Cloudflare Access authentication disabled");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let fetcher =
        HttpKeySetFetcher::new(settings.jwks_timeout).expect("Failed to create HTTP client");
    let keys = Arc::new(KeySetCache::new(fetcher, clock.clone()));
    let access = AccessValidator::new(settings.access_audiences.clone(), keys, clock);
    let state = AppState::new(RequestAuthorizer::new(settings.api_token.clone(), access));
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .expect("Failed to parse bind address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    tracing::info!(%addr, "Access gate listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .expect("HTTP server failed");
    tracing::info!("Server stopped");
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
