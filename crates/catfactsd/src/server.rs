//! HTTP server for catfactsd

use crate::routes;
use crate::service::FactCatalogService;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub service: FactCatalogService,
    /// Upper bound for fetch-many commands
    pub max_fetch_per_request: usize,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: FactCatalogService, max_fetch_per_request: usize) -> Self {
        Self {
            service,
            max_fetch_per_request,
            start_time: Instant::now(),
        }
    }
}

/// Build the router with every route group
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::home_routes())
        .merge(routes::fetch_routes())
        .merge(routes::fact_routes())
        .merge(routes::export_routes())
        .merge(routes::health_routes())
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until Ctrl-C
pub async fn run(state: AppState, addr: &str) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("  Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
