mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use crate::config::ServerConfig;
use crate::replicate::ReplicateClient;

pub use routes::api_routes;
pub use schemas::{HealthResponse, PROBLEM_CONTENT_TYPE, Problem};
pub use state::AppState;

/// Routes plus the upload limit, ready to serve
pub fn router(state: AppState) -> Router {
    let upload_limit = state.config().max_upload_bytes;

    Router::new()
        .merge(api_routes())
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(Arc::new(state))
}

/// Serve on `listener` until `shutdown` is cancelled.
///
/// In-flight requests share the token, so they unwind with `Canceled` rather
/// than holding the shutdown open for a full polling budget.
pub async fn serve_on(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

/// Bind the configured port and run until Ctrl-C
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let api = ReplicateClient::new(&config)?;
    let shutdown = CancellationToken::new();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Starting style server on {}", listener.local_addr()?);

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutting down"),
            Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
        }
        signal.cancel();
    });

    let state = AppState::new(config, Arc::new(api), shutdown.clone());
    serve_on(listener, state, shutdown).await?;

    Ok(())
}
