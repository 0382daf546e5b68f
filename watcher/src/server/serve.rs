//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::WatchError;
use crate::server::handlers::{
    deployment_handler, health_handler, optimistic_handler, ranges_handler, refresh_handler,
    unwatch_handler, version_handler, watch_handler,
};
use crate::server::state::ServerState;

/// Build the router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Ranges
        .route("/ranges", get(ranges_handler))
        .route("/ranges/{range_id}/deployment", get(deployment_handler))
        .route(
            "/ranges/{range_id}/watch",
            post(watch_handler).delete(unwatch_handler),
        )
        .route("/ranges/{range_id}/optimistic", post(optimistic_handler))
        .route("/ranges/{range_id}/refresh", post(refresh_handler))
        // State and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), WatchError>>, WatchError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| WatchError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| WatchError::ServerError(e.to_string()))
    });

    Ok(handle)
}
