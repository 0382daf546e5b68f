//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use range_api::RangeStatus;
use serde::{Deserialize, Serialize};

use crate::errors::WatchError;
use crate::models::RangeView;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "rangewatch".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

impl IntoResponse for WatchError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            WatchError::NotFound(_) => StatusCode::NOT_FOUND,
            WatchError::ConfigError(_) | WatchError::ProtocolError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, self.to_string()).into_response()
    }
}

/// Watched ranges response
#[derive(Debug, Serialize)]
pub struct RangesResponse {
    pub ranges: Vec<String>,
    pub total: usize,
}

/// List watched ranges
pub async fn ranges_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let ranges = state.watcher.watched();
    let total = ranges.len();
    Json(RangesResponse { ranges, total })
}

/// Store view of one range
pub async fn deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(range_id): Path<String>,
) -> Result<Json<RangeView>, WatchError> {
    state
        .watcher
        .store()
        .view(&range_id)
        .map(Json)
        .ok_or_else(|| WatchError::NotFound(format!("range {} is not watched", range_id)))
}

/// Watch toggle response
#[derive(Debug, Serialize)]
pub struct WatchResponse {
    pub range_id: String,
    pub watched: bool,
    /// Whether this request changed anything
    pub changed: bool,
}

/// Start watching a range
pub async fn watch_handler(
    State(state): State<Arc<ServerState>>,
    Path(range_id): Path<String>,
) -> impl IntoResponse {
    let changed = state.watcher.watch(&range_id);
    let status = if changed { StatusCode::CREATED } else { StatusCode::OK };
    (
        status,
        Json(WatchResponse {
            range_id,
            watched: true,
            changed,
        }),
    )
}

/// Stop watching a range
pub async fn unwatch_handler(
    State(state): State<Arc<ServerState>>,
    Path(range_id): Path<String>,
) -> Result<Json<WatchResponse>, WatchError> {
    if !state.watcher.unwatch(&range_id) {
        return Err(WatchError::NotFound(format!("range {} is not watched", range_id)));
    }
    Ok(Json(WatchResponse {
        range_id,
        watched: false,
        changed: true,
    }))
}

/// Optimistic overlay request
#[derive(Debug, Deserialize)]
pub struct OptimisticRequest {
    pub status: RangeStatus,
}

/// Show a client-side status until the next real observation
pub async fn optimistic_handler(
    State(state): State<Arc<ServerState>>,
    Path(range_id): Path<String>,
    Json(request): Json<OptimisticRequest>,
) -> Result<StatusCode, WatchError> {
    state.watcher.optimistic(&range_id, request.status)?;
    Ok(StatusCode::ACCEPTED)
}

/// Force one status fetch
pub async fn refresh_handler(
    State(state): State<Arc<ServerState>>,
    Path(range_id): Path<String>,
) -> Result<StatusCode, WatchError> {
    state.watcher.refresh(&range_id)?;
    Ok(StatusCode::ACCEPTED)
}
