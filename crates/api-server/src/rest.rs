//! Shared REST state, error body and operational endpoints.

use crate::loyalty_rest::LoyaltyState;
use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::error;
use utoipa::ToSchema;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub loyalty: LoyaltyState,
    pub node_id: String,
    pub start_time: Instant,
}

impl FromRef<AppState> for LoyaltyState {
    fn from_ref(state: &AppState) -> Self {
        state.loyalty.clone()
    }
}

/// Error status plus JSON body returned by handlers.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn bad_request(message: &str) -> ApiError {
    metrics::counter!("api.validation_errors").increment(1);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "invalid_request".to_string(),
            message: message.to_string(),
        }),
    )
}

pub(crate) fn internal_error() -> ApiError {
    metrics::counter!("api.errors").increment(1);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal_error".to_string(),
            message: "Internal processing error".to_string(),
        }),
    )
}

/// GET /health: Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: Readiness check. Returns 200 only when the ledger store
/// answers.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Ready for traffic"),
        (status = 503, description = "Ledger store unreachable"),
    )
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    let ledger = state.loyalty.ledger.clone();
    match tokio::task::spawn_blocking(move || ledger.lock().store_healthy()).await {
        Ok(true) => StatusCode::OK,
        Ok(false) => StatusCode::SERVICE_UNAVAILABLE,
        Err(e) => {
            error!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /live: Liveness check.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses(
        (status = 200, description = "Process is alive"),
    )
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}
