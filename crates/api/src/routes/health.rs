//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use telemetry::{health, metrics};

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Full health check.
///
/// Pings the store so the report reflects current reachability.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = health();
    if state.store.ping().await {
        registry.store.set_healthy();
    } else {
        registry.store.set_unhealthy("store unreachable");
    }

    let report = registry.report();

    Json(HealthResponse {
        status: format!("{:?}", report.status).to_lowercase(),
        store_connected: registry.store.is_healthy(),
        scheduler_healthy: registry.scheduler.is_healthy(),
        scheduler_error: registry.scheduler.message(),
        pending_jobs: metrics().pending_jobs.get(),
    })
}

/// GET /health/ready - Readiness probe (can accept traffic).
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
