//! Health check handlers.
//!
//! - `/health`: liveness, returns OK while the process is running
//! - `/ready`: readiness, checks that the meeting store answers

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness check handler.
///
/// Does not check dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check handler.
///
/// Returns 200 if the store answers a ping, 503 otherwise. The store error
/// is logged; the response carries a generic message.
#[tracing::instrument(skip_all, name = "meeting.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = state.store.ping().await {
        tracing::warn!(target: "meeting.handlers.health", error = %e, "Readiness check failed: store error");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                store: "unhealthy",
                error: Some("Service dependencies unavailable".to_string()),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            store: "healthy",
            error: None,
        }),
    )
}
