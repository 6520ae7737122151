pub mod upload;

use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub use upload::upload_handler;

/// Health check endpoint for liveness probes.
///
/// Probes the vision provider; a missing API key makes the service unhealthy.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.provider.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "tooth-analyzer",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "tooth-analyzer",
                "error": e.to_string()
            })),
        ),
    }
}
