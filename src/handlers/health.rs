use crate::config::{SERVICE_NAME, SERVICE_VERSION};
use crate::types::HealthResponse;
use axum::Json;

/// GET /health -> identity probe used by backend discovery.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: SERVICE_NAME.to_string(),
        version: SERVICE_VERSION.to_string(),
        status: "ok".to_string(),
    })
}
