//! Service-level routes: health, the API index and the catch-all 404.

use axum::{extract::State, http::StatusCode, Json};
use filedrop_shared::status::{ApiIndex, HealthResponse};

use crate::{error::WebError, SharedState};

/// Health check
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "status",
    responses(
        (status = 200, description = "Service and storage are up", body = HealthResponse),
        (status = 503, description = "Storage is unreachable", body = HealthResponse),
    )
)]
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let health = state.controller.health().await;
    let status = match health.is_ok() {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(health))
}

/// API index
#[utoipa::path(
    get,
    path = "/",
    tag = "status",
    responses((status = 200, description = "Available endpoints", body = ApiIndex))
)]
pub async fn api_index() -> Json<ApiIndex> {
    Json(ApiIndex::new(env!("CARGO_PKG_VERSION")))
}

/// Anything that matched no route.
pub async fn endpoint_not_found() -> WebError {
    WebError::not_found("Endpoint not found".to_string())
}
