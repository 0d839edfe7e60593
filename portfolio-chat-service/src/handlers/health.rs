use crate::services::metrics::get_metrics;
use crate::startup::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use service_core::error::AppError;

/// Liveness probe. Never touches the network.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "portfolio-chat-service",
        "version": env!("CARGO_PKG_VERSION"),
        "provider_configured": state.chat.provider().is_configured()
    }))
}

/// Readiness probe: the provider must be configured and reachable.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.chat.provider().health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Provider health check failed");
        AppError::ServiceUnavailable(e.to_string())
    })?;

    Ok(StatusCode::OK)
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        get_metrics(),
    )
}
