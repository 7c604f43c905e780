//! Handlers for the demo host: health probe and stand-in backend.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use tracing::instrument;

use crate::state::AppState;

/// Health check response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// Health check endpoint.
///
/// Routed outside the gate so load balancers and monitoring can probe the
/// process without a token.
#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Stand-in for the protected backend.
///
/// The crate's real deliverable is the gate layer; production embeds it in
/// its own router in front of a real downstream handler. The shipped binary
/// answers admitted requests with this placeholder so the gate can be
/// exercised locally end to end.
pub async fn backend_stub() -> (StatusCode, &'static str) {
    (StatusCode::OK, "backend reached")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::GateConfig;

    #[tokio::test]
    async fn test_health_reports_version() {
        let state = AppState::new(GateConfig::default());
        let Json(body) = health(State(state)).await;

        assert_eq!(body.status, "healthy");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_backend_stub_is_ok() {
        let (status, body) = backend_stub().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "backend reached");
    }
}
