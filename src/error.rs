use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Gate-wide error types.
///
/// # Severity
///
/// Only `Config` is fatal, and only at construction time. The remaining
/// variants are per-request authorization failures: the gate collapses all
/// of them into a uniform 401 deny so the client-visible surface never
/// distinguishes *why* a credential was rejected.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no token provided")]
    NoCredential,

    #[error("calendar service rejected token")]
    InvalidCredential,

    #[error("validation request failed: {0}")]
    Transport(String),
}

impl GateError {
    /// Short machine-readable label, used for decision metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            GateError::Config(_) => "config",
            GateError::NoCredential => "no_credential",
            GateError::InvalidCredential => "invalid_credential",
            GateError::Transport(_) => "transport",
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        // Full detail goes to the server log; clients only see a sanitized
        // message. The gate middleware builds its own deny response (it needs
        // the configured header name and the request Origin), so this impl
        // mainly serves handlers that bubble a GateError.
        tracing::error!(error = %self, "Request failed");

        let (status, message) = match &self {
            GateError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Service configuration error.",
            ),
            GateError::NoCredential | GateError::InvalidCredential | GateError::Transport(_) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized.")
            }
        };

        (status, message).into_response()
    }
}

/// Convenience type alias for Results with GateError.
pub type GateResult<T> = Result<T, GateError>;
