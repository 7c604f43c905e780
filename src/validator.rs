//! Remote token validation against the calendar service.
//!
//! A token is checked with a single outbound GET to
//! `<base>/calendars/<token>`. The service's response-body convention is a
//! fixed contract: the export of a real calendar starts with the literal
//! ASCII marker `BEGIN` (as in `BEGIN:VCALENDAR`), so the validator reads
//! the first 20 body bytes and inspects the prefix. Response status codes
//! are deliberately ignored.
//!
//! # Failure Policy
//!
//! Fail-closed, single attempt: any request error, timeout, or a body
//! shorter than 20 bytes classifies as a transport failure and the caller
//! denies the request. Retry policy belongs to the caller's operator, not
//! this layer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{GateError, GateResult};
use crate::metrics;

/// How many leading body bytes must be available for classification.
const MARKER_WINDOW: usize = 20;

/// Calendar-export file-format marker that identifies a valid token.
const VALID_MARKER: &[u8] = b"BEGIN";

/// Seam for the outbound validation call, so tests (and alternative
/// verification services) can stand in for the real calendar endpoint.
pub trait TokenValidator: Clone + Send + Sync + 'static {
    /// Classify `token`. `Ok(())` means valid; `Err` carries either
    /// `InvalidCredential` (service said no) or `Transport` (call failed
    /// or the body ended before 20 bytes).
    fn validate(&self, token: &str) -> impl Future<Output = GateResult<()>> + Send;
}

/// [`TokenValidator`] backed by the real calendar service over HTTP.
#[derive(Clone)]
pub struct IcalValidator {
    client: reqwest::Client,
    base_url: Arc<str>,
}

impl IcalValidator {
    /// Build a validator for the given service base URL.
    ///
    /// `timeout` bounds the whole outbound call; the validation sits on
    /// the request hot path and must never hang on a slow remote.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Config` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> GateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    /// Read body chunks until `MARKER_WINDOW` bytes are buffered.
    async fn read_marker_window(response: reqwest::Response) -> GateResult<Vec<u8>> {
        let mut response = response;
        let mut buffer: Vec<u8> = Vec::with_capacity(MARKER_WINDOW);

        while buffer.len() < MARKER_WINDOW {
            match response.chunk().await {
                Ok(Some(chunk)) => buffer.extend_from_slice(&chunk),
                Ok(None) => {
                    return Err(GateError::Transport(format!(
                        "response body ended after {} bytes, need {}",
                        buffer.len(),
                        MARKER_WINDOW
                    )));
                }
                Err(e) => return Err(GateError::Transport(format!("body read error: {e}"))),
            }
        }

        buffer.truncate(MARKER_WINDOW);
        Ok(buffer)
    }
}

impl TokenValidator for IcalValidator {
    async fn validate(&self, token: &str) -> GateResult<()> {
        let url = format!("{}/calendars/{}", self.base_url, token);
        let started = std::time::Instant::now();

        let result = async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| GateError::Transport(format!("request error: {e}")))?;

            let head = Self::read_marker_window(response).await?;

            if head.starts_with(VALID_MARKER) {
                debug!("Calendar service confirmed token");
                Ok(())
            } else {
                warn!("Calendar service response did not carry the export marker");
                Err(GateError::InvalidCredential)
            }
        }
        .await;

        let outcome = match &result {
            Ok(()) => "valid",
            Err(e) => e.reason(),
        };
        metrics::record_validation(outcome, started.elapsed().as_secs_f64());

        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;

    /// Serve a fixed body on /calendars/{token} from an ephemeral port.
    async fn spawn_calendar_stub(body: &'static str) -> String {
        let app = Router::new().route("/calendars/{token}", get(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn validator_for(base: &str) -> IcalValidator {
        IcalValidator::new(base, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_calendar_export_body_is_valid() {
        let base = spawn_calendar_stub("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR").await;
        let validator = validator_for(&base);

        assert!(validator.validate("some-token").await.is_ok());
    }

    #[tokio::test]
    async fn test_non_marker_body_is_invalid() {
        let base = spawn_calendar_stub("INVALID_TOKEN_RESPONSE_BODY").await;
        let validator = validator_for(&base);

        let err = validator.validate("bad-token").await.unwrap_err();
        assert!(matches!(err, GateError::InvalidCredential));
    }

    #[tokio::test]
    async fn test_short_body_is_transport_failure() {
        // Starts with the marker but ends before 20 bytes are available
        let base = spawn_calendar_stub("BEGIN").await;
        let validator = validator_for(&base);

        let err = validator.validate("short-token").await.unwrap_err();
        assert!(matches!(err, GateError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_failure() {
        // Reserved TEST-NET-1 address, nothing listens there
        let validator =
            IcalValidator::new("http://192.0.2.1:9", Duration::from_millis(200)).unwrap();

        let err = validator.validate("any-token").await.unwrap_err();
        assert!(matches!(err, GateError::Transport(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_is_normalized() {
        let validator = validator_for("http://example.test/");
        assert_eq!(&*validator.base_url, "http://example.test");
    }
}
