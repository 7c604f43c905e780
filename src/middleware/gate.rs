//! The authorization gate: a tower layer deciding admit/deny per request.
//!
//! # Decision Flow
//!
//! ```text
//! Request
//!    │
//!    ▼
//! caller address in allow-list subnet? ──yes──► Admit (no token work)
//!    │ no
//!    ▼
//! token in configured header? ──no──► 401
//!    │ yes
//!    ▼
//! cache hit? ──yes──► Admit
//!    │ no
//!    ▼
//! remote validation ──valid──► cache + Admit
//!    │ invalid / transport failure
//!    ▼
//!   401
//! ```
//!
//! Denials are a uniform 401 naming the configured header. When the denied
//! request carries an `Origin` header the response also carries permissive
//! CORS headers, so browser cross-origin callers see a readable 401 instead
//! of an opaque CORS failure.
//!
//! # Header Stripping Policy
//!
//! With `forward_token = false` the token header is removed from the request
//! as soon as it is read, before the validation outcome is known. Denied
//! requests never reach the backend, so the early mutation is unobservable
//! downstream; admitted requests are guaranteed not to leak the credential.
//!
//! # Concurrency
//!
//! The cache is the only shared mutable state. No cache lock is held across
//! the outbound validation call: a slow remote serializes at most the
//! requests carrying that same unvalidated token, never the whole cache.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request, Response, StatusCode, header};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::ip::{Subnet, resolve_client_addr};
use crate::cache::ValidityCache;
use crate::config::GateConfig;
use crate::error::{GateError, GateResult};
use crate::metrics;
use crate::validator::TokenValidator;

/// Options shared by all clones of the gate service.
#[derive(Debug)]
struct GateOptions {
    /// Parsed header to inspect for the token
    header_name: HeaderName,
    /// Header name as configured, for the human-readable deny body
    header_display: String,
    /// Keep the token header on forwarded requests
    forward_token: bool,
    /// Callers inside this range skip token validation
    subnet: Subnet,
}

/// Authorization gate layer, generic over the validator and cache so tests
/// and alternative backends can be substituted at the seams.
#[derive(Clone)]
pub struct GateLayer<V, C> {
    options: Arc<GateOptions>,
    validator: V,
    cache: C,
}

impl<V, C> GateLayer<V, C>
where
    V: TokenValidator,
    C: ValidityCache,
{
    /// Build the gate from configuration plus its collaborators.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Config` if the allow-list subnet or the header
    /// name is malformed. Misconfiguration fails construction, never a
    /// request.
    pub fn new(config: &GateConfig, validator: V, cache: C) -> GateResult<Self> {
        let subnet = Subnet::parse(&config.allow_subnet)?;
        let header_name =
            HeaderName::from_bytes(config.header_name.as_bytes()).map_err(|_| {
                GateError::Config(format!(
                    "invalid token header name: {:?}",
                    config.header_name
                ))
            })?;

        Ok(Self {
            options: Arc::new(GateOptions {
                header_name,
                header_display: config.header_name.clone(),
                forward_token: config.forward_token,
                subnet,
            }),
            validator,
            cache,
        })
    }
}

impl<S, V, C> Layer<S> for GateLayer<V, C>
where
    V: TokenValidator,
    C: ValidityCache,
{
    type Service = GateService<S, V, C>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            inner,
            options: self.options.clone(),
            validator: self.validator.clone(),
            cache: self.cache.clone(),
        }
    }
}

/// Gate service wrapper produced by [`GateLayer`].
#[derive(Clone)]
pub struct GateService<S, V, C> {
    inner: S,
    options: Arc<GateOptions>,
    validator: V,
    cache: C,
}

impl<S, V, C> Service<Request<Body>> for GateService<S, V, C>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    V: TokenValidator,
    C: ValidityCache,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let options = self.options.clone();
        let validator = self.validator.clone();
        let cache = self.cache.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut req = req;

            // Network allow-list short-circuits all token work
            let client_addr = resolve_client_addr(&req);
            if options.subnet.contains_str(&client_addr) {
                debug!(client_addr = %client_addr, "Caller inside allow-list subnet, admitting");
                metrics::record_decision("admit", "trusted_network");
                return inner.call(req).await;
            }

            let Some(token) = extract_token(&mut req, &options.header_name, options.forward_token)
            else {
                warn!(
                    client_addr = %client_addr,
                    path = %req.uri().path(),
                    "No token provided"
                );
                metrics::record_decision("deny", GateError::NoCredential.reason());
                return Ok(deny_response(&req, &options.header_display));
            };

            if cache.has(&token).await {
                debug!("Token found in cache, admitting");
                metrics::record_cache_hit();
                metrics::record_decision("admit", "cache_hit");
                return inner.call(req).await;
            }
            metrics::record_cache_miss();

            // No cache lock is held here; only requests for this exact
            // unvalidated token wait on the remote call
            match validator.validate(&token).await {
                Ok(()) => {
                    // Duration::ZERO means the cache's configured freshness
                    cache.set(&token, true, Duration::ZERO).await;
                    debug!("Token validated remotely, cached and admitting");
                    metrics::record_decision("admit", "validated");
                    inner.call(req).await
                }
                Err(e) => {
                    warn!(
                        client_addr = %client_addr,
                        error = %e,
                        "Token validation failed, denying"
                    );
                    metrics::record_decision("deny", e.reason());
                    Ok(deny_response(&req, &options.header_display))
                }
            }
        })
    }
}

/// Pull the bearer token out of the configured header.
///
/// The header's first value is used. With `forward_token = false` the header
/// is removed from the request immediately, whatever the value contains. A
/// `"Bearer "` prefix is stripped from the extracted token only; the
/// forwarded header (when kept) is never rewritten. Absent, empty, or
/// non-UTF-8 values count as "no credential".
fn extract_token<B>(
    req: &mut Request<B>,
    header_name: &HeaderName,
    forward_token: bool,
) -> Option<String> {
    let raw = req.headers().get(header_name)?.clone();
    if !forward_token {
        req.headers_mut().remove(header_name);
    }

    let value = raw.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value);

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Build the uniform 401 deny response.
///
/// Cross-origin browser callers would otherwise see an opaque CORS error,
/// so when the request names an `Origin` the response reflects it along
/// with permissive preflight headers.
fn deny_response<B>(req: &Request<B>, header_display: &str) -> Response<Body> {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        format!("Unauthorized. Attach a valid calendar token in the {header_display} header."),
    )
        .into_response();

    if let Some(origin) = req.headers().get(header::ORIGIN) {
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("0"),
        );
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const AUTH: HeaderName = header::AUTHORIZATION;

    fn request_with_auth(value: &str) -> Request<Body> {
        Request::builder()
            .header(AUTH, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_token_strips_bearer_prefix() {
        let mut req = request_with_auth("Bearer abc123");
        let token = extract_token(&mut req, &AUTH, true).unwrap();
        assert_eq!(token, "abc123");
    }

    #[test]
    fn test_extract_token_raw_value_without_prefix() {
        let mut req = request_with_auth("abc123");
        let token = extract_token(&mut req, &AUTH, true).unwrap();
        assert_eq!(token, "abc123");
    }

    #[test]
    fn test_extract_token_removes_header_when_not_forwarding() {
        let mut req = request_with_auth("Bearer abc123");
        extract_token(&mut req, &AUTH, false).unwrap();
        assert!(req.headers().get(AUTH).is_none());
    }

    #[test]
    fn test_extract_token_keeps_header_unmodified_when_forwarding() {
        let mut req = request_with_auth("Bearer abc123");
        extract_token(&mut req, &AUTH, true).unwrap();
        // Forwarded header keeps its prefix; only the extracted copy loses it
        assert_eq!(req.headers().get(AUTH).unwrap(), "Bearer abc123");
    }

    #[test]
    fn test_extract_token_missing_header() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert!(extract_token(&mut req, &AUTH, false).is_none());
    }

    #[test]
    fn test_extract_token_empty_value_is_no_credential() {
        let mut req = request_with_auth("");
        assert!(extract_token(&mut req, &AUTH, false).is_none());
        // Stripping still happened
        assert!(req.headers().get(AUTH).is_none());
    }

    #[test]
    fn test_extract_token_bare_bearer_is_no_credential() {
        let mut req = request_with_auth("Bearer ");
        assert!(extract_token(&mut req, &AUTH, true).is_none());
    }

    #[test]
    fn test_deny_response_without_origin_has_no_cors_headers() {
        let req = Request::builder().body(Body::empty()).unwrap();
        let response = deny_response(&req, "Authorization");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
    }

    #[test]
    fn test_deny_response_reflects_origin() {
        let req = Request::builder()
            .header(header::ORIGIN, "https://x.example")
            .body(Body::empty())
            .unwrap();
        let response = deny_response(&req, "Authorization");

        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://x.example"
        );
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "*"
        );
        assert_eq!(headers.get(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "0");
    }

    #[test]
    fn test_deny_body_names_configured_header() {
        let req = Request::builder().body(Body::empty()).unwrap();
        let response = deny_response(&req, "X-Calendar-Token");
        // Body content is checked end-to-end in the integration tests;
        // here we only assert the response is complete
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_layer_rejects_invalid_subnet() {
        use crate::cache::ExpiringCache;
        use crate::validator::IcalValidator;

        let config = GateConfig {
            allow_subnet: "999.0.0.0/8".to_string(),
            ..GateConfig::default()
        };
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let cache = ExpiringCache::new(config.freshness, config.sweep_interval);
            let validator =
                IcalValidator::new(&config.validation_base_url, config.validation_timeout)
                    .unwrap();
            let result = GateLayer::new(&config, validator, cache);
            assert!(matches!(result, Err(GateError::Config(_))));
        });
    }
}
