//! Tests for the assembled demo host: health probe outside the gate,
//! everything else behind it.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ical_gate::{
    AppState, ExpiringCache, GateConfig, GateLayer, IcalValidator, build_router,
};
use tower::ServiceExt;

fn test_app(config: GateConfig) -> (axum::Router, ExpiringCache) {
    let cache = ExpiringCache::new(config.freshness, config.sweep_interval);
    // Points at a reserved address; never reached by these tests
    let validator =
        IcalValidator::new("http://192.0.2.1:9", Duration::from_millis(200)).unwrap();
    let gate = GateLayer::new(&config, validator, cache.clone()).unwrap();
    (build_router(AppState::new(config), gate), cache)
}

#[tokio::test]
async fn health_is_reachable_without_a_token() {
    let (app, cache) = test_app(GateConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_seconds"].is_u64());

    cache.shutdown().await;
}

#[tokio::test]
async fn protected_paths_require_a_credential() {
    let (app, cache) = test_app(GateConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/anything").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    cache.shutdown().await;
}

#[tokio::test]
async fn trusted_caller_reaches_the_backend() {
    let config = GateConfig {
        allow_subnet: "192.168.0.0/16".to_string(),
        ..GateConfig::default()
    };
    let (app, cache) = test_app(config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/anything")
                .header("x-real-ip", "192.168.4.4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"backend reached");
    cache.shutdown().await;
}
