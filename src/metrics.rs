//! Prometheus metrics for gate observability.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gate_decisions_total` - Admit/deny decisions (labels: outcome, reason)
//! - `gate_cache_hits_total` - Token lookups answered by the cache
//! - `gate_cache_misses_total` - Token lookups requiring remote validation
//! - `gate_validations_total` - Outbound validation calls (label: outcome)
//!
//! ## Histograms
//! - `gate_validation_duration_seconds` - Outbound validation call duration
//!
//! ## Gauges
//! - `gate_cache_entries` - Entries physically present in the token cache

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const DECISIONS_TOTAL: &str = "gate_decisions_total";
    pub const CACHE_HITS_TOTAL: &str = "gate_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "gate_cache_misses_total";
    pub const VALIDATIONS_TOTAL: &str = "gate_validations_total";
    pub const VALIDATION_DURATION_SECONDS: &str = "gate_validation_duration_seconds";
    pub const CACHE_ENTRIES: &str = "gate_cache_entries";
}

/// Initialize the Prometheus metrics exporter.
///
/// Sets up metric descriptions and starts the Prometheus HTTP listener on
/// the given address.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::DECISIONS_TOTAL,
        "Total admit/deny decisions made by the gate"
    );
    describe_counter!(
        names::CACHE_HITS_TOTAL,
        "Total token lookups answered by the cache"
    );
    describe_counter!(
        names::CACHE_MISSES_TOTAL,
        "Total token lookups that required remote validation"
    );
    describe_counter!(
        names::VALIDATIONS_TOTAL,
        "Total outbound validation calls to the calendar service"
    );

    describe_histogram!(
        names::VALIDATION_DURATION_SECONDS,
        "Outbound validation call duration in seconds"
    );

    describe_gauge!(
        names::CACHE_ENTRIES,
        "Entries physically present in the token cache"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record an admit/deny decision with its reason.
pub fn record_decision(outcome: &str, reason: &str) {
    counter!(names::DECISIONS_TOTAL, "outcome" => outcome.to_string(), "reason" => reason.to_string())
        .increment(1);
}

/// Record a cache hit on the token lookup path.
pub fn record_cache_hit() {
    counter!(names::CACHE_HITS_TOTAL).increment(1);
}

/// Record a cache miss on the token lookup path.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record an outbound validation call and its duration.
pub fn record_validation(outcome: &str, duration_secs: f64) {
    counter!(names::VALIDATIONS_TOTAL, "outcome" => outcome.to_string()).increment(1);
    histogram!(names::VALIDATION_DURATION_SECONDS, "outcome" => outcome.to_string())
        .record(duration_secs);
}

/// Update the live cache entry gauge.
pub fn set_cache_entries(count: usize) {
    // Precision loss above 2^52 entries is acceptable for a gauge
    #[allow(clippy::cast_precision_loss)]
    gauge!(names::CACHE_ENTRIES).set(count as f64);
}
