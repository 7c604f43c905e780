//! Gate configuration loaded from environment variables.
//!
//! All options have defaults suitable for local development; production
//! deployments configure via environment variables or a `.env` file.
//!
//! # Core Options
//!
//! - `AUTH_HEADER_NAME`: header inspected for the bearer token (default `Authorization`)
//! - `FORWARD_TOKEN`: keep the header on admitted requests (default `false`)
//! - `FRESHNESS_SECS`: cache TTL for validated tokens (default `3600`)
//! - `ALLOW_SUBNET`: CIDR range exempted from token checks (default `0.0.0.0/24`)
//! - `VALIDATION_BASE_URL`: calendar service base URL (default `https://ical.psu.ru`)
//!
//! A malformed subnet or header name is a construction-time failure, never
//! a per-request one.

use std::env;
use std::time::Duration;

use axum::http::HeaderName;

use crate::error::{GateError, GateResult};
use crate::middleware::ip::Subnet;

/// Immutable gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    // =========================================================================
    // Authorization Configuration
    // =========================================================================
    /// Header inspected (and optionally stripped) for the token
    pub header_name: String,

    /// If false, the token header is removed before the request is forwarded
    /// to the backend, so credentials never leak downstream
    pub forward_token: bool,

    /// How long a validated token stays fresh in the cache
    pub freshness: Duration,

    /// CIDR range whose callers skip token validation entirely
    pub allow_subnet: String,

    // =========================================================================
    // Remote Validation Configuration
    // =========================================================================
    /// Base URL of the calendar service used to validate tokens
    pub validation_base_url: String,

    /// Upper bound on a single outbound validation call. The remote check
    /// sits on the request hot path, so it must never hang unbounded.
    pub validation_timeout: Duration,

    // =========================================================================
    // Cache Maintenance Configuration
    // =========================================================================
    /// Cadence of the background eviction sweep. Much coarser than the
    /// freshness TTL; only affects memory footprint, not read correctness.
    pub sweep_interval: Duration,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g. "info", "debug", "trace")
    pub log_level: String,

    /// Port for the Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl GateConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Config` if any value fails to parse or
    /// [`validate`](Self::validate) rejects the combination.
    pub fn from_env() -> GateResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,

            // Authorization
            header_name: env::var("AUTH_HEADER_NAME")
                .unwrap_or_else(|_| "Authorization".to_string()),
            forward_token: Self::parse_env("FORWARD_TOKEN", false)?,
            freshness: Duration::from_secs(Self::parse_env("FRESHNESS_SECS", 3600)?),
            allow_subnet: env::var("ALLOW_SUBNET").unwrap_or_else(|_| "0.0.0.0/24".to_string()),

            // Remote validation
            validation_base_url: env::var("VALIDATION_BASE_URL")
                .unwrap_or_else(|_| "https://ical.psu.ru".to_string()),
            validation_timeout: Duration::from_secs(Self::parse_env(
                "VALIDATION_TIMEOUT_SECS",
                10,
            )?),

            // Cache maintenance
            sweep_interval: Duration::from_secs(Self::parse_env(
                "CACHE_SWEEP_INTERVAL_SECS",
                8 * 3600,
            )?),

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Config` if validation fails.
    pub fn validate(&self) -> GateResult<()> {
        // The allow-list must parse up front; a gate running with a broken
        // subnet would silently deny or admit the wrong callers
        Subnet::parse(&self.allow_subnet)?;

        HeaderName::from_bytes(self.header_name.as_bytes()).map_err(|_| {
            GateError::Config(format!(
                "AUTH_HEADER_NAME is not a valid header name: {:?}",
                self.header_name
            ))
        })?;

        if self.freshness.is_zero() {
            return Err(GateError::Config(
                "FRESHNESS_SECS must be greater than 0".to_string(),
            ));
        }

        if self.validation_timeout.is_zero() {
            return Err(GateError::Config(
                "VALIDATION_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.sweep_interval.is_zero() {
            return Err(GateError::Config(
                "CACHE_SWEEP_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        if self.validation_base_url.is_empty() {
            return Err(GateError::Config(
                "VALIDATION_BASE_URL must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> GateResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| GateError::Config(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `GateConfig::from_env()` instead.
impl Default for GateConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            header_name: "Authorization".to_string(),
            forward_token: false,
            freshness: Duration::from_secs(3600),
            allow_subnet: "0.0.0.0/24".to_string(),
            validation_base_url: "https://ical.psu.ru".to_string(),
            validation_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(8 * 3600),
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = GateConfig::default();

        assert_eq!(config.header_name, "Authorization");
        assert!(!config.forward_token);
        assert_eq!(config.freshness, Duration::from_secs(3600));
        assert_eq!(config.allow_subnet, "0.0.0.0/24");
        assert_eq!(config.sweep_interval, Duration::from_secs(8 * 3600));
    }

    #[test]
    fn test_default_config_validates() {
        assert!(GateConfig::default().validate().is_ok());
    }

    #[test]
    fn test_server_addr_format() {
        let config = GateConfig {
            host: "localhost".to_string(),
            port: 8080,
            ..GateConfig::default()
        };

        assert_eq!(config.server_addr(), "localhost:8080");
    }

    #[test]
    fn test_invalid_subnet_fails_validation() {
        let config = GateConfig {
            allow_subnet: "not-a-subnet".to_string(),
            ..GateConfig::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("subnet"));
    }

    #[test]
    fn test_invalid_header_name_fails_validation() {
        let config = GateConfig {
            header_name: "bad header\nname".to_string(),
            ..GateConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_freshness_fails_validation() {
        let config = GateConfig {
            freshness: Duration::ZERO,
            ..GateConfig::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("FRESHNESS_SECS")
        );
    }

    #[test]
    fn test_empty_validation_url_fails_validation() {
        let config = GateConfig {
            validation_base_url: String::new(),
            ..GateConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_addr() {
        let config = GateConfig::default();
        assert!(config.metrics_addr().is_some());

        let config = GateConfig {
            metrics_port: 0,
            ..GateConfig::default()
        };
        assert!(config.metrics_addr().is_none());
    }
}
