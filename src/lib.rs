//! # ical-gate
//!
//! An inline request-authorization gate for axum/tower services. Callers
//! from a trusted subnet pass straight through; everyone else must present
//! a bearer token that is validated against a remote calendar service, with
//! successful validations cached for a configurable freshness window.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  GateLayer (subnet → token → cache → remote validation)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Protected backend handler                                  │
//! └─────────────────────────────────────────────────────────────┘
//!          │                          │
//!          ▼                          ▼
//!   ExpiringCache              Calendar service
//!   (TTL + background sweep)   (GET /calendars/<token>)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ical_gate::{AppState, ExpiringCache, GateConfig, GateLayer, IcalValidator, build_router};
//!
//! # fn main() -> Result<(), ical_gate::GateError> {
//! let config = GateConfig::from_env()?;
//! let cache = ExpiringCache::new(config.freshness, config.sweep_interval);
//! let validator = IcalValidator::new(&config.validation_base_url, config.validation_timeout)?;
//! let gate = GateLayer::new(&config, validator, cache)?;
//! let app = build_router(AppState::new(config), gate);
//! // Serve the app...
//! # Ok(())
//! # }
//! ```
//!
//! ## Trust Model
//!
//! The subnet allow-list relies on caller addresses taken from proxy
//! headers; see [`middleware::ip`] for the deployment assumptions that
//! make this sound. Everything ambiguous fails closed: unparseable
//! addresses, missing tokens, short validation responses, and transport
//! errors all deny.

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod utils;
pub mod validator;

// Re-exports for convenience
pub use cache::{ExpiringCache, ValidityCache};
pub use config::GateConfig;
pub use error::{GateError, GateResult};
pub use middleware::GateLayer;
pub use routes::build_router;
pub use state::AppState;
pub use validator::{IcalValidator, TokenValidator};
