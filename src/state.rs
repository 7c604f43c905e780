//! Shared application state for the demo host's handlers.
//!
//! Deliberately thin: the gate owns its cache and validator itself (they are
//! threaded through [`crate::middleware::GateLayer`]); handlers only need
//! read access to the configuration and the process start time.

use std::sync::Arc;
use std::time::Instant;

use crate::config::GateConfig;

/// Clonable state handed to axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<GateConfig>,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_starts_near_zero() {
        let state = AppState::new(GateConfig::default());
        assert!(state.uptime_seconds() < 2);
    }
}
