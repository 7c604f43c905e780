//! Router assembly for the demo host.
//!
//! ```text
//! GET /health          - liveness probe, outside the gate
//! *   (anything else)  - authorization gate → stand-in backend
//! ```
//!
//! The gate is applied only to the protected sub-router so the health probe
//! never consumes a token or a validation call.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::cache::ValidityCache;
use crate::handlers;
use crate::middleware::GateLayer;
use crate::state::AppState;
use crate::validator::TokenValidator;

/// Build the application router with the gate guarding everything except
/// `/health`.
pub fn build_router<V, C>(state: AppState, gate: GateLayer<V, C>) -> Router
where
    V: TokenValidator,
    C: ValidityCache,
{
    let protected = Router::new()
        .fallback(handlers::backend_stub)
        .layer(gate);

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
