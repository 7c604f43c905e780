//! HTTP middleware: the authorization gate and its caller classification.
//!
//! - **gate**: tower layer orchestrating the admit/deny decision
//! - **ip**: caller address resolution and allow-list subnet matching
//!
//! ```text
//! Request → Gate (subnet → token → cache → remote validation) → Backend
//!              ↓
//!         401 Unauthorized (CORS-aware for browser callers)
//! ```

pub mod gate;
pub mod ip;

pub use gate::{GateLayer, GateService};
pub use ip::{Subnet, UNKNOWN_ADDR, resolve_client_addr};
