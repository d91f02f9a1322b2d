//! hostpool - Adaptive client-side host selection
//!
//! Pick which backend host should serve the next request, learn from each
//! outcome, and steer traffic toward healthy, fast hosts while still probing
//! the rest.

pub mod config;
pub mod lb;

pub use config::Config;
pub use lb::{HostPool, HostResponse, PoolError};

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
