//! Host selection module for hostpool
//!
//! This module decides which host should serve the next outgoing request and
//! learns from the outcome of every request it hands out.
//!
//! # Components
//!
//! - [`HostEntry`]: Liveness and retry backoff state for one host
//! - [`HostTable`]: The fixed, ordered host set shared by all strategies
//! - [`Selector`]: Pluggable selection strategy ([`RoundRobin`], [`EpsilonGreedy`])
//! - [`DecayWindow`]: Bucketed moving average of recent latency
//! - [`ValueCalculator`]: Turns an average latency into a selection score
//! - [`HostPool`]: Owns the lock, hands out [`HostResponse`] handles
//!
//! # Selection Strategies
//!
//! - **Round-robin**: Cycle through live hosts in id order
//! - **Epsilon-greedy**: Mostly pick hosts in proportion to their latency
//!   score, exploring via round-robin with a slowly decaying probability
//!
//! # Failure Handling
//!
//! A failed request marks its host dead. Dead hosts are skipped until their
//! retry delay (30s initially) has passed, then probed once; each probe
//! doubles the delay up to 15 minutes. A success brings the host back. If
//! every host is dead and none is due for a retry, the whole pool is reset to
//! alive so selection never comes up empty.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use hostpool::lb::{HostPool, LinearCalculator};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hosts = vec![
//!     "http://api-1.example.com".to_string(),
//!     "http://api-2.example.com".to_string(),
//! ];
//!
//! let pool = HostPool::epsilon_greedy(hosts, Duration::ZERO, LinearCalculator)?;
//!
//! let response = pool.get();
//! let outcome: Result<(), String> = Ok(()); // ... perform request against response.host() ...
//! response.mark(&outcome);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! [`HostPool`] keeps all mutable state behind one `parking_lot::Mutex`, held
//! only for bounded, non-blocking sections. The background decay task takes
//! the same lock, so there is no lock ordering to get wrong.

pub mod calculator;
pub mod decay;
pub mod epsilon;
pub mod host;
pub mod pool;
pub mod response;
pub mod selector;
pub mod table;

pub use calculator::{LinearCalculator, LogarithmicCalculator, PolynomialCalculator, ValueCalculator};
pub use decay::{DecayWindow, DECAY_BUCKETS, DEFAULT_DECAY_DURATION};
pub use epsilon::{EpsilonGreedy, EpsilonGreedyConfig};
pub use host::{HostEntry, RetryPolicy};
pub use pool::{HostPool, HostStats, PoolError};
pub use response::HostResponse;
pub use selector::{RoundRobin, Selector};
pub use table::HostTable;
