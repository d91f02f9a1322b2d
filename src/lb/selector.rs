use std::fmt::Debug;
use std::time::Duration;
use tokio::time::Instant;

use super::pool::PoolError;
use super::table::HostTable;

/// Host selection strategy plugged into a [`HostPool`](super::HostPool)
///
/// The pool owns the [`HostTable`] and calls every method with its lock held,
/// so implementations can keep plain mutable state.
pub trait Selector: Debug + Send + 'static {
    /// Short strategy name used in logs and stats
    fn name(&self) -> &'static str;

    /// Reject tuning the strategy cannot run with
    fn validate(&self) -> Result<(), PoolError> {
        Ok(())
    }

    /// Allocate per-host state for a table of `host_count` entries
    fn init(&mut self, _host_count: usize) {}

    /// Choose the index of the host that should serve the next request
    ///
    /// A dead host chosen as a retry probe must have its backoff advanced
    /// exactly once, through [`HostTable::prepare_retry`] or
    /// [`HostTable::round_robin`].
    fn select(&mut self, table: &mut HostTable, now: Instant) -> usize;

    /// Feed back how long a successful request to host `idx` took
    fn record_timing(&mut self, _idx: usize, _elapsed: Duration) {}

    /// Period of the background decay tick, if the strategy needs one
    fn decay_interval(&self) -> Option<Duration> {
        None
    }

    /// Age out per-host statistics by one tick
    fn decay(&mut self) {}

    /// Whether request durations should be measured for this strategy
    fn wants_timing(&self) -> bool {
        false
    }

    /// Current exploration rate, for adaptive strategies
    fn epsilon(&self) -> Option<f64> {
        None
    }

    /// Learned latency estimate for host `idx`, for adaptive strategies
    fn weighted_average(&self, _idx: usize) -> Option<f64> {
        None
    }
}

/// Plain round-robin over live hosts
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobin;

impl Selector for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn select(&mut self, table: &mut HostTable, now: Instant) -> usize {
        table.round_robin(now)
    }
}

impl<S: Selector + ?Sized> Selector for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn validate(&self) -> Result<(), PoolError> {
        (**self).validate()
    }

    fn init(&mut self, host_count: usize) {
        (**self).init(host_count)
    }

    fn select(&mut self, table: &mut HostTable, now: Instant) -> usize {
        (**self).select(table, now)
    }

    fn record_timing(&mut self, idx: usize, elapsed: Duration) {
        (**self).record_timing(idx, elapsed)
    }

    fn decay_interval(&self) -> Option<Duration> {
        (**self).decay_interval()
    }

    fn decay(&mut self) {
        (**self).decay()
    }

    fn wants_timing(&self) -> bool {
        (**self).wants_timing()
    }

    fn epsilon(&self) -> Option<f64> {
        (**self).epsilon()
    }

    fn weighted_average(&self, idx: usize) -> Option<f64> {
        (**self).weighted_average(idx)
    }
}
