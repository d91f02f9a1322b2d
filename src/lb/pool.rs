use parking_lot::Mutex;
use std::fmt::Display;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info};

use super::calculator::ValueCalculator;
use super::epsilon::EpsilonGreedy;
use super::host::RetryPolicy;
use super::response::HostResponse;
use super::selector::{RoundRobin, Selector};
use super::table::HostTable;

/// Host pool error types
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Host pool requires at least one host")]
    NoHosts,

    #[error("Duplicate host in pool: {0}")]
    DuplicateHost(String),

    #[error("Host not in pool: {0}")]
    UnknownHost(String),

    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    #[error("Invalid epsilon settings: {0}")]
    InvalidEpsilon(String),

    #[error("Selector needs a Tokio runtime for its decay task")]
    NoRuntime,
}

/// Everything guarded by the pool-wide lock
#[derive(Debug)]
pub(crate) struct PoolState {
    pub(crate) table: HostTable,
    pub(crate) selector: Box<dyn Selector>,
}

impl PoolState {
    /// Apply a request outcome; timing is only recorded for successes
    pub(crate) fn record_outcome(&mut self, idx: usize, success: bool, elapsed: Option<Duration>) {
        if let (true, Some(elapsed)) = (success, elapsed) {
            self.selector.record_timing(idx, elapsed);
        }
        self.table.mark(idx, success, Instant::now());
    }
}

pub(crate) type SharedState = Arc<Mutex<PoolState>>;

/// Point-in-time view of a single host
#[derive(Debug, Clone, PartialEq)]
pub struct HostStats {
    pub host: String,
    pub is_dead: bool,
    pub retry_delay: Duration,
    /// Learned latency estimate in milliseconds (adaptive selectors only)
    pub weighted_average_ms: Option<f64>,
}

/// A fixed set of hosts with pluggable selection
///
/// Call [`HostPool::get`] for every outgoing request, talk to
/// [`HostResponse::host`], then report the outcome once through
/// [`HostResponse::mark`]. A handle that is never marked simply contributes
/// nothing. Failures back a host off exponentially; successes restore it.
///
/// All state sits behind a single lock held only for short, non-blocking
/// sections, so a pool can be shared freely across threads and tasks.
pub struct HostPool {
    hosts: Vec<String>,
    state: SharedState,
    strategy: &'static str,
    wants_timing: bool,
    decay_task: Mutex<Option<JoinHandle<()>>>,
}

impl HostPool {
    /// Create a round-robin pool with the default retry policy
    pub fn new(hosts: Vec<String>) -> Result<Self, PoolError> {
        Self::with_selector(hosts, RetryPolicy::default(), RoundRobin)
    }

    /// Create an epsilon-greedy pool scoring hosts with `calculator`
    ///
    /// Must be called inside a Tokio runtime, which drives latency decay.
    /// A zero `decay_duration` selects the default of five minutes.
    pub fn epsilon_greedy(
        hosts: Vec<String>,
        decay_duration: Duration,
        calculator: impl ValueCalculator + 'static,
    ) -> Result<Self, PoolError> {
        Self::with_selector(
            hosts,
            RetryPolicy::default(),
            EpsilonGreedy::new(decay_duration, calculator),
        )
    }

    /// Create a pool with an explicit retry policy and selection strategy
    pub fn with_selector(
        hosts: Vec<String>,
        retry: RetryPolicy,
        mut selector: impl Selector,
    ) -> Result<Self, PoolError> {
        let table = HostTable::new(hosts, retry)?;
        selector.validate()?;
        selector.init(table.len());

        let hosts: Vec<String> = table.entries().iter().map(|e| e.host().to_string()).collect();
        let strategy = selector.name();
        let wants_timing = selector.wants_timing();
        let decay_interval = selector.decay_interval();

        let state = Arc::new(Mutex::new(PoolState {
            table,
            selector: Box::new(selector),
        }));

        let decay_task = match decay_interval {
            Some(period) => {
                let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;
                Some(spawn_decay_task(&runtime, Arc::downgrade(&state), period))
            }
            None => None,
        };

        info!(hosts = hosts.len(), strategy, "host pool ready");

        Ok(Self {
            hosts,
            state,
            strategy,
            wants_timing,
            decay_task: Mutex::new(decay_task),
        })
    }

    /// Select a host for the next request
    ///
    /// Never blocks on I/O and always yields a host. If every host is dead
    /// and none is due for a retry, the pool resets them all to alive.
    pub fn get(&self) -> HostResponse {
        let idx = {
            let mut state = self.state.lock();
            let PoolState { table, selector } = &mut *state;
            selector.select(table, Instant::now())
        };

        let started = self.wants_timing.then(Instant::now);
        HostResponse::new(self.hosts[idx].clone(), idx, Arc::clone(&self.state), started)
    }

    /// Report a request outcome for a host directly, bypassing a handle
    ///
    /// No timing is recorded. An id outside the pool is a caller bug and is
    /// reported as [`PoolError::UnknownHost`].
    pub fn mark_host<T, E: Display>(
        &self,
        host: &str,
        outcome: &Result<T, E>,
    ) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        let idx = state.table.index_of(host).ok_or_else(|| {
            error!(host, "outcome reported for host not in pool");
            PoolError::UnknownHost(host.to_string())
        })?;

        if let Err(e) = outcome {
            debug!(host, error = %e, "request failed");
        }
        state.record_outcome(idx, outcome.is_ok(), None);
        Ok(())
    }

    /// Force every host back to alive, discarding backoff state
    pub fn reset_all(&self) {
        self.state.lock().table.reset_all();
        info!(hosts = self.hosts.len(), "all hosts reset");
    }

    /// Configured hosts in selection order (sorted by id)
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Name of the selection strategy
    pub fn strategy(&self) -> &'static str {
        self.strategy
    }

    /// Current exploration rate, for adaptive pools
    pub fn epsilon(&self) -> Option<f64> {
        self.state.lock().selector.epsilon()
    }

    /// Snapshot of every host's state
    pub fn stats(&self) -> Vec<HostStats> {
        let state = self.state.lock();
        state
            .table
            .entries()
            .iter()
            .enumerate()
            .map(|(idx, entry)| HostStats {
                host: entry.host().to_string(),
                is_dead: entry.is_dead(),
                retry_delay: entry.retry_delay(),
                weighted_average_ms: state.selector.weighted_average(idx),
            })
            .collect()
    }

    /// Stop the background decay task
    ///
    /// Outstanding handles can still be marked afterwards. Also runs on drop.
    pub fn shutdown(&self) {
        if let Some(task) = self.decay_task.lock().take() {
            task.abort();
            info!(strategy = self.strategy, "host pool decay task stopped");
        }
    }
}

impl Drop for HostPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for HostPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPool")
            .field("hosts", &self.hosts)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Rotate every host's decay window once per `period`
///
/// Holds only a weak reference so a dropped pool ends the task.
fn spawn_decay_task(
    runtime: &Handle,
    state: Weak<Mutex<PoolState>>,
    period: Duration,
) -> JoinHandle<()> {
    let start = Instant::now() + period;

    runtime.spawn(async move {
        let mut ticker = time::interval_at(start, period);

        loop {
            ticker.tick().await;

            let Some(shared) = state.upgrade() else {
                break;
            };
            shared.lock().selector.decay();
            debug!("decay windows rotated");
        }
    })
}
