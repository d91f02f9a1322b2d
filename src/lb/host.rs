use std::time::Duration;
use tokio::time::Instant;

use super::pool::PoolError;

/// Longest retry delay a policy may configure
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Retry timing applied to hosts that have been marked dead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry probe after a host dies
    pub initial_delay: Duration,

    /// Upper bound for the exponentially growing retry delay
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            max_interval: Duration::from_secs(900),
        }
    }
}

impl RetryPolicy {
    /// Check that the policy actually backs off and stays within bounds
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.initial_delay.is_zero() {
            return Err(PoolError::InvalidRetryPolicy(
                "initial retry delay must be positive".to_string(),
            ));
        }
        if self.max_interval < self.initial_delay {
            return Err(PoolError::InvalidRetryPolicy(format!(
                "max retry interval {:?} is below initial delay {:?}",
                self.max_interval, self.initial_delay
            )));
        }
        if self.max_interval > MAX_RETRY_DELAY {
            return Err(PoolError::InvalidRetryPolicy(format!(
                "max retry interval {:?} exceeds {:?}",
                self.max_interval, MAX_RETRY_DELAY
            )));
        }
        Ok(())
    }
}

/// Instant `delay` after `now`, clamped instead of overflowing
fn retry_deadline(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(MAX_RETRY_DELAY))
        .unwrap_or(now)
}

/// Liveness and retry backoff state for a single host
///
/// An entry is either alive or dead. A dead entry becomes eligible for a
/// probing retry once `next_retry` has passed; every probe doubles the delay
/// until the next one, and the delay is re-armed at the initial value the
/// next time the host dies after having been alive.
///
/// Entries hold no lock of their own. All mutation goes through the owning
/// pool's lock.
#[derive(Debug, Clone)]
pub struct HostEntry {
    /// Host identifier, immutable once created
    host: String,

    /// Whether the host is currently considered dead
    dead: bool,

    /// Earliest instant a dead host may be probed again
    next_retry: Instant,

    /// Current retry delay
    retry_delay: Duration,

    /// Retry timing shared by all entries of a pool
    policy: RetryPolicy,
}

impl HostEntry {
    /// Create a live entry for the given host
    pub fn new(host: String, policy: RetryPolicy) -> Self {
        Self {
            host,
            dead: false,
            next_retry: Instant::now(),
            retry_delay: policy.initial_delay,
            policy,
        }
    }

    /// Host identifier
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Check if the host is currently marked dead
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Current retry delay (only meaningful while dead)
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Instant after which a dead host may be probed
    pub fn next_retry(&self) -> Instant {
        self.next_retry
    }

    /// Update the liveness flag
    ///
    /// Only the alive → dead transition re-arms the retry timer. Reporting a
    /// failure for a host that is already dead leaves its backoff untouched.
    /// Returns `true` when the call changed the liveness state.
    pub fn set_dead(&mut self, dead: bool, now: Instant) -> bool {
        if dead && !self.dead {
            self.retry_delay = self.policy.initial_delay;
            self.next_retry = retry_deadline(now, self.retry_delay);
        }
        let changed = self.dead != dead;
        self.dead = dead;
        changed
    }

    /// Check whether the host may be selected at `now`
    pub fn can_try(&self, now: Instant) -> bool {
        !self.dead || now >= self.next_retry
    }

    /// Record that a dead host is being probed
    ///
    /// Doubles the retry delay (capped at the policy maximum) and pushes the
    /// next retry out accordingly, so a failed probe backs off further.
    pub fn will_retry(&mut self, now: Instant) {
        self.retry_delay = self
            .retry_delay
            .saturating_mul(2)
            .min(self.policy.max_interval);
        self.next_retry = retry_deadline(now, self.retry_delay);
    }
}
