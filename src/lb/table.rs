use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::host::{HostEntry, RetryPolicy};
use super::pool::PoolError;

/// Fixed set of host entries shared by every selection strategy
///
/// Entries are kept sorted by host id, which gives round-robin a stable
/// order. Membership never changes after construction; only entry state and
/// the round-robin cursor mutate.
#[derive(Debug, Clone)]
pub struct HostTable {
    entries: Vec<HostEntry>,
    index: HashMap<String, usize>,
    cursor: usize,
}

impl HostTable {
    /// Build a table from a non-empty list of unique host ids
    pub fn new(mut hosts: Vec<String>, policy: RetryPolicy) -> Result<Self, PoolError> {
        if hosts.is_empty() {
            return Err(PoolError::NoHosts);
        }
        policy.validate()?;

        hosts.sort();
        if let Some(pair) = hosts.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(PoolError::DuplicateHost(pair[0].clone()));
        }

        let index = hosts
            .iter()
            .enumerate()
            .map(|(idx, host)| (host.clone(), idx))
            .collect();
        let entries = hosts
            .into_iter()
            .map(|host| HostEntry::new(host, policy))
            .collect();

        Ok(Self {
            entries,
            index,
            cursor: 0,
        })
    }

    /// Number of hosts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// All entries in selection order
    pub fn entries(&self) -> &[HostEntry] {
        &self.entries
    }

    /// Entry at the given position
    pub fn get(&self, idx: usize) -> Option<&HostEntry> {
        self.entries.get(idx)
    }

    /// Position of a host id, if it belongs to the table
    pub fn index_of(&self, host: &str) -> Option<usize> {
        self.index.get(host).copied()
    }

    /// Where the next round-robin scan begins
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Check whether the host at `idx` may be selected at `now`
    pub fn can_try(&self, idx: usize, now: Instant) -> bool {
        self.entries[idx].can_try(now)
    }

    /// Pick the next eligible host in round-robin order
    ///
    /// Scans once around the ring starting at the cursor. A dead host whose
    /// retry window has opened is chosen as a probe and its backoff advanced.
    /// When nothing is eligible, every host is reset to alive and the first
    /// one is returned.
    pub fn round_robin(&mut self, now: Instant) -> usize {
        let len = self.entries.len();

        for offset in 0..len {
            let idx = (self.cursor + offset) % len;
            if self.entries[idx].can_try(now) {
                self.prepare_retry(idx, now);
                self.cursor = (idx + 1) % len;
                return idx;
            }
        }

        warn!(hosts = len, "no eligible host, resetting pool");
        self.reset_all();
        self.cursor = 1 % len;
        0
    }

    /// Advance backoff for a dead host that is about to be probed
    ///
    /// Called exactly once per selection. Live hosts are left alone.
    pub fn prepare_retry(&mut self, idx: usize, now: Instant) {
        let entry = &mut self.entries[idx];
        if entry.is_dead() {
            entry.will_retry(now);
            debug!(
                host = %entry.host(),
                retry_delay_ms = entry.retry_delay().as_millis() as u64,
                "retrying dead host"
            );
        }
    }

    /// Apply a request outcome to the host at `idx`
    pub fn mark(&mut self, idx: usize, success: bool, now: Instant) {
        let entry = &mut self.entries[idx];
        let changed = entry.set_dead(!success, now);

        if changed && success {
            info!(host = %entry.host(), "host recovered");
        } else if changed {
            warn!(
                host = %entry.host(),
                retry_delay_ms = entry.retry_delay().as_millis() as u64,
                "host marked dead"
            );
        }
    }

    /// Force every host back to alive
    pub fn reset_all(&mut self) {
        let now = Instant::now();
        for entry in &mut self.entries {
            entry.set_dead(false, now);
        }
    }
}
