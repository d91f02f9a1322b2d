//! Time-bucketed weighted moving average
//!
//! A [`DecayWindow`] approximates the recent average of a metric (request
//! latency, in practice) without retaining individual samples. It keeps a
//! ring of buckets covering one decay period; a pool-wide timer calls
//! [`DecayWindow::rotate`] every `decay_duration / buckets`, which clears the
//! oldest bucket and makes it the new write target.
//!
//! Buckets are weighted linearly by age, newest highest. An empty bucket
//! contributes the per-sample average of the closest older bucket that had
//! data, so the estimate does not dip to zero right after a rotation.

use std::time::Duration;

/// Number of buckets in a decay window
pub const DECAY_BUCKETS: usize = 120;

/// Default length of the decay period
pub const DEFAULT_DECAY_DURATION: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Bucket {
    count: u64,
    sum: f64,
}

/// Fixed-size ring of `(count, sum)` buckets
#[derive(Debug, Clone)]
pub struct DecayWindow {
    buckets: Vec<Bucket>,
    current: usize,
}

impl DecayWindow {
    /// Create a window with [`DECAY_BUCKETS`] buckets
    pub fn new() -> Self {
        Self::with_buckets(DECAY_BUCKETS)
    }

    /// Create a window with a custom bucket count (at least one)
    pub fn with_buckets(buckets: usize) -> Self {
        Self {
            buckets: vec![Bucket::default(); buckets.max(1)],
            current: 0,
        }
    }

    /// Number of buckets in the ring
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Add a sample to the current bucket
    pub fn record(&mut self, value: f64) {
        let bucket = &mut self.buckets[self.current];
        bucket.count += 1;
        bucket.sum += value;
    }

    /// Advance to the next bucket and clear it
    pub fn rotate(&mut self) {
        self.current = (self.current + 1) % self.buckets.len();
        self.buckets[self.current] = Bucket::default();
    }

    /// Weighted average over all buckets, or `0.0` when nothing was recorded
    ///
    /// Buckets are visited oldest first; the `i`-th visited bucket
    /// (1-indexed) carries weight `i / len`. Weights are not normalized.
    pub fn weighted_average(&self) -> f64 {
        let len = self.buckets.len();
        let mut value = 0.0;
        let mut last = 0.0;

        for i in 1..=len {
            let bucket = &self.buckets[(self.current + i) % len];
            let weight = i as f64 / len as f64;
            if bucket.count > 0 {
                last = bucket.sum / bucket.count as f64;
            }
            value += last * weight;
        }

        value
    }
}

impl Default for DecayWindow {
    fn default() -> Self {
        Self::new()
    }
}
