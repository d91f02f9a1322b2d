//! Epsilon-greedy host selection
//!
//! With probability `epsilon` a selection *explores*: it ignores learned
//! scores and defers to round-robin, and epsilon shrinks by a constant factor
//! down to a floor. Otherwise it *exploits*: every eligible host with latency
//! data is scored through a [`ValueCalculator`] and one host is drawn with
//! probability proportional to its score.
//!
//! Latency data comes from successful requests only and is kept per host in a
//! [`DecayWindow`] in milliseconds, rotated by the pool's background decay
//! task. Calculators are handed the average in seconds.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::calculator::ValueCalculator;
use super::decay::{DecayWindow, DECAY_BUCKETS, DEFAULT_DECAY_DURATION};
use super::pool::PoolError;
use super::selector::Selector;
use super::table::HostTable;

/// Tuning for the epsilon-greedy selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonGreedyConfig {
    /// Length of the latency averaging period
    pub decay_duration: Duration,

    /// Exploration probability at start
    pub initial_epsilon: f64,

    /// Exploration never drops below this probability
    pub min_epsilon: f64,

    /// Factor applied to epsilon on every exploration step
    pub epsilon_decay: f64,
}

impl Default for EpsilonGreedyConfig {
    fn default() -> Self {
        Self {
            decay_duration: DEFAULT_DECAY_DURATION,
            initial_epsilon: 0.3,
            min_epsilon: 0.01,
            epsilon_decay: 0.90,
        }
    }
}

impl EpsilonGreedyConfig {
    /// Check that every probability lies in `[0, 1]` and the floor sits
    /// at or below the starting rate
    pub fn validate(&self) -> Result<(), PoolError> {
        let unit = 0.0..=1.0;
        for (name, value) in [
            ("initial_epsilon", self.initial_epsilon),
            ("min_epsilon", self.min_epsilon),
            ("epsilon_decay", self.epsilon_decay),
        ] {
            if !unit.contains(&value) {
                return Err(PoolError::InvalidEpsilon(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.min_epsilon > self.initial_epsilon {
            return Err(PoolError::InvalidEpsilon(format!(
                "min_epsilon {} is above initial_epsilon {}",
                self.min_epsilon, self.initial_epsilon
            )));
        }
        Ok(())
    }
}

/// Adaptive selector biased toward hosts with low recent latency
#[derive(Debug)]
pub struct EpsilonGreedy<R = StdRng> {
    config: EpsilonGreedyConfig,
    epsilon: f64,
    calculator: Box<dyn ValueCalculator>,
    windows: Vec<DecayWindow>,
    rng: R,
}

impl EpsilonGreedy<StdRng> {
    /// Create a selector with default tuning
    ///
    /// A zero `decay_duration` selects the default of five minutes.
    pub fn new(decay_duration: Duration, calculator: impl ValueCalculator + 'static) -> Self {
        Self::with_config(
            EpsilonGreedyConfig {
                decay_duration,
                ..Default::default()
            },
            calculator,
        )
    }

    /// Create a selector with explicit tuning and an entropy-seeded RNG
    pub fn with_config(
        config: EpsilonGreedyConfig,
        calculator: impl ValueCalculator + 'static,
    ) -> Self {
        let config = EpsilonGreedyConfig {
            decay_duration: if config.decay_duration.is_zero() {
                DEFAULT_DECAY_DURATION
            } else {
                config.decay_duration
            },
            ..config
        };

        Self {
            config,
            epsilon: config.initial_epsilon,
            calculator: Box::new(calculator),
            windows: Vec::new(),
            rng: StdRng::from_entropy(),
        }
    }
}

impl<R: Rng> EpsilonGreedy<R> {
    /// Replace the random source, e.g. with a seeded RNG for reproducibility
    pub fn with_rng<R2: Rng>(self, rng: R2) -> EpsilonGreedy<R2> {
        EpsilonGreedy {
            config: self.config,
            epsilon: self.epsilon,
            calculator: self.calculator,
            windows: self.windows,
            rng,
        }
    }

    /// Tuning in effect
    pub fn config(&self) -> &EpsilonGreedyConfig {
        &self.config
    }

    /// Draw against epsilon; on exploration, decay epsilon toward its floor
    fn explore(&mut self) -> bool {
        let roll: f64 = self.rng.gen();
        if roll >= self.epsilon {
            return false;
        }

        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.min_epsilon);
        true
    }

    /// Weighted draw among eligible hosts that have latency data
    fn exploit(&mut self, table: &HostTable, now: Instant) -> Option<usize> {
        let mut scored = Vec::with_capacity(table.len());
        let mut total = 0.0;

        for (idx, window) in self.windows.iter().enumerate().take(table.len()) {
            if !table.can_try(idx, now) {
                continue;
            }
            let avg = window.weighted_average();
            if !(avg > 0.0 && avg.is_finite()) {
                continue;
            }
            let value = self.calculator.calc_value(avg / 1000.0);
            if !(value > 0.0 && value.is_finite()) {
                continue;
            }
            total += value;
            scored.push((idx, value));
        }

        if scored.is_empty() {
            return None;
        }
        if !(total > 0.0 && total.is_finite()) {
            debug!(total, "host scores not usable for a weighted pick");
            return None;
        }

        let pick: f64 = self.rng.gen();
        let mut ceiling = 0.0;
        for (idx, value) in scored {
            ceiling += value / total;
            if pick <= ceiling {
                return Some(idx);
            }
        }

        debug!(pick, ceiling, "weighted pick fell through rounding");
        None
    }
}

impl<R: Rng + Debug + Send + 'static> Selector for EpsilonGreedy<R> {
    fn name(&self) -> &'static str {
        "epsilon_greedy"
    }

    fn validate(&self) -> Result<(), PoolError> {
        self.config.validate()
    }

    fn init(&mut self, host_count: usize) {
        self.windows = vec![DecayWindow::new(); host_count];
    }

    fn select(&mut self, table: &mut HostTable, now: Instant) -> usize {
        if self.explore() {
            debug!(epsilon = self.epsilon, "exploring");
            return table.round_robin(now);
        }

        match self.exploit(table, now) {
            Some(idx) => {
                table.prepare_retry(idx, now);
                idx
            }
            None => table.round_robin(now),
        }
    }

    fn record_timing(&mut self, idx: usize, elapsed: Duration) {
        if let Some(window) = self.windows.get_mut(idx) {
            window.record(elapsed.as_nanos() as f64 / 1_000_000.0);
        }
    }

    fn decay_interval(&self) -> Option<Duration> {
        let per_bucket = self.config.decay_duration / DECAY_BUCKETS as u32;
        Some(per_bucket.max(Duration::from_millis(1)))
    }

    fn decay(&mut self) {
        for window in &mut self.windows {
            window.rotate();
        }
    }

    fn wants_timing(&self) -> bool {
        true
    }

    fn epsilon(&self) -> Option<f64> {
        Some(self.epsilon)
    }

    fn weighted_average(&self, idx: usize) -> Option<f64> {
        self.windows.get(idx).map(DecayWindow::weighted_average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lb::calculator::{LinearCalculator, LogarithmicCalculator};
    use crate::lb::host::RetryPolicy;
    use rand::rngs::mock::StepRng;

    /// Scores every host the same fixed value
    #[derive(Debug)]
    struct Constant(f64);

    impl ValueCalculator for Constant {
        fn calc_value(&self, _avg_latency: f64) -> f64 {
            self.0
        }
    }

    /// Scores a host by its latency in seconds, unchanged
    #[derive(Debug)]
    struct Identity;

    impl ValueCalculator for Identity {
        fn calc_value(&self, avg_latency: f64) -> f64 {
            avg_latency
        }
    }

    fn table(hosts: &[&str]) -> HostTable {
        HostTable::new(
            hosts.iter().map(|h| h.to_string()).collect(),
            RetryPolicy::default(),
        )
        .unwrap()
    }

    fn greedy<R: Rng>(calculator: impl ValueCalculator + 'static, rng: R) -> EpsilonGreedy<R> {
        let config = EpsilonGreedyConfig {
            initial_epsilon: 0.0,
            min_epsilon: 0.0,
            ..Default::default()
        };
        let mut selector = EpsilonGreedy::with_config(config, calculator).with_rng(rng);
        selector.windows = vec![DecayWindow::new(); 2];
        selector
    }

    fn greedy_only(seed: u64) -> EpsilonGreedy {
        greedy(LinearCalculator, StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_zero_decay_duration_uses_default() {
        let selector = EpsilonGreedy::new(Duration::ZERO, LinearCalculator);
        assert_eq!(selector.config().decay_duration, DEFAULT_DECAY_DURATION);
        assert_eq!(
            selector.decay_interval(),
            Some(Duration::from_millis(2500))
        );
    }

    #[test]
    fn test_epsilon_decays_on_exploration() {
        let mut t = table(&["a", "b"]);
        let now = Instant::now();
        // A constant zero roll explores on every selection
        let mut selector =
            EpsilonGreedy::new(Duration::ZERO, LinearCalculator).with_rng(StepRng::new(0, 0));
        selector.init(t.len());

        for k in 1..=60 {
            selector.select(&mut t, now);
            let expected = (0.3 * 0.90_f64.powi(k)).max(0.01);
            let epsilon = selector.epsilon().unwrap();
            assert!((epsilon - expected).abs() < 1e-9, "k={k}: {epsilon} != {expected}");
        }
        assert_eq!(selector.epsilon(), Some(0.01));
    }

    #[test]
    fn test_exploration_uses_round_robin() {
        let mut t = table(&["a", "b", "c"]);
        let now = Instant::now();
        let mut selector =
            EpsilonGreedy::new(Duration::ZERO, LinearCalculator).with_rng(StepRng::new(0, 0));
        selector.init(t.len());
        selector.record_timing(2, Duration::from_millis(1));

        let picks: Vec<usize> = (0..3).map(|_| selector.select(&mut t, now)).collect();
        assert_eq!(picks, vec![0, 1, 2]);
    }

    #[test]
    fn test_no_data_falls_back_to_round_robin() {
        let mut t = table(&["a", "b"]);
        let now = Instant::now();
        let mut selector = greedy_only(7);

        let picks: Vec<usize> = (0..4).map(|_| selector.select(&mut t, now)).collect();
        assert_eq!(picks, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_exploitation_prefers_fast_host() {
        let mut t = table(&["a", "b"]);
        let now = Instant::now();
        let mut selector = greedy_only(42);
        for _ in 0..10 {
            selector.record_timing(0, Duration::from_millis(10));
            selector.record_timing(1, Duration::from_millis(100));
        }

        let mut counts = [0usize; 2];
        for _ in 0..1000 {
            counts[selector.select(&mut t, now)] += 1;
        }

        // 1/avg scoring gives host a a 10/11 share
        assert!(counts[0] > 850 && counts[0] < 960, "counts: {counts:?}");
        assert!(counts[1] > 0);
    }

    #[test]
    fn test_logarithmic_prefers_fast_host() {
        let mut t = table(&["a", "b"]);
        let now = Instant::now();
        let mut selector = greedy(LogarithmicCalculator, StdRng::seed_from_u64(42));
        selector.record_timing(0, Duration::from_millis(10));
        selector.record_timing(1, Duration::from_millis(100));

        let mut counts = [0usize; 2];
        for _ in 0..1000 {
            counts[selector.select(&mut t, now)] += 1;
        }

        // ln(100) against ln(10) gives host a a 2/3 share
        assert!(counts[0] > 600 && counts[0] < 740, "counts: {counts:?}");
    }

    #[test]
    fn test_non_positive_score_left_out_of_draw() {
        let mut t = table(&["a", "b"]);
        let now = Instant::now();
        let mut selector = greedy(LogarithmicCalculator, StdRng::seed_from_u64(9));
        selector.record_timing(0, Duration::from_millis(10));
        // Two seconds scores ln(0.5), which is negative
        selector.record_timing(1, Duration::from_secs(2));

        for _ in 0..100 {
            assert_eq!(selector.select(&mut t, now), 0);
        }
    }

    #[test]
    fn test_unusable_scores_fall_back_to_round_robin() {
        for score in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            let mut t = table(&["a", "b"]);
            let now = Instant::now();
            let mut selector = greedy(Constant(score), StdRng::seed_from_u64(5));
            selector.record_timing(0, Duration::from_millis(10));
            selector.record_timing(1, Duration::from_millis(20));

            let picks: Vec<usize> = (0..4).map(|_| selector.select(&mut t, now)).collect();
            assert_eq!(picks, vec![0, 1, 0, 1], "score {score}");
        }
    }

    #[test]
    fn test_rounding_fall_through_uses_round_robin() {
        let mut t = table(&["a", "b"]);
        let now = Instant::now();
        // Every draw is the largest f64 below 1.0; the normalized scores of
        // 0.011 and 0.024 only add up to 1.0 - 2^-52
        let mut selector = greedy(Identity, StepRng::new(u64::MAX, 0));
        selector.record_timing(0, Duration::from_millis(11));
        selector.record_timing(1, Duration::from_millis(24));

        let picks: Vec<usize> = (0..3).map(|_| selector.select(&mut t, now)).collect();
        assert_eq!(picks, vec![0, 1, 0]);
    }

    #[test]
    fn test_config_validation() {
        assert!(EpsilonGreedyConfig::default().validate().is_ok());

        let growing = EpsilonGreedyConfig {
            epsilon_decay: 1.5,
            ..Default::default()
        };
        assert!(matches!(growing.validate(), Err(PoolError::InvalidEpsilon(_))));

        let raised_floor = EpsilonGreedyConfig {
            min_epsilon: 0.5,
            ..Default::default()
        };
        assert!(matches!(raised_floor.validate(), Err(PoolError::InvalidEpsilon(_))));

        let negative = EpsilonGreedyConfig {
            initial_epsilon: -0.1,
            min_epsilon: -0.2,
            ..Default::default()
        };
        assert!(matches!(negative.validate(), Err(PoolError::InvalidEpsilon(_))));

        let selector = EpsilonGreedy::with_config(growing, LinearCalculator);
        assert!(selector.validate().is_err());
    }

    #[test]
    fn test_exploited_dead_host_retried_once() {
        let mut t = table(&["a", "b"]);
        let now = Instant::now();
        let mut selector = greedy_only(3);
        selector.record_timing(0, Duration::from_millis(5));

        t.mark(0, false, now);
        let retry_at = now + Duration::from_secs(30);

        // Before the retry window only b is eligible, and it has no data
        assert_eq!(selector.select(&mut t, now), 1);

        assert_eq!(selector.select(&mut t, retry_at), 0);
        assert_eq!(t.get(0).unwrap().retry_delay(), Duration::from_secs(60));
        assert!(!t.can_try(0, retry_at));
    }

    #[test]
    fn test_decay_ages_out_samples() {
        let mut selector = greedy_only(1);
        selector.record_timing(0, Duration::from_millis(20));
        assert_eq!(selector.weighted_average(0), Some(20.0));

        for _ in 0..DECAY_BUCKETS {
            selector.decay();
        }
        assert_eq!(selector.weighted_average(0), Some(0.0));
        assert_eq!(selector.weighted_average(5), None);
    }
}
