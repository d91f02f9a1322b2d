use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::lb::{
    EpsilonGreedy, EpsilonGreedyConfig, HostPool, LinearCalculator, LogarithmicCalculator,
    PolynomialCalculator, RetryPolicy, RoundRobin, ValueCalculator,
};

/// Host selection strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    RoundRobin,
    EpsilonGreedy,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Strategy::RoundRobin),
            "epsilon_greedy" => Ok(Strategy::EpsilonGreedy),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

/// Latency scoring used by the epsilon-greedy strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculatorKind {
    #[default]
    Linear,
    Logarithmic,
    Polynomial,
}

impl FromStr for CalculatorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "linear" => Ok(CalculatorKind::Linear),
            "logarithmic" | "log" => Ok(CalculatorKind::Logarithmic),
            "polynomial" => Ok(CalculatorKind::Polynomial),
            other => Err(format!("unknown calculator: {}", other)),
        }
    }
}

/// Selection strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Strategy: round_robin or epsilon_greedy
    #[serde(default)]
    pub strategy: Strategy,

    /// Latency averaging period in seconds (0 = default of 300)
    #[serde(default = "default_decay_duration_secs")]
    pub decay_duration_secs: u64,

    /// Latency scoring: linear, logarithmic or polynomial
    #[serde(default)]
    pub calculator: CalculatorKind,

    /// Exponent for the polynomial calculator
    #[serde(default = "default_exponent")]
    pub exponent: f64,

    /// Exploration probability at start
    #[serde(default = "default_initial_epsilon")]
    pub initial_epsilon: f64,

    /// Exploration probability floor
    #[serde(default = "default_min_epsilon")]
    pub min_epsilon: f64,

    /// Factor applied to epsilon on each exploration step
    #[serde(default = "default_epsilon_decay")]
    pub epsilon_decay: f64,

    /// Fixed RNG seed for reproducible selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_decay_duration_secs() -> u64 {
    300
}

fn default_exponent() -> f64 {
    2.0
}

fn default_initial_epsilon() -> f64 {
    0.3
}

fn default_min_epsilon() -> f64 {
    0.01
}

fn default_epsilon_decay() -> f64 {
    0.90
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            decay_duration_secs: default_decay_duration_secs(),
            calculator: CalculatorKind::default(),
            exponent: default_exponent(),
            initial_epsilon: default_initial_epsilon(),
            min_epsilon: default_min_epsilon(),
            epsilon_decay: default_epsilon_decay(),
            seed: None,
        }
    }
}

/// Dead host retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before a dead host is first retried, in seconds
    #[serde(default = "default_initial_retry_delay_secs")]
    pub initial_retry_delay_secs: u64,

    /// Maximum retry delay, in seconds
    #[serde(default = "default_max_retry_interval_secs")]
    pub max_retry_interval_secs: u64,
}

fn default_initial_retry_delay_secs() -> u64 {
    30
}

fn default_max_retry_interval_secs() -> u64 {
    900
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_retry_delay_secs: default_initial_retry_delay_secs(),
            max_retry_interval_secs: default_max_retry_interval_secs(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Host identifiers to pool over
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Selection strategy settings
    #[serde(default)]
    pub selector: SelectorConfig,

    /// Retry settings for dead hosts
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry policy described by this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_secs(self.retry.initial_retry_delay_secs),
            max_interval: Duration::from_secs(self.retry.max_retry_interval_secs),
        }
    }

    /// Latency calculator described by this configuration
    pub fn calculator(&self) -> Box<dyn ValueCalculator> {
        match self.selector.calculator {
            CalculatorKind::Linear => Box::new(LinearCalculator),
            CalculatorKind::Logarithmic => Box::new(LogarithmicCalculator),
            CalculatorKind::Polynomial => Box::new(PolynomialCalculator::new(self.selector.exponent)),
        }
    }

    /// Epsilon-greedy tuning described by this configuration
    pub fn epsilon_config(&self) -> EpsilonGreedyConfig {
        EpsilonGreedyConfig {
            decay_duration: Duration::from_secs(self.selector.decay_duration_secs),
            initial_epsilon: self.selector.initial_epsilon,
            min_epsilon: self.selector.min_epsilon,
            epsilon_decay: self.selector.epsilon_decay,
        }
    }

    /// Build a host pool from this configuration
    ///
    /// Retry delays must back off within bounds and epsilon settings must be
    /// probabilities. The epsilon-greedy strategy must be built inside a
    /// Tokio runtime.
    pub fn build_pool(&self) -> Result<HostPool> {
        let hosts = self.hosts.clone();
        let retry = self.retry_policy();

        let pool = match self.selector.strategy {
            Strategy::RoundRobin => HostPool::with_selector(hosts, retry, RoundRobin),
            Strategy::EpsilonGreedy => {
                let selector = EpsilonGreedy::with_config(self.epsilon_config(), self.calculator());
                match self.selector.seed {
                    Some(seed) => HostPool::with_selector(
                        hosts,
                        retry,
                        selector.with_rng(StdRng::seed_from_u64(seed)),
                    ),
                    None => HostPool::with_selector(hosts, retry, selector),
                }
            }
        };

        pool.context("Failed to build host pool")
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config = serde_yaml::from_str(&content)
        .context("Failed to parse YAML configuration")?;

    Ok(config)
}

/// Load configuration from environment variables
///
/// - HOSTPOOL_HOSTS (comma-separated list of hosts, required)
/// - HOSTPOOL_STRATEGY (round_robin or epsilon_greedy)
/// - HOSTPOOL_CALCULATOR (linear, logarithmic or polynomial)
/// - HOSTPOOL_EXPONENT (polynomial exponent)
/// - HOSTPOOL_DECAY_SECS (latency averaging period)
/// - HOSTPOOL_SEED (fixed RNG seed)
/// - HOSTPOOL_RETRY_DELAY_SECS / HOSTPOOL_MAX_RETRY_SECS
pub fn load_from_env() -> Result<Config> {
    // Try to load .env file if it exists (don't fail if it doesn't)
    let _ = dotenvy::dotenv();

    let mut config = Config::new();

    let hosts_str = std::env::var("HOSTPOOL_HOSTS")
        .context("HOSTPOOL_HOSTS environment variable not set")?;

    config.hosts = hosts_str
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if config.hosts.is_empty() {
        anyhow::bail!("HOSTPOOL_HOSTS contains no valid hosts");
    }

    if let Ok(strategy) = std::env::var("HOSTPOOL_STRATEGY") {
        config.selector.strategy = strategy.parse().map_err(anyhow::Error::msg)?;
    }

    if let Ok(calculator) = std::env::var("HOSTPOOL_CALCULATOR") {
        config.selector.calculator = calculator.parse().map_err(anyhow::Error::msg)?;
    }

    if let Ok(exponent) = std::env::var("HOSTPOOL_EXPONENT") {
        if let Ok(val) = exponent.parse() {
            config.selector.exponent = val;
        }
    }

    if let Ok(decay) = std::env::var("HOSTPOOL_DECAY_SECS") {
        if let Ok(val) = decay.parse() {
            config.selector.decay_duration_secs = val;
        }
    }

    if let Ok(seed) = std::env::var("HOSTPOOL_SEED") {
        if let Ok(val) = seed.parse() {
            config.selector.seed = Some(val);
        }
    }

    if let Ok(delay) = std::env::var("HOSTPOOL_RETRY_DELAY_SECS") {
        if let Ok(val) = delay.parse() {
            config.retry.initial_retry_delay_secs = val;
        }
    }

    if let Ok(max) = std::env::var("HOSTPOOL_MAX_RETRY_SECS") {
        if let Ok(val) = max.parse() {
            config.retry.max_retry_interval_secs = val;
        }
    }

    Ok(config)
}

/// Load configuration from file or environment
///
/// Reads the YAML file when a path is given, otherwise falls back to
/// environment variables.
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    match config_path {
        Some(path) => load_from_yaml(path),
        None => load_from_env(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_yaml() {
        let yaml = r#"
hosts:
  - api-1.example.com
  - api-2.example.com

selector:
  strategy: epsilon_greedy
  decay_duration_secs: 120
  calculator: polynomial
  exponent: 3.0
  seed: 7

retry:
  initial_retry_delay_secs: 5
  max_retry_interval_secs: 60
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.selector.strategy, Strategy::EpsilonGreedy);
        assert_eq!(config.selector.decay_duration_secs, 120);
        assert_eq!(config.selector.calculator, CalculatorKind::Polynomial);
        assert_eq!(config.selector.exponent, 3.0);
        assert_eq!(config.selector.seed, Some(7));
        assert_eq!(
            config.retry_policy(),
            RetryPolicy {
                initial_delay: Duration::from_secs(5),
                max_interval: Duration::from_secs(60),
            }
        );
        assert_eq!(config.calculator().calc_value(2.0), 0.125);
    }

    #[test]
    fn test_default_values() {
        let yaml = r#"
hosts:
  - a
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.selector.strategy, Strategy::RoundRobin);
        assert_eq!(config.selector.calculator, CalculatorKind::Linear);
        assert_eq!(config.selector.initial_epsilon, 0.3);
        assert_eq!(config.selector.min_epsilon, 0.01);
        assert_eq!(config.selector.epsilon_decay, 0.90);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.epsilon_config(), EpsilonGreedyConfig::default());
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("round_robin".parse::<Strategy>(), Ok(Strategy::RoundRobin));
        assert_eq!("epsilon_greedy".parse::<Strategy>(), Ok(Strategy::EpsilonGreedy));
        assert!("random".parse::<Strategy>().is_err());
        assert_eq!("log".parse::<CalculatorKind>(), Ok(CalculatorKind::Logarithmic));
    }

    #[test]
    fn test_build_round_robin_pool() {
        let config = Config {
            hosts: vec!["b".to_string(), "a".to_string()],
            ..Default::default()
        };

        let pool = config.build_pool().unwrap();
        assert_eq!(pool.strategy(), "round_robin");
        assert_eq!(pool.hosts(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_build_empty_pool_fails() {
        let config = Config::new();
        let err = config.build_pool().unwrap_err();
        assert!(format!("{:#}", err).contains("at least one host"));
    }

    #[tokio::test]
    async fn test_build_epsilon_greedy_pool() {
        let mut config = Config {
            hosts: vec!["a".to_string()],
            ..Default::default()
        };
        config.selector.strategy = Strategy::EpsilonGreedy;
        config.selector.seed = Some(1);

        let pool = config.build_pool().unwrap();
        assert_eq!(pool.strategy(), "epsilon_greedy");
        assert_eq!(pool.epsilon(), Some(0.3));
    }

    #[test]
    fn test_build_rejects_bad_retry_settings() {
        for (initial, max) in [(0, 900), (60, 30), (u64::MAX, u64::MAX)] {
            let mut config = Config {
                hosts: vec!["a".to_string(), "b".to_string()],
                ..Default::default()
            };
            config.retry.initial_retry_delay_secs = initial;
            config.retry.max_retry_interval_secs = max;

            let err = config.build_pool().unwrap_err();
            assert!(
                format!("{:#}", err).contains("Invalid retry policy"),
                "initial={initial} max={max}: {err:#}"
            );
        }
    }

    #[test]
    fn test_build_rejects_bad_epsilon_settings() {
        let mut config = Config {
            hosts: vec!["a".to_string()],
            ..Default::default()
        };
        config.selector.strategy = Strategy::EpsilonGreedy;
        config.selector.epsilon_decay = 1.5;

        let err = config.build_pool().unwrap_err();
        assert!(format!("{:#}", err).contains("epsilon_decay"));

        config.selector.epsilon_decay = 0.9;
        config.selector.min_epsilon = 0.5;
        let err = config.build_pool().unwrap_err();
        assert!(format!("{:#}", err).contains("min_epsilon"));
    }
}
