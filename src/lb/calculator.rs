//! Scoring strategies that turn an average latency into a selection weight
//!
//! Higher scores are more desirable. The epsilon-greedy selector normalizes
//! scores across hosts, so calculators only need to be monotonic in the
//! right direction.

use std::fmt::Debug;

/// Maps a strictly positive average latency to a comparable score
///
/// Hosts whose score is not strictly positive and finite are left out of
/// the weighted draw.
pub trait ValueCalculator: Debug + Send + Sync {
    /// Score for the given average latency, in seconds
    fn calc_value(&self, avg_latency: f64) -> f64;
}

/// Score is the reciprocal of the latency
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearCalculator;

impl ValueCalculator for LinearCalculator {
    fn calc_value(&self, avg_latency: f64) -> f64 {
        1.0 / avg_latency
    }
}

/// Score is the natural log of the reciprocal latency
///
/// Positive only for latencies under one second.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogarithmicCalculator;

impl ValueCalculator for LogarithmicCalculator {
    fn calc_value(&self, avg_latency: f64) -> f64 {
        LinearCalculator.calc_value(avg_latency).ln()
    }
}

/// Score is the reciprocal latency raised to a fixed exponent
#[derive(Debug, Clone, Copy)]
pub struct PolynomialCalculator {
    /// Exponent applied to the reciprocal latency
    pub exponent: f64,
}

impl PolynomialCalculator {
    pub fn new(exponent: f64) -> Self {
        Self { exponent }
    }
}

impl ValueCalculator for PolynomialCalculator {
    fn calc_value(&self, avg_latency: f64) -> f64 {
        LinearCalculator.calc_value(avg_latency).powf(self.exponent)
    }
}

impl<C: ValueCalculator + ?Sized> ValueCalculator for Box<C> {
    fn calc_value(&self, avg_latency: f64) -> f64 {
        (**self).calc_value(avg_latency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear() {
        assert_eq!(LinearCalculator.calc_value(4.0), 0.25);
        assert!(LinearCalculator.calc_value(10.0) > LinearCalculator.calc_value(100.0));
    }

    #[test]
    fn test_logarithmic() {
        assert_eq!(LogarithmicCalculator.calc_value(1.0), 0.0);
        let v = LogarithmicCalculator.calc_value(0.5);
        assert!((v - 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_polynomial() {
        let calc = PolynomialCalculator::new(2.0);
        assert_eq!(calc.calc_value(2.0), 0.25);
        assert_eq!(calc.calc_value(10.0), LinearCalculator.calc_value(10.0).powf(2.0));
    }

    #[test]
    fn test_boxed_calculator() {
        let calc: Box<dyn ValueCalculator> = Box::new(LinearCalculator);
        assert_eq!(calc.calc_value(2.0), 0.5);
    }
}
