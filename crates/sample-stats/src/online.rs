//! Online (streaming) Statistics

use serde::{Deserialize, Serialize};

/// Running mean, variance and range over a stream of samples.
///
/// Two instances can be merged with [`OnlineStats::combine`] without access to
/// the original samples, which is how per-fold evaluation scores are pooled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineStats {
    /// Running mean
    mean: f64,
    /// Sum of squared deviations from the running mean
    m2: f64,
    /// Number of accepted samples
    count: u64,
    /// Smallest sample seen
    min: f64,
    /// Largest sample seen
    max: f64,
}

impl Default for OnlineStats {
    fn default() -> Self {
        Self::new()
    }
}

impl OnlineStats {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self {
            mean: f64::NAN,
            m2: f64::NAN,
            count: 0,
            min: f64::MAX,
            max: -f64::MAX,
        }
    }

    /// Create an accumulator holding the given samples
    pub fn from_samples(values: &[f64]) -> Self {
        let mut stats = Self::new();
        for &v in values {
            stats.add_sample(v);
        }
        stats
    }

    /// Add a single sample. NaN and infinite values are ignored.
    pub fn add_sample(&mut self, value: f64) {
        self.add_samples(value, 1);
    }

    /// Add the same value `n` times. NaN and infinite values are ignored.
    pub fn add_samples(&mut self, value: f64, n: u64) {
        if !value.is_finite() || n == 0 {
            return;
        }
        let run = OnlineStats {
            mean: value,
            m2: 0.0,
            count: n,
            min: value,
            max: value,
        };
        *self = self.combine(&run);
    }

    /// Merge two accumulators into a new one. Neither input is modified.
    pub fn combine(&self, other: &OnlineStats) -> OnlineStats {
        if self.count == 0 {
            return other.clone();
        }
        if other.count == 0 {
            return self.clone();
        }

        // Welford update generalized to two partial runs (Chan et al.)
        let c1 = self.count as f64;
        let c2 = other.count as f64;
        let total = c1 + c2;
        let delta = other.mean - self.mean;

        OnlineStats {
            mean: self.mean + delta * c2 / total,
            m2: self.m2 + other.m2 + delta * delta * c1 * c2 / total,
            count: self.count + other.count,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Get the mean, NaN when empty
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Get the population variance, NaN when empty
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.m2 / self.count as f64
    }

    /// Get the standard deviation, NaN when empty
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Get the smallest sample (`f64::MAX` when empty)
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Get the largest sample (`-f64::MAX` when empty)
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Get the number of accepted samples
    pub fn sample_count(&self) -> u64 {
        self.count
    }

    /// Reset to the empty state
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
