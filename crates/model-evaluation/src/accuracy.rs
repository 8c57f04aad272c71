//! Combinable Accuracy Statistics

use sample_stats::OnlineStats;
use serde::{Deserialize, Serialize};

/// Running accuracy, precision, recall and F1 statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyStats {
    pub accuracy: OnlineStats,
    pub precision: OnlineStats,
    pub recall: OnlineStats,
    pub f1: OnlineStats,
}

impl Default for AccuracyStats {
    fn default() -> Self {
        Self {
            accuracy: OnlineStats::new(),
            precision: OnlineStats::new(),
            recall: OnlineStats::new(),
            f1: OnlineStats::new(),
        }
    }
}

impl AccuracyStats {
    /// Stats holding a single sample of each metric
    pub fn from_sample(accuracy: f64, precision: f64, recall: f64, f1: f64) -> Self {
        Self {
            accuracy: OnlineStats::from_samples(&[accuracy]),
            precision: OnlineStats::from_samples(&[precision]),
            recall: OnlineStats::from_samples(&[recall]),
            f1: OnlineStats::from_samples(&[f1]),
        }
    }

    /// Merge two sets of statistics without modifying either
    pub fn combine(&self, other: &AccuracyStats) -> AccuracyStats {
        Self {
            accuracy: self.accuracy.combine(&other.accuracy),
            precision: self.precision.combine(&other.precision),
            recall: self.recall.combine(&other.recall),
            f1: self.f1.combine(&other.f1),
        }
    }
}
