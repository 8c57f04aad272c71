//! Binary (one label vs the rest) Confusion Matrix

use serde::{Deserialize, Serialize};

/// Counts of a one-vs-rest decomposition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl BinaryConfusionMatrix {
    pub fn new(true_positives: usize, false_positives: usize, false_negatives: usize, true_negatives: usize) -> Self {
        Self {
            true_positives,
            false_positives,
            false_negatives,
            true_negatives,
        }
    }

    /// Samples whose real value is the label
    pub fn positives(&self) -> usize {
        self.true_positives + self.false_negatives
    }

    /// Samples whose real value is another label
    pub fn negatives(&self) -> usize {
        self.true_negatives + self.false_positives
    }

    pub fn total(&self) -> usize {
        self.positives() + self.negatives()
    }

    /// tp / (tp + fp), 0 when nothing was predicted positive
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// tp / (tp + fn), 0 when there are no positives
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.positives())
    }

    /// (tp + tn) / total
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    /// F-beta score, 0 when precision and recall are both 0
    pub fn f_score(&self, beta: f64) -> f64 {
        let p = self.precision();
        let r = self.recall();
        let b2 = beta * beta;
        let den = b2 * p + r;
        if den == 0.0 {
            0.0
        } else {
            (1.0 + b2) * p * r / den
        }
    }

    pub fn f1_score(&self) -> f64 {
        self.f_score(1.0)
    }

    /// Mean of recall and true negative rate
    pub fn balanced_accuracy(&self) -> f64 {
        (self.recall() + self.true_negative_rate()) / 2.0
    }

    pub fn false_negative_rate(&self) -> f64 {
        ratio(self.false_negatives, self.positives())
    }

    pub fn false_positive_rate(&self) -> f64 {
        ratio(self.false_positives, self.negatives())
    }

    /// Specificity
    pub fn true_negative_rate(&self) -> f64 {
        ratio(self.true_negatives, self.negatives())
    }

    pub fn negative_predictive_value(&self) -> f64 {
        ratio(self.true_negatives, self.true_negatives + self.false_negatives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let m = BinaryConfusionMatrix::new(8, 2, 4, 6);
        assert!((m.precision() - 0.8).abs() < 1e-9);
        assert!((m.recall() - 8.0 / 12.0).abs() < 1e-9);
        assert!((m.accuracy() - 0.7).abs() < 1e-9);
        assert!((m.true_negative_rate() - 0.75).abs() < 1e-9);
        assert!((m.false_positive_rate() - 0.25).abs() < 1e-9);
        assert!((m.negative_predictive_value() - 0.6).abs() < 1e-9);
        assert_eq!(m.positives(), 12);
        assert_eq!(m.negatives(), 8);
    }

    #[test]
    fn test_f_score() {
        let m = BinaryConfusionMatrix::new(8, 2, 4, 6);
        let p = 0.8;
        let r = 8.0 / 12.0;
        assert!((m.f1_score() - 2.0 * p * r / (p + r)).abs() < 1e-9);
        // beta > 1 weights recall
        assert!(m.f_score(2.0) < m.f1_score());
    }

    #[test]
    fn test_zero_divisors() {
        let m = BinaryConfusionMatrix::new(0, 0, 0, 5);
        assert_eq!(m.precision(), 0.0);
        assert_eq!(m.recall(), 0.0);
        assert_eq!(m.f1_score(), 0.0);
        assert_eq!(m.accuracy(), 1.0);
        assert_eq!(BinaryConfusionMatrix::default().accuracy(), 0.0);
    }
}
