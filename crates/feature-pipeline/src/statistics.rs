//! Statistical Feature Extraction

use crate::extractor::FeatureExtractor;

/// Statistical summary of a run of samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticalFeatures {
    /// Mean value
    pub mean: f64,
    /// Standard deviation
    pub std_dev: f64,
    /// Skewness (asymmetry)
    pub skewness: f64,
    /// Kurtosis (tailedness)
    pub kurtosis: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Mean absolute change between consecutive samples
    pub rate_of_change: f64,
}

impl StatisticalFeatures {
    /// Number of values in [`StatisticalFeatures::to_vec`]
    pub const DIMENSION: usize = 7;

    /// Compute statistical features from a slice of values
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        let max = values.iter().cloned().fold(f64::MIN, f64::max);

        let mut m2 = 0.0;
        let mut m3 = 0.0;
        let mut m4 = 0.0;
        for &v in values {
            let d = v - mean;
            m2 += d * d;
            m3 += d * d * d;
            m4 += d * d * d * d;
        }

        let variance = m2 / n;
        let std_dev = variance.sqrt();

        // E[(X-μ)³] / σ³
        let skewness = if std_dev > 0.0 {
            (m3 / n) / (std_dev * std_dev * std_dev)
        } else {
            0.0
        };

        // excess kurtosis
        let kurtosis = if std_dev > 0.0 {
            (m4 / n) / (variance * variance) - 3.0
        } else {
            0.0
        };

        let rate_of_change = if values.len() >= 2 {
            values.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>() / (values.len() - 1) as f64
        } else {
            0.0
        };

        Self {
            mean,
            std_dev,
            skewness,
            kurtosis,
            min,
            max,
            rate_of_change,
        }
    }

    /// Flatten into a feature vector
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.mean,
            self.std_dev,
            self.skewness,
            self.kurtosis,
            self.min,
            self.max,
            self.rate_of_change,
        ]
    }
}

/// Extractor producing [`StatisticalFeatures`] per sub-window
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticsExtractor;

impl FeatureExtractor for StatisticsExtractor {
    fn cache_key(&self) -> String {
        "stats".to_string()
    }

    fn extract(&self, samples: &[f64], _sampling_rate: f64) -> Vec<f64> {
        StatisticalFeatures::compute(samples).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_computation() {
        let stats = StatisticalFeatures::compute(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!((stats.mean - 3.0).abs() < 0.001);
        assert!((stats.rate_of_change - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_std_dev_computation() {
        let stats = StatisticalFeatures::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((stats.std_dev - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_empty_values() {
        let stats = StatisticalFeatures::compute(&[]);
        assert_eq!(stats.mean, 0.0);
    }

    #[test]
    fn test_extractor_dimension() {
        let v = StatisticsExtractor.extract(&[1.0, 2.0], 100.0);
        assert_eq!(v.len(), StatisticalFeatures::DIMENSION);
    }
}
