//! Feature Gram Processors

use sample_stats::OnlineStats;

use crate::feature::Feature;

/// Transforms the full feature list of one gram
pub trait FeatureProcessor: Send + Sync {
    /// Text identifying the processor and its configuration
    fn cache_key(&self) -> String;

    /// Produce the processed features
    fn apply(&self, features: Vec<Feature>) -> Vec<Feature>;
}

/// Z-score normalization of each feature dimension across the gram
#[derive(Debug, Clone, Copy, Default)]
pub struct ZScoreProcessor;

impl FeatureProcessor for ZScoreProcessor {
    fn cache_key(&self) -> String {
        "zscore".to_string()
    }

    fn apply(&self, mut features: Vec<Feature>) -> Vec<Feature> {
        let dims = features.iter().map(|f| f.data.len()).min().unwrap_or(0);
        for d in 0..dims {
            let stats = OnlineStats::from_samples(&features.iter().map(|f| f.data[d]).collect::<Vec<_>>());
            let std_dev = stats.std_dev().max(0.0001);
            for f in features.iter_mut() {
                f.data[d] = (f.data[d] - stats.mean()) / std_dev;
            }
        }
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zscore_centers_each_dimension() {
        let features = vec![
            Feature::new(0.0, 1.0, vec![1.0, 10.0]),
            Feature::new(1.0, 1.0, vec![3.0, 10.0]),
        ];
        let out = ZScoreProcessor.apply(features);
        assert!((out[0].data[0] + 1.0).abs() < 0.001);
        assert!((out[1].data[0] - 1.0).abs() < 0.001);
        // constant dimension maps to 0
        assert!(out[0].data[1].abs() < 0.001);
    }

    #[test]
    fn test_zscore_empty() {
        assert!(ZScoreProcessor.apply(Vec::new()).is_empty());
    }
}
