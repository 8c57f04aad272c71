//! Feature Extractor Contract and Descriptors

use std::fmt;
use std::sync::Arc;
use window_data::DataWindow;

use crate::feature::{Feature, FeatureGram};
use crate::processor::FeatureProcessor;

/// Computes one feature vector from a run of samples.
///
/// Implementations must be pure: the same samples and configuration always
/// give the same output, which is what makes cached results reusable.
pub trait FeatureExtractor: Send + Sync {
    /// Text identifying the extractor and its configuration
    fn cache_key(&self) -> String;

    /// Compute the feature vector
    fn extract(&self, samples: &[f64], sampling_rate: f64) -> Vec<f64>;
}

/// How one feature gram is produced from a window
#[derive(Clone)]
pub struct FeatureGramDescriptor {
    /// Per sub-window extractor
    extractor: Arc<dyn FeatureExtractor>,
    /// Optional post-processing of the whole gram
    processor: Option<Arc<dyn FeatureProcessor>>,
    /// Sub-window size, 0 for the whole window (milliseconds)
    window_size_msec: f64,
    /// Sub-window shift, 0 for no overlap (milliseconds)
    window_shift_msec: f64,
}

impl fmt::Debug for FeatureGramDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureGramDescriptor")
            .field("key", &self.cache_key())
            .finish()
    }
}

impl FeatureGramDescriptor {
    /// Create a descriptor without a processor
    pub fn new(extractor: Arc<dyn FeatureExtractor>, window_size_msec: f64, window_shift_msec: f64) -> Self {
        Self {
            extractor,
            processor: None,
            window_size_msec: window_size_msec.max(0.0),
            window_shift_msec: window_shift_msec.max(0.0),
        }
    }

    /// Add a processor applied to each extracted gram
    pub fn with_processor(mut self, processor: Arc<dyn FeatureProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Whether a processor is attached
    pub fn has_processor(&self) -> bool {
        self.processor.is_some()
    }

    /// Key of the unprocessed features (extractor and sub-windowing)
    pub fn extractor_key(&self) -> String {
        format!(
            "{}@{}/{}",
            self.extractor.cache_key(),
            self.window_size_msec,
            self.window_shift_msec
        )
    }

    /// Key of the final feature gram
    pub fn cache_key(&self) -> String {
        match &self.processor {
            Some(p) => format!("{}+{}", self.extractor_key(), p.cache_key()),
            None => self.extractor_key(),
        }
    }

    /// Run the extractor over each sub-window
    pub fn extract_features(&self, window: &DataWindow) -> Vec<Feature> {
        let rate = window.sampling_rate();
        let duration = window.duration_msec();

        if self.window_size_msec <= 0.0 {
            return vec![Feature::new(0.0, duration, self.extractor.extract(window.samples(), rate))];
        }

        let size = self.window_size_msec;
        let shift = if self.window_shift_msec > 0.0 { self.window_shift_msec } else { size };
        // tolerate rounding in the duration computation
        let limit = duration + 1e-6;

        let mut features = Vec::new();
        let mut offset = 0.0;
        while offset + size <= limit {
            let samples = window.sample_range(offset, size);
            if !samples.is_empty() {
                features.push(Feature::new(offset, size, self.extractor.extract(samples, rate)));
            }
            offset += shift;
        }
        features
    }

    /// Apply the processor, if any
    pub fn process(&self, features: Vec<Feature>) -> FeatureGram {
        match &self.processor {
            Some(p) => FeatureGram::new(p.apply(features)),
            None => FeatureGram::new(features),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SumExtractor;

    impl FeatureExtractor for SumExtractor {
        fn cache_key(&self) -> String {
            "sum".to_string()
        }

        fn extract(&self, samples: &[f64], _sampling_rate: f64) -> Vec<f64> {
            vec![samples.iter().sum()]
        }
    }

    fn window() -> DataWindow {
        // 10 samples at 1kHz = 10 msec
        DataWindow::new((1..=10).map(|v| v as f64).collect(), 1000.0)
    }

    #[test]
    fn test_whole_window() {
        let d = FeatureGramDescriptor::new(Arc::new(SumExtractor), 0.0, 0.0);
        let features = d.extract_features(&window());
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].data, vec![55.0]);
    }

    #[test]
    fn test_sub_windows_without_overlap() {
        let d = FeatureGramDescriptor::new(Arc::new(SumExtractor), 5.0, 0.0);
        let features = d.extract_features(&window());
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].data, vec![15.0]);
        assert_eq!(features[1].data, vec![40.0]);
        assert!((features[1].start_msec - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_sub_windows_with_overlap() {
        let d = FeatureGramDescriptor::new(Arc::new(SumExtractor), 4.0, 2.0);
        let features = d.extract_features(&window());
        // offsets 0, 2, 4, 6
        assert_eq!(features.len(), 4);
    }

    #[test]
    fn test_sub_window_longer_than_window() {
        let d = FeatureGramDescriptor::new(Arc::new(SumExtractor), 50.0, 0.0);
        assert!(d.extract_features(&window()).is_empty());
    }

    #[test]
    fn test_cache_keys_differ_by_configuration() {
        let a = FeatureGramDescriptor::new(Arc::new(SumExtractor), 5.0, 0.0);
        let b = FeatureGramDescriptor::new(Arc::new(SumExtractor), 5.0, 2.5);
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), a.extractor_key());
    }
}
