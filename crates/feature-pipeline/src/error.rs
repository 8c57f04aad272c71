//! Feature Extraction Error Types

use thiserror::Error;
use window_data::DataError;

/// Errors during feature extraction and caching
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// No window produced any feature grams
    #[error("Feature gram extractor(s) failed to produce any feature gram arrays. Did you specify the correct training label?")]
    NoFeatureArrays,
    /// The first window produced an empty array of feature grams
    #[error("Feature extractor(s) failed to produce any feature grams")]
    NoFeatureGrams,
    /// A feature gram in the first array holds no features
    #[error("Featuregram[{index}] in the first array of feature grams contains zero features.")]
    EmptyFeatureGram { index: usize },
    /// Cache storage failure
    #[error("Feature cache error: {0}")]
    Cache(String),
    /// Underlying data error
    #[error(transparent)]
    Data(#[from] DataError),
}

impl From<std::io::Error> for FeatureError {
    fn from(e: std::io::Error) -> Self {
        FeatureError::Cache(e.to_string())
    }
}

impl From<postcard::Error> for FeatureError {
    fn from(e: postcard::Error) -> Self {
        FeatureError::Cache(format!("Encoding error: {}", e))
    }
}
