//! Classifier Contracts

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use window_data::{DataWindow, LabeledWindow, SizedIterable};

use crate::{EvalError, Result};

/// One candidate label value with its confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedValue {
    pub value: String,
    pub confidence: f64,
}

/// Result of classifying one window for one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Label the value belongs to
    pub label_name: String,
    /// Most likely value
    pub label_value: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// All candidate values, most likely first (may be empty)
    pub ranked: Vec<RankedValue>,
}

impl Classification {
    /// Create a classification without a ranked list
    pub fn new(label_name: &str, label_value: &str, confidence: f64) -> Self {
        Self {
            label_name: label_name.to_string(),
            label_value: label_value.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            ranked: Vec::new(),
        }
    }

    /// Attach the ranked candidates
    pub fn with_ranked(mut self, ranked: Vec<RankedValue>) -> Self {
        self.ranked = ranked;
        self
    }
}

/// A trained model that only classifies.
///
/// `classify` is called concurrently from evaluation workers and must be
/// thread-safe.
pub trait FixedClassifier: Send + Sync {
    /// Classify a window, keyed by label name
    fn classify(&self, window: &DataWindow) -> Result<HashMap<String, Classification>>;

    /// Label the model was trained on, if trained
    fn trained_label(&self) -> Option<&str>;
}

/// A model that can be (re)trained
pub trait TrainableClassifier: FixedClassifier {
    /// Reset state and train on `data` for `label`
    fn train(&mut self, label: &str, data: &dyn SizedIterable<LabeledWindow>) -> Result<()>;

    /// Refine the trained model with more data
    fn update(&mut self, _data: &dyn SizedIterable<LabeledWindow>) -> Result<()> {
        Err(EvalError::Unsupported("incremental update".to_string()))
    }
}
