//! Features and Feature Grams

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use window_data::Labels;

/// Feature vector computed over one sub-window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Sub-window start, relative to the window start (milliseconds)
    pub start_msec: f64,
    /// Sub-window duration (milliseconds)
    pub duration_msec: f64,
    /// Feature values
    pub data: Vec<f64>,
}

impl Feature {
    /// Create a new feature
    pub fn new(start_msec: f64, duration_msec: f64, data: Vec<f64>) -> Self {
        Self {
            start_msec,
            duration_msec,
            data,
        }
    }
}

/// Ordered features of one window under one descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureGram {
    features: Vec<Feature>,
}

impl FeatureGram {
    /// Create a feature gram
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Get the features
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the gram holds no features
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Length of the feature vectors (0 when empty)
    pub fn dimension(&self) -> usize {
        self.features.first().map(|f| f.data.len()).unwrap_or(0)
    }
}

/// A feature gram carrying the labels of its source window
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledFeatureGram {
    labels: Arc<Labels>,
    gram: Arc<FeatureGram>,
}

impl LabeledFeatureGram {
    /// Create a new labeled feature gram
    pub fn new(labels: Arc<Labels>, gram: Arc<FeatureGram>) -> Self {
        Self { labels, gram }
    }

    /// Get the labels
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Value of one label
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Get the feature gram
    pub fn gram(&self) -> &FeatureGram {
        &self.gram
    }
}
