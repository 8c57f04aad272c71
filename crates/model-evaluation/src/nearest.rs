//! Nearest Label-mean Classifier

use feature_pipeline::{
    check_feature_grams, CachingFeaturePipeline, FeatureGram, FeatureGramDescriptor, LabeledFeatureIterable,
    StatisticsExtractor,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};
use window_data::{DataWindow, LabeledWindow, SizedIterable};

use crate::classifier::{Classification, FixedClassifier, RankedValue, TrainableClassifier};
use crate::{EvalError, Result};

/// Running sum of the feature vectors of one label value
#[derive(Debug, Clone)]
struct Centroid {
    sum: Vec<f64>,
    count: usize,
}

impl Centroid {
    fn mean(&self) -> impl Iterator<Item = f64> + '_ {
        let n = self.count as f64;
        self.sum.iter().map(move |s| s / n)
    }
}

/// Classifies a window as the label value whose mean feature vector is
/// closest (L1 distance).
///
/// Each descriptor's gram is reduced to the mean of its features and the
/// reductions are concatenated into one vector per window.
pub struct NearestMeanClassifier {
    descriptors: Vec<FeatureGramDescriptor>,
    pipeline: Arc<CachingFeaturePipeline>,
    label: Option<String>,
    centroids: BTreeMap<String, Centroid>,
}

impl NearestMeanClassifier {
    /// Create an untrained classifier
    pub fn new(descriptors: Vec<FeatureGramDescriptor>, pipeline: Arc<CachingFeaturePipeline>) -> Self {
        Self {
            descriptors,
            pipeline,
            label: None,
            centroids: BTreeMap::new(),
        }
    }

    /// Statistical features over sub-windows of `window_size_msec`
    pub fn with_statistics(window_size_msec: f64, pipeline: Arc<CachingFeaturePipeline>) -> Self {
        let descriptor = FeatureGramDescriptor::new(Arc::new(StatisticsExtractor), window_size_msec, 0.0);
        Self::new(vec![descriptor], pipeline)
    }

    /// Label values known to the model
    pub fn label_values(&self) -> Vec<&str> {
        self.centroids.keys().map(String::as_str).collect()
    }

    fn accumulate(&mut self, label: &str, data: &dyn SizedIterable<LabeledWindow>) -> Result<()> {
        let mut features = LabeledFeatureIterable::new(data, self.descriptors.clone(), Arc::clone(&self.pipeline))
            .with_label_filter(label);
        check_feature_grams(&features)?;

        let mut added = 0;
        for grams in features.items() {
            let Some(value) = grams.first().and_then(|g| g.label(label)).map(str::to_string) else {
                continue;
            };
            let vector = feature_vector(grams.iter().map(|g| g.gram()));
            let centroid = self.centroids.entry(value).or_insert_with(|| Centroid {
                sum: vec![0.0; vector.len()],
                count: 0,
            });
            if centroid.sum.len() != vector.len() {
                return Err(EvalError::Classifier(format!(
                    "Feature vector length changed from {} to {}",
                    centroid.sum.len(),
                    vector.len()
                )));
            }
            for (s, v) in centroid.sum.iter_mut().zip(&vector) {
                *s += v;
            }
            centroid.count += 1;
            added += 1;
        }
        features.clear_cached_items();

        debug!("Accumulated {} windows for label {}", added, label);
        Ok(())
    }
}

/// Concatenated per-gram mean feature vectors
fn feature_vector<'a>(grams: impl Iterator<Item = &'a FeatureGram>) -> Vec<f64> {
    let mut vector = Vec::new();
    for gram in grams {
        let dims = gram.dimension();
        let mut mean = vec![0.0; dims];
        for feature in gram.features() {
            for (m, v) in mean.iter_mut().zip(&feature.data) {
                *m += v;
            }
        }
        let n = gram.len().max(1) as f64;
        vector.extend(mean.into_iter().map(|m| m / n));
    }
    vector
}

impl FixedClassifier for NearestMeanClassifier {
    fn classify(&self, window: &DataWindow) -> Result<HashMap<String, Classification>> {
        let label = self
            .label
            .as_deref()
            .ok_or_else(|| EvalError::Classifier("Model has not been trained".to_string()))?;

        let grams = self.pipeline.feature_grams(window, &self.descriptors);
        let vector = feature_vector(grams.iter().map(|g| &**g));

        let mut distances: Vec<(&str, f64)> = self
            .centroids
            .iter()
            .map(|(value, centroid)| {
                let d: f64 = centroid.mean().zip(&vector).map(|(m, v)| (m - v).abs()).sum();
                (value.as_str(), d)
            })
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));

        // inverse-distance weights, an exact match takes all the confidence
        let weights: Vec<f64> = distances.iter().map(|(_, d)| 1.0 / (d + 1e-12)).collect();
        let total: f64 = weights.iter().sum();
        let ranked: Vec<RankedValue> = distances
            .iter()
            .zip(&weights)
            .map(|((value, _), w)| RankedValue {
                value: value.to_string(),
                confidence: w / total,
            })
            .collect();

        let best = ranked
            .first()
            .ok_or_else(|| EvalError::Classifier("Model has no label values".to_string()))?;
        let classification = Classification::new(label, &best.value, best.confidence).with_ranked(ranked.clone());
        Ok(HashMap::from([(label.to_string(), classification)]))
    }

    fn trained_label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl TrainableClassifier for NearestMeanClassifier {
    fn train(&mut self, label: &str, data: &dyn SizedIterable<LabeledWindow>) -> Result<()> {
        self.centroids.clear();
        self.label = None;
        self.accumulate(label, data)?;
        self.label = Some(label.to_string());
        info!(
            "Trained nearest-mean model on label {} with {} values",
            label,
            self.centroids.len()
        );
        Ok(())
    }

    fn update(&mut self, data: &dyn SizedIterable<LabeledWindow>) -> Result<()> {
        let label = self
            .label
            .clone()
            .ok_or_else(|| EvalError::Classifier("Model has not been trained".to_string()))?;
        self.accumulate(&label, data)
    }
}
