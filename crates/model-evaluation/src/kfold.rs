//! K-fold Model Evaluation

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use window_data::{
    BalancePolicy, LabelBalancer, Labeled, LabeledWindow, Partition, Partitioner, ReferenceIterable,
    ShuffleIterable, SizedIterable, TrainingSetInfo,
};

use crate::classifier::TrainableClassifier;
use crate::confusion::ConfusionMatrix;
use crate::{EvalError, Result};

/// Called with each fold's (training, test) data before training; returning
/// false skips the fold
pub type PartitionListener<'a> =
    dyn FnMut(&dyn SizedIterable<LabeledWindow>, &dyn SizedIterable<LabeledWindow>) -> bool + 'a;

/// K-fold evaluation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Number of partitions (> 1)
    pub fold_count: usize,
    /// Seed of the pre-shuffle
    pub seed: u64,
    /// Shuffle the data before partitioning
    pub pre_shuffle: bool,
    /// Classify test data on all cores
    pub parallel: bool,
    /// Log dataset summaries and per-fold results
    pub verbose: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            fold_count: 3,
            seed: 123_345_123,
            pre_shuffle: true,
            parallel: false,
            verbose: false,
        }
    }
}

impl EvaluatorConfig {
    /// Fast estimate: 3 folds evaluated in parallel
    pub fn quick() -> Self {
        Self {
            parallel: true,
            ..Default::default()
        }
    }

    /// 10 folds with verbose logging
    pub fn thorough() -> Self {
        Self {
            fold_count: 10,
            verbose: true,
            ..Default::default()
        }
    }
}

/// Cross-validates a trainable classifier on labeled windows
pub struct KFoldModelEvaluator {
    config: EvaluatorConfig,
    /// Whether the in-memory pre-shuffle was already reported
    warned: AtomicBool,
}

impl KFoldModelEvaluator {
    /// Create a new evaluator
    pub fn new(config: EvaluatorConfig) -> Result<Self> {
        if config.fold_count <= 1 {
            return Err(EvalError::invalid(format!(
                "Fold count must be larger than 1 (got {})",
                config.fold_count
            )));
        }
        info!("Creating K-fold evaluator with config: {:?}", config);
        Ok(Self {
            config,
            warned: AtomicBool::new(false),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Train and evaluate `folds_to_evaluate` folds, merging their matrices.
    ///
    /// With `balanced_training_count > 0` every training set is leveled to
    /// that many items per label value for each training partition it holds.
    /// Test partitions are never balanced.
    pub fn confusion_matrix(
        &self,
        classifier: &mut dyn TrainableClassifier,
        data: &dyn SizedIterable<LabeledWindow>,
        label: &str,
        folds_to_evaluate: usize,
        balanced_training_count: usize,
    ) -> Result<ConfusionMatrix> {
        self.confusion_matrix_with_listener(
            classifier,
            data,
            label,
            folds_to_evaluate,
            balanced_training_count,
            None,
        )
    }

    /// Same as [`KFoldModelEvaluator::confusion_matrix`], letting `listener`
    /// inspect or skip each fold
    pub fn confusion_matrix_with_listener(
        &self,
        classifier: &mut dyn TrainableClassifier,
        data: &dyn SizedIterable<LabeledWindow>,
        label: &str,
        folds_to_evaluate: usize,
        balanced_training_count: usize,
        mut listener: Option<&mut PartitionListener<'_>>,
    ) -> Result<ConfusionMatrix> {
        let fold_count = self.config.fold_count;
        if folds_to_evaluate < 1 || folds_to_evaluate > fold_count {
            return Err(EvalError::invalid(format!(
                "foldsToEvaluate must range from 1 to fold count ({}), got {}",
                fold_count, folds_to_evaluate
            )));
        }

        let shuffled = if self.config.pre_shuffle {
            Some(self.shuffled(data, label))
        } else {
            None
        };
        let source: &dyn SizedIterable<LabeledWindow> = match &shuffled {
            Some(shuffled) => shuffled,
            None => data,
        };

        let partitions = Partitioner::partition(source, label, fold_count)?;
        if self.config.verbose {
            for (i, partition) in partitions.iter().enumerate() {
                info!("Partition {}:\n{}", i, TrainingSetInfo::scan(partition.items()).pretty_format());
            }
        }

        let balancer = (balanced_training_count > 0).then(|| {
            LabelBalancer::new(
                label,
                BalancePolicy::Count(balanced_training_count * (fold_count - 1)),
            )
        });

        let mut merged: Option<ConfusionMatrix> = None;
        for fold in 0..folds_to_evaluate {
            let others: Vec<&Partition<LabeledWindow>> = partitions
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold)
                .map(|(_, p)| p)
                .collect();
            let mut training = Partition::merge(&others);
            if let Some(balancer) = &balancer {
                training = Partition::References(balancer.balance(&training)?);
            }
            let test = &partitions[fold];

            if let Some(listener) = listener.as_deref_mut() {
                if !listener(&training, test) {
                    debug!("Fold {} skipped by partition listener", fold);
                    continue;
                }
            }

            if self.config.verbose {
                info!(
                    "Fold {} training data:\n{}",
                    fold,
                    TrainingSetInfo::scan(training.items()).pretty_format()
                );
                info!("Fold {} test data:\n{}", fold, TrainingSetInfo::scan(test.items()).pretty_format());
            }

            let started = Instant::now();
            classifier.train(label, &training).map_err(|e| match e {
                EvalError::Feature(source) => EvalError::FeatureExtraction { fold, source },
                other => other,
            })?;
            let trained_msec = started.elapsed().as_secs_f64() * 1000.0;

            let matrix = ConfusionMatrix::compute(label, &*classifier, test, self.config.parallel)?;
            if self.config.verbose {
                info!(
                    "Fold {}: trained in {} hr:min:sec, accuracy {:.3}%",
                    fold,
                    sample_stats::format_msec(trained_msec),
                    100.0 * matrix.accuracy()
                );
            } else {
                debug!("Fold {} accuracy {:.3}", fold, matrix.accuracy());
            }

            merged = Some(match merged {
                Some(acc) => acc.add(&matrix)?,
                None => matrix,
            });
        }

        merged.ok_or(EvalError::NoFoldsEvaluated)
    }

    /// Seeded shuffle of `data`, collecting sources without references
    fn shuffled(&self, data: &dyn SizedIterable<LabeledWindow>, label: &str) -> Arc<dyn ShuffleIterable<LabeledWindow>> {
        if let Some(shuffle) = data.as_shuffle() {
            return shuffle.shuffle(self.config.seed);
        }
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!("Shuffling data without references requires holding all of it in memory");
        }
        let items: Vec<LabeledWindow> = data.items().filter(|w| w.label(label).is_some()).collect();
        ReferenceIterable::from_items(items).into_shared().shuffle(self.config.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classification, FixedClassifier};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use window_data::DataWindow;

    /// Predicts "high" for positive first samples, records training sizes
    #[derive(Default)]
    struct ThresholdClassifier {
        label: Option<String>,
        trained_sizes: Vec<usize>,
        fail_training: bool,
    }

    impl FixedClassifier for ThresholdClassifier {
        fn classify(&self, window: &DataWindow) -> Result<HashMap<String, Classification>> {
            let label = self.label.clone().unwrap_or_default();
            let value = if window.samples()[0] > 0.0 { "high" } else { "low" };
            Ok(HashMap::from([(label.clone(), Classification::new(&label, value, 1.0))]))
        }

        fn trained_label(&self) -> Option<&str> {
            self.label.as_deref()
        }
    }

    impl TrainableClassifier for ThresholdClassifier {
        fn train(&mut self, label: &str, data: &dyn SizedIterable<LabeledWindow>) -> Result<()> {
            if self.fail_training {
                return Err(EvalError::Classifier("training failed".to_string()));
            }
            self.label = Some(label.to_string());
            self.trained_sizes.push(data.items().count());
            Ok(())
        }
    }

    fn data(high: usize, low: usize) -> Vec<LabeledWindow> {
        let highs = (0..high).map(|i| LabeledWindow::with_label(DataWindow::new(vec![1.0 + i as f64], 10.0), "level", "high"));
        let lows = (0..low).map(|i| LabeledWindow::with_label(DataWindow::new(vec![-1.0 - i as f64], 10.0), "level", "low"));
        highs.chain(lows).collect()
    }

    #[test]
    fn test_full_five_fold() {
        let source = ReferenceIterable::from_items(data(5, 7));
        let evaluator = KFoldModelEvaluator::new(EvaluatorConfig {
            fold_count: 5,
            ..Default::default()
        })
        .unwrap();
        let mut classifier = ThresholdClassifier::default();

        let matrix = evaluator.confusion_matrix(&mut classifier, &source, "level", 5, 0).unwrap();
        assert_eq!(matrix.total_samples(), 12);
        assert_eq!(matrix.accuracy(), 1.0);
        assert_eq!(matrix.micro().accuracy.sample_count(), 5);
        assert_eq!(classifier.trained_sizes.len(), 5);
        // each training set is every partition but one
        assert!(classifier.trained_sizes.iter().all(|&n| n == 9 || n == 10));
    }

    #[test]
    fn test_partial_folds_without_references() {
        let source = data(6, 6);
        let evaluator = KFoldModelEvaluator::new(EvaluatorConfig::quick()).unwrap();
        let mut classifier = ThresholdClassifier::default();
        let matrix = evaluator.confusion_matrix(&mut classifier, &source, "level", 1, 0).unwrap();
        assert_eq!(matrix.total_samples(), 4);
        assert_eq!(classifier.trained_sizes, vec![8]);
    }

    #[test]
    fn test_balanced_training() {
        let source = ReferenceIterable::from_items(data(3, 9));
        let evaluator = KFoldModelEvaluator::new(EvaluatorConfig::default()).unwrap();
        let mut classifier = ThresholdClassifier::default();
        evaluator.confusion_matrix(&mut classifier, &source, "level", 3, 4).unwrap();
        // 4 per value per training partition, 2 training partitions, 2 values
        assert_eq!(classifier.trained_sizes, vec![16, 16, 16]);
    }

    #[test]
    fn test_folds_to_evaluate_validated_first() {
        let source = data(3, 3);
        let evaluator = KFoldModelEvaluator::new(EvaluatorConfig::default()).unwrap();
        let mut classifier = ThresholdClassifier::default();
        for folds in [0, 4] {
            let err = evaluator.confusion_matrix(&mut classifier, &source, "level", folds, 0).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("Invalid argument: foldsToEvaluate must range from 1 to fold count (3), got {}", folds)
            );
        }
        assert!(classifier.trained_sizes.is_empty());
    }

    #[test]
    fn test_invalid_fold_count() {
        let config = EvaluatorConfig {
            fold_count: 1,
            ..Default::default()
        };
        assert!(matches!(KFoldModelEvaluator::new(config), Err(EvalError::InvalidArgument(_))));
    }

    #[test]
    fn test_training_failure_propagates() {
        let source = data(3, 3);
        let evaluator = KFoldModelEvaluator::new(EvaluatorConfig::default()).unwrap();
        let mut classifier = ThresholdClassifier {
            fail_training: true,
            ..Default::default()
        };
        let err = evaluator.confusion_matrix(&mut classifier, &source, "level", 3, 0).unwrap_err();
        assert_eq!(err, EvalError::Classifier("training failed".to_string()));
    }

    #[test]
    fn test_listener_skips_folds() {
        let source = ReferenceIterable::from_items(data(4, 4));
        let evaluator = KFoldModelEvaluator::new(EvaluatorConfig::default()).unwrap();
        let mut classifier = ThresholdClassifier::default();

        let seen = Mutex::new(Vec::new());
        let mut skip_first = |training: &dyn SizedIterable<LabeledWindow>, test: &dyn SizedIterable<LabeledWindow>| {
            let mut seen = seen.lock().unwrap();
            seen.push((training.items().count(), test.items().count()));
            seen.len() > 1
        };
        let matrix = evaluator
            .confusion_matrix_with_listener(&mut classifier, &source, "level", 3, 0, Some(&mut skip_first))
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(classifier.trained_sizes.len(), 2);
        assert_eq!(matrix.micro().accuracy.sample_count(), 2);

        let mut skip_all = |_: &dyn SizedIterable<LabeledWindow>, _: &dyn SizedIterable<LabeledWindow>| false;
        let err = evaluator
            .confusion_matrix_with_listener(&mut classifier, &source, "level", 3, 0, Some(&mut skip_all))
            .unwrap_err();
        assert_eq!(err, EvalError::NoFoldsEvaluated);
    }

    #[test]
    fn test_same_seed_same_folds() {
        let source = ReferenceIterable::from_items(data(6, 6));
        let evaluator = KFoldModelEvaluator::new(EvaluatorConfig::default()).unwrap();
        let mut runs = Vec::new();
        for _ in 0..2 {
            let mut first_test = Vec::new();
            let mut record = |_: &dyn SizedIterable<LabeledWindow>, test: &dyn SizedIterable<LabeledWindow>| {
                if first_test.is_empty() {
                    first_test = test.items().map(|w| w.window().id()).collect();
                }
                true
            };
            let mut classifier = ThresholdClassifier::default();
            evaluator
                .confusion_matrix_with_listener(&mut classifier, &source, "level", 1, 0, Some(&mut record))
                .unwrap();
            runs.push(first_test);
        }
        assert_eq!(runs[0], runs[1]);
    }
}
