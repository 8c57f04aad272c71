//! Confusion Matrix and Evaluation Statistics

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::debug;
use window_data::{Labeled, LabeledWindow, SizedIterable};

use crate::accuracy::AccuracyStats;
use crate::binary::BinaryConfusionMatrix;
use crate::classifier::FixedClassifier;
use crate::{EvalError, Result};

/// real value -> predicted value -> count
pub type Counts = BTreeMap<String, BTreeMap<String, usize>>;

/// real value -> predicted value -> percent
pub type Percents = BTreeMap<String, BTreeMap<String, f64>>;

/// How counts are turned into percentages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Divide each cell by the grand total
    All,
    /// Divide each cell by its row (real value) total
    Recall,
}

impl FromStr for Normalization {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Normalization::All),
            "recall" => Ok(Normalization::Recall),
            other => Err(EvalError::invalid(format!(
                "Unknown normalization: {} (expected all or recall)",
                other
            ))),
        }
    }
}

/// Counts of real vs predicted label values, with micro and macro averaged
/// statistics.
///
/// Rows are real values and columns predicted values; every row/column cell
/// is present. Matrices are immutable, [`ConfusionMatrix::add`] builds a new
/// one whose statistics are combined from both inputs.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    label_name: String,
    counts: Counts,
    predicted: BTreeSet<String>,
    total: usize,
    micro: AccuracyStats,
    macro_stats: AccuracyStats,
    percent_all: OnceLock<Percents>,
    percent_recall: OnceLock<Percents>,
}

impl ConfusionMatrix {
    /// Build a matrix from parallel lists of real and predicted values
    pub fn new<S: AsRef<str>>(label_name: &str, real: &[S], predicted: &[S]) -> Result<Self> {
        if real.len() != predicted.len() {
            return Err(EvalError::invalid(format!(
                "Both label lists must be of the same length ({} vs {})",
                real.len(),
                predicted.len()
            )));
        }
        if real.is_empty() {
            return Err(EvalError::invalid("Label list cannot be empty"));
        }

        let columns: BTreeSet<String> = predicted.iter().map(|p| p.as_ref().to_string()).collect();
        let mut counts = Counts::new();
        for r in real {
            counts
                .entry(r.as_ref().to_string())
                .or_insert_with(|| columns.iter().map(|c| (c.clone(), 0)).collect());
        }
        for (r, p) in real.iter().zip(predicted) {
            if let Some(cell) = counts.get_mut(r.as_ref()).and_then(|row| row.get_mut(p.as_ref())) {
                *cell += 1;
            }
        }

        let mut matrix = Self::from_counts(label_name, counts, columns);
        matrix.micro = matrix.compute_micro();
        matrix.macro_stats = matrix.compute_macro();
        Ok(matrix)
    }

    fn from_counts(label_name: &str, counts: Counts, predicted: BTreeSet<String>) -> Self {
        let total = counts.values().flat_map(|row| row.values()).sum();
        Self {
            label_name: label_name.to_string(),
            counts,
            predicted,
            total,
            micro: AccuracyStats::default(),
            macro_stats: AccuracyStats::default(),
            percent_all: OnceLock::new(),
            percent_recall: OnceLock::new(),
        }
    }

    /// Classify every window carrying `label` and tabulate the results.
    ///
    /// Serial mode keeps the data order. Parallel mode spreads the windows
    /// over one worker per core sharing a single cursor.
    pub fn compute<C: FixedClassifier + ?Sized>(
        label: &str,
        classifier: &C,
        data: &dyn SizedIterable<LabeledWindow>,
        parallel: bool,
    ) -> Result<Self> {
        let outcome = if parallel {
            collect_parallel(label, classifier, data)?
        } else {
            collect_serial(label, classifier, data)?
        };

        if outcome.seen == 0 {
            return Err(EvalError::invalid("No data provided for evaluation."));
        }
        if outcome.real.is_empty() {
            return Err(EvalError::invalid(format!(
                "Found data, but none with the given label: {}",
                label
            )));
        }
        debug!(
            "Classified {} of {} windows for label {}",
            outcome.real.len(),
            outcome.seen,
            label
        );
        Self::new(label, &outcome.real, &outcome.predicted)
    }

    /// Merge with another matrix over the same label
    pub fn add(&self, other: &ConfusionMatrix) -> Result<ConfusionMatrix> {
        if self.label_name != other.label_name {
            return Err(EvalError::invalid(format!(
                "Matrices are defined on different labels: {} vs {}",
                self.label_name, other.label_name
            )));
        }

        let columns: BTreeSet<String> = self.predicted.union(&other.predicted).cloned().collect();
        let mut counts = Counts::new();
        for source in [&self.counts, &other.counts] {
            for (real, row) in source {
                let merged = counts
                    .entry(real.clone())
                    .or_insert_with(|| columns.iter().map(|c| (c.clone(), 0)).collect());
                for (predicted, n) in row {
                    *merged.entry(predicted.clone()).or_insert(0) += n;
                }
            }
        }

        let mut merged = Self::from_counts(&self.label_name, counts, columns);
        merged.micro = self.micro.combine(&other.micro);
        merged.macro_stats = self.macro_stats.combine(&other.macro_stats);
        Ok(merged)
    }

    /// Label the matrix was computed for
    pub fn label_name(&self) -> &str {
        &self.label_name
    }

    /// All counts, keyed by real then predicted value
    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    /// Count of one cell (0 when absent)
    pub fn count(&self, real: &str, predicted: &str) -> usize {
        self.counts
            .get(real)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    /// Sorted real values
    pub fn real_labels(&self) -> Vec<&str> {
        self.counts.keys().map(String::as_str).collect()
    }

    /// Sorted predicted values
    pub fn predicted_labels(&self) -> Vec<&str> {
        self.predicted.iter().map(String::as_str).collect()
    }

    /// Number of samples whose real value is `label`
    pub fn row_count(&self, label: &str) -> Result<usize> {
        self.counts
            .get(label)
            .map(|row| row.values().sum())
            .ok_or_else(|| EvalError::invalid(format!("Label {} not found in the matrix.", label)))
    }

    /// Number of samples predicted as `label`
    fn column_count(&self, label: &str) -> usize {
        self.counts.values().filter_map(|row| row.get(label)).sum()
    }

    /// Number of samples tabulated
    pub fn total_samples(&self) -> usize {
        self.total
    }

    /// One-vs-rest decomposition for `label`
    pub fn binary_matrix(&self, label: &str) -> Result<BinaryConfusionMatrix> {
        if !self.counts.contains_key(label) && !self.predicted.contains(label) {
            return Err(EvalError::invalid(format!("Label {} not found in the matrix.", label)));
        }
        let tp = self.count(label, label);
        let fp = self.column_count(label) - tp;
        let fn_ = self.row_count(label).unwrap_or(0) - tp;
        let tn = self.total - tp - fp - fn_;
        Ok(BinaryConfusionMatrix::new(tp, fp, fn_, tn))
    }

    pub fn precision(&self, label: &str) -> Result<f64> {
        Ok(self.binary_matrix(label)?.precision())
    }

    pub fn recall(&self, label: &str) -> Result<f64> {
        Ok(self.binary_matrix(label)?.recall())
    }

    pub fn f1_score(&self, label: &str) -> Result<f64> {
        Ok(self.binary_matrix(label)?.f1_score())
    }

    /// Micro averaged statistics (all four equal the overall accuracy)
    pub fn micro(&self) -> &AccuracyStats {
        &self.micro
    }

    /// Macro averaged statistics over the real values
    pub fn macro_stats(&self) -> &AccuracyStats {
        &self.macro_stats
    }

    /// Mean overall accuracy
    pub fn accuracy(&self) -> f64 {
        self.micro.accuracy.mean()
    }

    /// Percentages of the counts, computed on first use
    pub fn percents(&self, normalization: Normalization) -> &Percents {
        match normalization {
            Normalization::All => self.percent_all.get_or_init(|| {
                let total = self.total as f64;
                self.map_cells(|_, n| 100.0 * n as f64 / total)
            }),
            Normalization::Recall => self.percent_recall.get_or_init(|| {
                self.map_cells(|real, n| {
                    let row: usize = self.counts.get(real).map(|r| r.values().sum()).unwrap_or(0);
                    if row == 0 {
                        f64::NAN
                    } else {
                        100.0 * n as f64 / row as f64
                    }
                })
            }),
        }
    }

    fn map_cells(&self, f: impl Fn(&str, usize) -> f64) -> Percents {
        self.counts
            .iter()
            .map(|(real, row)| {
                let cells = row.iter().map(|(p, &n)| (p.clone(), f(real, n))).collect();
                (real.clone(), cells)
            })
            .collect()
    }

    fn compute_micro(&self) -> AccuracyStats {
        let correct: usize = self.counts.keys().map(|l| self.count(l, l)).sum();
        let accuracy = correct as f64 / self.total as f64;
        AccuracyStats::from_sample(accuracy, accuracy, accuracy, accuracy)
    }

    fn compute_macro(&self) -> AccuracyStats {
        let binaries: Vec<BinaryConfusionMatrix> = self
            .counts
            .keys()
            .filter_map(|l| self.binary_matrix(l).ok())
            .collect();
        let n = binaries.len() as f64;
        let mean = |f: fn(&BinaryConfusionMatrix) -> f64| binaries.iter().map(f).sum::<f64>() / n;
        AccuracyStats::from_sample(
            mean(BinaryConfusionMatrix::accuracy),
            mean(BinaryConfusionMatrix::precision),
            mean(BinaryConfusionMatrix::recall),
            mean(BinaryConfusionMatrix::f1_score),
        )
    }
}

/// Real and predicted values gathered from a classification pass
struct Outcome {
    /// Windows pulled from the data, labeled or not
    seen: usize,
    real: Vec<String>,
    predicted: Vec<String>,
}

/// Real and predicted value of one window, None if it lacks the label
fn predict<C: FixedClassifier + ?Sized>(
    label: &str,
    classifier: &C,
    item: &LabeledWindow,
) -> Result<Option<(String, String)>> {
    let Some(real) = item.label(label) else {
        return Ok(None);
    };
    let mut classes = classifier.classify(item.window())?;
    let classification = classes.remove(label).ok_or_else(|| {
        EvalError::Classifier(format!(
            "Model did not produce a classification containing label {}",
            label
        ))
    })?;
    Ok(Some((real.to_string(), classification.label_value)))
}

fn collect_serial<C: FixedClassifier + ?Sized>(
    label: &str,
    classifier: &C,
    data: &dyn SizedIterable<LabeledWindow>,
) -> Result<Outcome> {
    let mut outcome = Outcome {
        seen: 0,
        real: Vec::new(),
        predicted: Vec::new(),
    };
    for item in data.items() {
        outcome.seen += 1;
        if let Some((real, predicted)) = predict(label, classifier, &item)? {
            outcome.real.push(real);
            outcome.predicted.push(predicted);
        }
    }
    Ok(outcome)
}

fn locked<'m, T>(mutex: &'m Mutex<T>) -> Result<MutexGuard<'m, T>> {
    mutex.lock().map_err(|e| EvalError::Lock(e.to_string()))
}

fn collect_parallel<C: FixedClassifier + ?Sized>(
    label: &str,
    classifier: &C,
    data: &dyn SizedIterable<LabeledWindow>,
) -> Result<Outcome> {
    let cursor = Mutex::new(data.items());
    let pairs = Mutex::new((Vec::new(), Vec::new()));
    let seen = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);
    let failure: Mutex<Option<EvalError>> = Mutex::new(None);

    let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    debug!("Evaluating with {} workers", workers);

    let work = || -> Result<()> {
        while !failed.load(Ordering::Relaxed) {
            let Some(item) = locked(&cursor)?.next() else {
                return Ok(());
            };
            seen.fetch_add(1, Ordering::Relaxed);
            if let Some((r, p)) = predict(label, classifier, &item)? {
                // one lock for both lists so pairs stay aligned
                let mut lists = locked(&pairs)?;
                lists.0.push(r);
                lists.1.push(p);
            }
        }
        Ok(())
    };

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                s.spawn(|| {
                    if let Err(e) = work() {
                        failed.store(true, Ordering::Relaxed);
                        failure.lock().unwrap_or_else(PoisonError::into_inner).get_or_insert(e);
                    }
                })
            })
            .collect();
        for handle in handles {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
    });

    let failure = failure.into_inner().map_err(|e| EvalError::Lock(e.to_string()))?;
    if let Some(e) = failure {
        return Err(e);
    }
    let (real, predicted) = pairs.into_inner().map_err(|e| EvalError::Lock(e.to_string()))?;
    Ok(Outcome {
        seen: seen.into_inner(),
        real,
        predicted,
    })
}
