//! Model Evaluation
//!
//! Classifier contracts, confusion-matrix statistics and label-balanced
//! K-fold cross validation over labeled window iterables.

mod accuracy;
mod binary;
mod classifier;
mod confusion;
mod kfold;
mod nearest;
mod report;

pub use accuracy::AccuracyStats;
pub use binary::BinaryConfusionMatrix;
pub use classifier::{Classification, FixedClassifier, RankedValue, TrainableClassifier};
pub use confusion::{ConfusionMatrix, Counts, Normalization, Percents};
pub use kfold::{EvaluatorConfig, KFoldModelEvaluator, PartitionListener};
pub use nearest::NearestMeanClassifier;

use feature_pipeline::FeatureError;
use thiserror::Error;
use window_data::DataError;

/// Evaluation error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Feature extraction failed in fold {fold}: {source}")]
    FeatureExtraction {
        fold: usize,
        #[source]
        source: FeatureError,
    },

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Partition listener skipped every fold")]
    NoFoldsEvaluated,

    #[error("Lock error: {0}")]
    Lock(String),
}

impl EvalError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EvalError::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
