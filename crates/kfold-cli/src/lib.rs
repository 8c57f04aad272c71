//! K-fold Evaluation Command Line
//!
//! Loads labeled windows from JSON, cross-validates the nearest-mean
//! reference classifier on them and renders the confusion-matrix reports.

use anyhow::{bail, Context};
use config::{Config, Environment, File};
use feature_pipeline::{CachingFeaturePipeline, PipelineConfig};
use model_evaluation::{ConfusionMatrix, EvaluatorConfig, KFoldModelEvaluator, NearestMeanClassifier, Normalization};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use window_data::{LabeledWindow, ReferenceIterable, TrainingSetInfo};

const USAGE: &str = "usage: kfold-eval <windows.json> [--config <file>]";

/// Application settings: defaults, then an optional file, then `KFOLD_*`
/// environment variables (nested keys separated by `__`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Label to train and evaluate on
    pub label: String,
    /// Folds to evaluate, 0 for all
    pub folds_to_evaluate: usize,
    /// Per-value training count per training partition, 0 to disable
    pub balanced_training_count: usize,
    /// Feature sub-window size, 0 for the whole window (milliseconds)
    pub sub_window_msec: f64,
    /// Percent table normalization (all or recall)
    pub normalization: String,
    /// Log level
    pub log_level: String,
    pub evaluator: EvaluatorConfig,
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            label: "class".to_string(),
            folds_to_evaluate: 0,
            balanced_training_count: 0,
            sub_window_msec: 0.0,
            normalization: "recall".to_string(),
            log_level: "info".to_string(),
            evaluator: EvaluatorConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Layer the optional file and the environment over the defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("KFOLD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;
        Ok(config.try_deserialize()?)
    }

    /// Folds to evaluate after resolving the 0 default
    pub fn effective_folds(&self) -> usize {
        if self.folds_to_evaluate == 0 {
            self.evaluator.fold_count
        } else {
            self.folds_to_evaluate
        }
    }
}

/// Command line arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub windows: PathBuf,
    pub config: Option<PathBuf>,
}

impl Args {
    /// Parse the arguments following the program name
    pub fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut windows = None;
        let mut config = None;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = iter.next().with_context(|| format!("--config needs a file\n{}", USAGE))?;
                    config = Some(PathBuf::from(path));
                }
                flag if flag.starts_with('-') => bail!("Unknown option {}\n{}", flag, USAGE),
                path if windows.is_none() => windows = Some(PathBuf::from(path)),
                extra => bail!("Unexpected argument {}\n{}", extra, USAGE),
            }
        }
        Ok(Self {
            windows: windows.context(USAGE)?,
            config,
        })
    }
}

/// Initialize logging
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let level: Level = level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")
}

/// Read a JSON array of labeled windows
pub fn load_windows(path: &Path) -> anyhow::Result<Vec<LabeledWindow>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let windows: Vec<LabeledWindow> =
        serde_json::from_str(&text).with_context(|| format!("Failed to parse windows in {}", path.display()))?;
    info!("Loaded {} windows from {}", windows.len(), path.display());
    Ok(windows)
}

/// Cross-validate the nearest-mean classifier on `windows`
pub fn evaluate(config: &AppConfig, windows: Vec<LabeledWindow>) -> anyhow::Result<ConfusionMatrix> {
    let pipeline = Arc::new(CachingFeaturePipeline::new(config.pipeline.clone())?);
    let mut classifier = NearestMeanClassifier::with_statistics(config.sub_window_msec, Arc::clone(&pipeline));
    let evaluator = KFoldModelEvaluator::new(config.evaluator.clone())?;
    let data = ReferenceIterable::from_items(windows);

    let matrix = evaluator.confusion_matrix(
        &mut classifier,
        &data,
        &config.label,
        config.effective_folds(),
        config.balanced_training_count,
    );
    // window ids are fresh per run, nothing cached is reusable afterwards
    pipeline.clear_cache();
    Ok(matrix?)
}

/// Dataset summary followed by the statistics, count and percent tables
pub fn render_report(info: &TrainingSetInfo, matrix: &ConfusionMatrix, normalization: &str) -> anyhow::Result<String> {
    let normalization: Normalization = normalization.parse()?;
    let mut out = info.pretty_format();
    out.push('\n');
    out.push_str(&matrix.format_stats());
    out.push('\n');
    out.push_str(&matrix.format_counts());
    out.push('\n');
    out.push_str(&matrix.format_percents(normalization));
    Ok(out)
}
