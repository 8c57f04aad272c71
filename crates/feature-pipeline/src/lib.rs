//! Feature Extraction Pipeline
//!
//! Turns labeled data windows into labeled feature grams, with optional memory
//! and disk caching so multi-pass training does not recompute features.

mod cache;
mod config;
mod disk;
mod error;
mod extractor;
mod feature;
mod iterable;
mod pipeline;
mod processor;
mod statistics;
mod validate;

pub use cache::MemoryCache;
pub use config::PipelineConfig;
pub use disk::DiskCache;
pub use error::FeatureError;
pub use extractor::{FeatureExtractor, FeatureGramDescriptor};
pub use feature::{Feature, FeatureGram, LabeledFeatureGram};
pub use iterable::{LabeledFeatureIterable, WindowPredicate};
pub use pipeline::CachingFeaturePipeline;
pub use processor::{FeatureProcessor, ZScoreProcessor};
pub use statistics::{StatisticalFeatures, StatisticsExtractor};
pub use validate::check_feature_grams;
