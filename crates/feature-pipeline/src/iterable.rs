//! Labeled Feature Gram Iterable
//!
//! Wraps an iterable of labeled windows and yields, per accepted window, one
//! labeled feature gram per descriptor. Windows are pulled in batches and each
//! batch is extracted in parallel.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;
use uuid::Uuid;
use window_data::{BoxIter, Labeled, LabeledWindow, SizedIterable};

use crate::extractor::FeatureGramDescriptor;
use crate::feature::LabeledFeatureGram;
use crate::pipeline::CachingFeaturePipeline;

/// Decides which windows are turned into feature grams
pub type WindowPredicate = Arc<dyn Fn(&LabeledWindow) -> bool + Send + Sync>;

/// Feature grams of a labeled window iterable.
///
/// In soft mode features live only in the pipeline caches and every pass
/// re-reads or recomputes them. In hard mode the first pass materializes all
/// grams and later passes replay that list. Call
/// [`LabeledFeatureIterable::clear_cached_items`] once training is done.
pub struct LabeledFeatureIterable<'a> {
    source: &'a dyn SizedIterable<LabeledWindow>,
    predicate: Option<WindowPredicate>,
    descriptors: Arc<[FeatureGramDescriptor]>,
    pipeline: Arc<CachingFeaturePipeline>,
    soft: bool,
    batch_size: usize,
    hard: OnceLock<Vec<Vec<LabeledFeatureGram>>>,
    /// Windows whose grams this iterable caused to be cached
    touched: Mutex<HashSet<Uuid>>,
}

impl<'a> LabeledFeatureIterable<'a> {
    /// Create an iterable using the pipeline's soft/batch settings
    pub fn new(
        source: &'a dyn SizedIterable<LabeledWindow>,
        descriptors: Vec<FeatureGramDescriptor>,
        pipeline: Arc<CachingFeaturePipeline>,
    ) -> Self {
        let soft = pipeline.config().soft_reference_features;
        let batch_size = pipeline.config().effective_batch_size();
        Self {
            source,
            predicate: None,
            descriptors: descriptors.into(),
            pipeline,
            soft,
            batch_size,
            hard: OnceLock::new(),
            touched: Mutex::new(HashSet::new()),
        }
    }

    /// Only extract windows accepted by `predicate`
    pub fn with_predicate(mut self, predicate: WindowPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Only extract windows carrying `label`
    pub fn with_label_filter(self, label: &str) -> Self {
        let label = label.to_string();
        self.with_predicate(Arc::new(move |w: &LabeledWindow| w.label(&label).is_some()))
    }

    /// Override the soft/hard mode
    pub fn with_soft_references(mut self, soft: bool) -> Self {
        self.soft = soft;
        self
    }

    /// Override the batch size (minimum 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Get the descriptors
    pub fn descriptors(&self) -> &[FeatureGramDescriptor] {
        &self.descriptors
    }

    /// Distinct values of `label` among the accepted windows
    pub fn label_values(&self, label: &str) -> BTreeSet<String> {
        self.source
            .items()
            .filter(|w| self.accepts(w))
            .filter_map(|w| w.label(label).map(str::to_string))
            .collect()
    }

    /// Drop the materialized grams and evict every cache entry this iterable
    /// created
    pub fn clear_cached_items(&mut self) {
        self.hard.take();
        let touched = match self.touched.get_mut() {
            Ok(touched) => std::mem::take(touched),
            Err(poisoned) => std::mem::take(poisoned.into_inner()),
        };
        debug!("Evicting cached features of {} windows", touched.len());
        for id in touched {
            self.pipeline.evict(id, &self.descriptors);
        }
    }

    fn accepts(&self, window: &LabeledWindow) -> bool {
        self.predicate.as_ref().map_or(true, |p| p(window))
    }

    fn extract_one(&self, window: &LabeledWindow) -> Vec<LabeledFeatureGram> {
        let labels = Arc::new(window.labels().clone());
        self.pipeline
            .feature_grams(window.window(), &self.descriptors)
            .into_iter()
            .map(|gram| LabeledFeatureGram::new(Arc::clone(&labels), gram))
            .collect()
    }

    /// Extract a batch in parallel, keeping the batch order
    fn extract_batch(&self, batch: &[LabeledWindow]) -> Vec<Vec<LabeledFeatureGram>> {
        if let Ok(mut touched) = self.touched.lock() {
            touched.extend(batch.iter().map(|w| w.window().id()));
        }

        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let workers = cores.min(batch.len());
        if workers <= 1 {
            return batch.iter().map(|w| self.extract_one(w)).collect();
        }

        let chunk = batch.len().div_ceil(workers);
        std::thread::scope(|s| {
            let handles: Vec<_> = batch
                .chunks(chunk)
                .map(|part| s.spawn(move || part.iter().map(|w| self.extract_one(w)).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| match h.join() {
                    Ok(grams) => grams,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }

    fn batches(&self) -> FeatureBatches<'_, 'a> {
        FeatureBatches {
            owner: self,
            windows: self.source.items(),
            pending: Vec::new().into_iter(),
        }
    }
}

impl SizedIterable<Vec<LabeledFeatureGram>> for LabeledFeatureIterable<'_> {
    fn items(&self) -> BoxIter<'_, Vec<LabeledFeatureGram>> {
        if self.soft {
            return Box::new(self.batches());
        }
        let grams = self.hard.get_or_init(|| {
            let grams: Vec<_> = self.batches().collect();
            debug!("Materialized feature grams of {} windows", grams.len());
            grams
        });
        Box::new(grams.iter().cloned())
    }

    fn size(&self) -> Option<usize> {
        if let Some(grams) = self.hard.get() {
            return Some(grams.len());
        }
        match self.predicate {
            Some(_) => None,
            None => self.source.size(),
        }
    }
}

/// Soft-mode cursor pulling windows one batch at a time
struct FeatureBatches<'s, 'a> {
    owner: &'s LabeledFeatureIterable<'a>,
    windows: BoxIter<'s, LabeledWindow>,
    pending: std::vec::IntoIter<Vec<LabeledFeatureGram>>,
}

impl Iterator for FeatureBatches<'_, '_> {
    type Item = Vec<LabeledFeatureGram>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(grams) = self.pending.next() {
                return Some(grams);
            }
            let owner = self.owner;
            let batch: Vec<LabeledWindow> = self
                .windows
                .by_ref()
                .filter(|w| owner.accepts(w))
                .take(owner.batch_size)
                .collect();
            if batch.is_empty() {
                return None;
            }
            self.pending = owner.extract_batch(&batch).into_iter();
        }
    }
}
