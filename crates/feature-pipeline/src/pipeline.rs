//! Two-level Caching Feature Pipeline

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;
use window_data::DataWindow;

use crate::cache::MemoryCache;
use crate::config::PipelineConfig;
use crate::disk::DiskCache;
use crate::error::FeatureError;
use crate::extractor::FeatureGramDescriptor;
use crate::feature::{Feature, FeatureGram};

/// Lock stripes per core
const LOCKS_PER_CORE: usize = 128;

/// Extracts feature grams, caching unprocessed features and final grams.
///
/// Level one holds extractor output per (window, extractor, sub-windowing),
/// so descriptors sharing an extractor but differing in processor reuse it.
/// Level two holds final grams per (window, descriptor). Both levels use the
/// memory and/or disk cache as configured. A striped lock per window id makes
/// concurrent requests for one window extract it only once.
pub struct CachingFeaturePipeline {
    /// Configuration
    config: PipelineConfig,
    /// Level one memory cache
    unprocessed: Option<MemoryCache<String, Arc<Vec<Feature>>>>,
    /// Level two memory cache
    processed: Option<MemoryCache<String, Arc<FeatureGram>>>,
    /// Shared disk cache for both levels
    disk: Option<DiskCache>,
    /// Striped per-window locks
    locks: Vec<Mutex<()>>,
    /// Extractor invocations (cache misses)
    extractions: AtomicUsize,
}

impl CachingFeaturePipeline {
    /// Create a new pipeline, opening the disk cache if enabled
    pub fn new(config: PipelineConfig) -> Result<Self, FeatureError> {
        info!("Creating feature pipeline with config: {:?}", config);
        let capacity = config.memory_cache_capacity;
        let (unprocessed, processed) = if config.use_memory_cache {
            (Some(MemoryCache::new(capacity)), Some(MemoryCache::new(capacity)))
        } else {
            (None, None)
        };
        let disk = if config.use_disk_cache {
            Some(DiskCache::open(&config.disk_cache_dir)?)
        } else {
            None
        };
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

        Ok(Self {
            config,
            unprocessed,
            processed,
            disk,
            locks: (0..cores * LOCKS_PER_CORE).map(|_| Mutex::new(())).collect(),
            extractions: AtomicUsize::new(0),
        })
    }

    /// Pipeline without any caching
    pub fn uncached() -> Self {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            config: PipelineConfig::in_memory(),
            unprocessed: None,
            processed: None,
            disk: None,
            locks: (0..cores * LOCKS_PER_CORE).map(|_| Mutex::new(())).collect(),
            extractions: AtomicUsize::new(0),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Number of times an extractor actually ran
    pub fn extraction_count(&self) -> usize {
        self.extractions.load(Ordering::Relaxed)
    }

    /// Feature grams of `window`, one per descriptor
    pub fn feature_grams(&self, window: &DataWindow, descriptors: &[FeatureGramDescriptor]) -> Vec<Arc<FeatureGram>> {
        descriptors.iter().map(|d| self.feature_gram(window, d)).collect()
    }

    /// Feature gram of `window` under one descriptor
    pub fn feature_gram(&self, window: &DataWindow, descriptor: &FeatureGramDescriptor) -> Arc<FeatureGram> {
        let key = processed_key(window.id(), descriptor);
        if let Some(gram) = self.lookup_processed(&key) {
            return gram;
        }

        // a poisoned stripe only costs the de-duplication
        let _guard = self.stripe(window.id()).lock().ok();
        if let Some(gram) = self.lookup_processed(&key) {
            return gram;
        }

        let features = if descriptor.has_processor() {
            self.unprocessed_features(window, descriptor)
        } else {
            self.extract(window, descriptor)
        };
        let gram = Arc::new(descriptor.process(features));
        self.store_processed(key, &gram);
        gram
    }

    /// Drop cached entries of `window` for the given descriptors
    pub fn evict(&self, window_id: Uuid, descriptors: &[FeatureGramDescriptor]) {
        for d in descriptors {
            let gram_key = processed_key(window_id, d);
            let raw_key = unprocessed_key(window_id, d);
            if let Some(cache) = &self.processed {
                cache.remove(&gram_key);
            }
            if let Some(cache) = &self.unprocessed {
                cache.remove(&raw_key);
            }
            if let Some(disk) = &self.disk {
                disk.remove(&gram_key);
                disk.remove(&raw_key);
            }
        }
    }

    /// Drop every cached entry
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.processed {
            cache.clear();
        }
        if let Some(cache) = &self.unprocessed {
            cache.clear();
        }
        if let Some(disk) = &self.disk {
            disk.clear();
        }
        debug!("Feature caches cleared");
    }

    fn stripe(&self, id: Uuid) -> &Mutex<()> {
        &self.locks[(id.as_u128() % self.locks.len() as u128) as usize]
    }

    fn extract(&self, window: &DataWindow, descriptor: &FeatureGramDescriptor) -> Vec<Feature> {
        self.extractions.fetch_add(1, Ordering::Relaxed);
        descriptor.extract_features(window)
    }

    fn unprocessed_features(&self, window: &DataWindow, descriptor: &FeatureGramDescriptor) -> Vec<Feature> {
        let key = unprocessed_key(window.id(), descriptor);
        if let Some(features) = self.unprocessed.as_ref().and_then(|c| c.get(&key)) {
            return features.as_ref().clone();
        }
        if let Some(features) = self.disk.as_ref().and_then(|d| d.get::<Vec<Feature>>(&key)) {
            if let Some(cache) = &self.unprocessed {
                cache.put(key, Arc::new(features.clone()));
            }
            return features;
        }

        let features = self.extract(window, descriptor);
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.put(&key, &features) {
                warn!("Could not write features to disk cache: {}", e);
            }
        }
        if let Some(cache) = &self.unprocessed {
            cache.put(key, Arc::new(features.clone()));
        }
        features
    }

    fn lookup_processed(&self, key: &String) -> Option<Arc<FeatureGram>> {
        if let Some(gram) = self.processed.as_ref().and_then(|c| c.get(key)) {
            return Some(gram);
        }
        let gram = Arc::new(self.disk.as_ref()?.get::<FeatureGram>(key)?);
        if let Some(cache) = &self.processed {
            cache.put(key.clone(), Arc::clone(&gram));
        }
        Some(gram)
    }

    fn store_processed(&self, key: String, gram: &Arc<FeatureGram>) {
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.put(&key, gram.as_ref()) {
                warn!("Could not write feature gram to disk cache: {}", e);
            }
        }
        if let Some(cache) = &self.processed {
            cache.put(key, Arc::clone(gram));
        }
    }
}

fn unprocessed_key(id: Uuid, descriptor: &FeatureGramDescriptor) -> String {
    format!("raw-{}-{}", id, descriptor.extractor_key())
}

fn processed_key(id: Uuid, descriptor: &FeatureGramDescriptor) -> String {
    format!("gram-{}-{}", id, descriptor.cache_key())
}
