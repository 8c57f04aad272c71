//! Feature Pipeline Configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Caching and batching settings of the feature pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Keep computed features in a bounded memory cache
    pub use_memory_cache: bool,
    /// Keep computed features in files under `disk_cache_dir`
    pub use_disk_cache: bool,
    /// Do not hold features beyond the caches during a training pass
    pub soft_reference_features: bool,
    /// Entries per memory cache level
    pub memory_cache_capacity: usize,
    /// Directory for the disk cache
    pub disk_cache_dir: PathBuf,
    /// Windows extracted per parallel batch, 0 for 8 per core
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_memory_cache: true,
            use_disk_cache: false,
            soft_reference_features: false,
            memory_cache_capacity: 10_000,
            disk_cache_dir: std::env::temp_dir().join("feature-cache"),
            batch_size: 0,
        }
    }
}

impl PipelineConfig {
    /// Streaming configuration for datasets larger than memory
    pub fn streaming() -> Self {
        Self {
            use_memory_cache: true,
            soft_reference_features: true,
            ..Default::default()
        }
    }

    /// Hold every feature in memory for the pass, no caches
    pub fn in_memory() -> Self {
        Self {
            use_memory_cache: false,
            use_disk_cache: false,
            soft_reference_features: false,
            ..Default::default()
        }
    }

    /// Batch size after resolving the 0 default
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size > 0 {
            return self.batch_size;
        }
        8 * std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert!(PipelineConfig::streaming().soft_reference_features);
        assert!(!PipelineConfig::in_memory().use_memory_cache);
        assert!(PipelineConfig::default().effective_batch_size() >= 8);
    }

    #[test]
    fn test_explicit_batch_size() {
        let config = PipelineConfig {
            batch_size: 3,
            ..Default::default()
        };
        assert_eq!(config.effective_batch_size(), 3);
    }
}
