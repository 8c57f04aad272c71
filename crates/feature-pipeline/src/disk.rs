//! On-disk Feature Cache

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::FeatureError;

/// Longest file stem derived from a key
const MAX_STEM_LEN: usize = 180;

/// Stored entry, the key is kept to detect file name collisions
#[derive(Serialize, Deserialize)]
struct DiskEntry<V> {
    key: String,
    value: V,
}

/// Key/value store of postcard-encoded files in one directory
pub struct DiskCache {
    /// Cache directory
    dir: PathBuf,
    /// Files written by this instance
    written: Mutex<HashSet<PathBuf>>,
}

impl DiskCache {
    /// Open (creating if needed) a cache directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, FeatureError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!("Opened feature disk cache at {}", dir.display());
        Ok(Self {
            dir,
            written: Mutex::new(HashSet::new()),
        })
    }

    /// Get the cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let stem: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .take(MAX_STEM_LEN)
            .collect();
        self.dir.join(format!("{}.bin", stem))
    }

    /// Read a value. Missing, unreadable or mismatched files are misses.
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let path = self.path_for(key);
        let bytes = fs::read(&path).ok()?;
        match postcard::from_bytes::<DiskEntry<V>>(&bytes) {
            Ok(entry) if entry.key == key => Some(entry.value),
            Ok(_) => {
                debug!("Disk cache key collision at {}", path.display());
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write a value
    pub fn put<V: Serialize>(&self, key: &str, value: &V) -> Result<(), FeatureError> {
        let path = self.path_for(key);
        let bytes = postcard::to_allocvec(&DiskEntry {
            key: key.to_string(),
            value,
        })?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;

        if let Ok(mut written) = self.written.lock() {
            written.insert(path);
        }
        Ok(())
    }

    /// Delete one value, returning whether a file was removed
    pub fn remove(&self, key: &str) -> bool {
        let path = self.path_for(key);
        if let Ok(mut written) = self.written.lock() {
            written.remove(&path);
        }
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Could not remove cache file {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Delete every file written by this instance
    pub fn clear(&self) {
        let Ok(mut written) = self.written.lock() else {
            return;
        };
        for path in written.drain() {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove cache file {}: {}", path.display(), e),
            }
        }
    }

    /// Number of files written by this instance and not yet removed
    pub fn len(&self) -> usize {
        self.written.lock().map(|w| w.len()).unwrap_or(0)
    }

    /// Whether this instance holds no files
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();

        cache.put("window:1/stats@0/0", &vec![1.5f64, 2.5]).unwrap();
        assert_eq!(cache.get::<Vec<f64>>("window:1/stats@0/0"), Some(vec![1.5, 2.5]));
        assert_eq!(cache.get::<Vec<f64>>("window:2"), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get::<Vec<f64>>("window:1/stats@0/0"), None);
    }

    #[test]
    fn test_colliding_names_are_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        // both keys sanitize to the same file name
        cache.put("a:b", &1u32).unwrap();
        assert_eq!(cache.get::<u32>("a/b"), None);
        assert_eq!(cache.get::<u32>("a:b"), Some(1));
    }

    #[test]
    fn test_corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        cache.put("k", &7u64).unwrap();
        fs::write(cache.path_for("k"), [0xff, 0xff, 0xff]).unwrap();
        assert_eq!(cache.get::<u64>("k"), None);
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).unwrap();
        cache.put("k", &"v".to_string()).unwrap();
        assert!(cache.remove("k"));
        assert_eq!(cache.get::<String>("k"), None);
        assert!(!cache.path_for("k").exists());
        assert!(cache.is_empty());

        // already gone
        assert!(!cache.remove("k"));
    }
}
