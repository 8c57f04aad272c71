//! Bounded In-memory Cache

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type EvictionCallback<K> = Box<dyn Fn(&K) + Send + Sync>;

/// Entries plus their recency ordering
struct LruState<K, V> {
    /// key -> (value, last use tick)
    entries: HashMap<K, (V, u64)>,
    /// last use tick -> key, oldest first
    recency: BTreeMap<u64, K>,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V> LruState<K, V> {
    fn touch(&mut self, key: &K) {
        self.tick += 1;
        let tick = self.tick;
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.1);
            entry.1 = tick;
            self.recency.insert(tick, key.clone());
        }
    }
}

/// Capacity-bounded key/value cache evicting the least recently used entry.
///
/// A miss is never an error: callers recompute and `put` the value again.
pub struct MemoryCache<K, V> {
    /// Maximum entry count
    capacity: usize,
    /// Guarded state
    state: Mutex<LruState<K, V>>,
    /// Entries evicted to honor the capacity
    evictions: AtomicUsize,
    /// Called with each evicted key
    on_evict: Option<EvictionCallback<K>>,
}

impl<K: Eq + Hash + Clone, V: Clone> MemoryCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(LruState {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
            }),
            evictions: AtomicUsize::new(0),
            on_evict: None,
        }
    }

    /// Register a callback invoked for every key evicted by capacity pressure
    pub fn with_eviction_callback(mut self, callback: impl Fn(&K) + Send + Sync + 'static) -> Self {
        self.on_evict = Some(Box::new(callback));
        self
    }

    /// Look up a value, marking it most recently used
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock().ok()?;
        state.touch(key);
        state.entries.get(key).map(|(v, _)| v.clone())
    }

    /// Insert or replace a value, evicting old entries beyond capacity
    pub fn put(&self, key: K, value: V) {
        let evicted = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            state.tick += 1;
            let tick = state.tick;
            if let Some((_, old_tick)) = state.entries.insert(key.clone(), (value, tick)) {
                state.recency.remove(&old_tick);
            }
            state.recency.insert(tick, key);

            let mut evicted = Vec::new();
            while state.entries.len() > self.capacity {
                let Some((_, oldest)) = state.recency.pop_first() else {
                    break;
                };
                state.entries.remove(&oldest);
                evicted.push(oldest);
            }
            evicted
        };

        if !evicted.is_empty() {
            self.evictions.fetch_add(evicted.len(), Ordering::Relaxed);
            if let Some(callback) = &self.on_evict {
                for key in &evicted {
                    callback(key);
                }
            }
        }
    }

    /// Remove a value
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock().ok()?;
        let (value, tick) = state.entries.remove(key)?;
        state.recency.remove(&tick);
        Some(value)
    }

    /// Remove every entry
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.clear();
            state.recency.clear();
        }
    }

    /// Number of entries held
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum entry count
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries evicted so far
    pub fn evictions(&self) -> usize {
        self.evictions.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_get_and_put() {
        let cache = MemoryCache::new(4);
        cache.put("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
        cache.put("a", 2);
        assert_eq!(cache.get(&"a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let cache = MemoryCache::new(2).with_eviction_callback(move |k: &&str| {
            sink.lock().unwrap().push(k.to_string());
        });

        cache.put("a", 1);
        cache.put("b", 2);
        // touch a so b becomes the oldest
        assert_eq!(cache.get(&"a"), Some(1));
        cache.put("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.evictions(), 1);
        assert_eq!(evicted.lock().unwrap().as_slice(), ["b".to_string()]);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = MemoryCache::new(3);
        cache.put(1, "x");
        cache.put(2, "y");
        assert_eq!(cache.remove(&1), Some("x"));
        assert_eq!(cache.remove(&1), None);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache = MemoryCache::new(0);
        cache.put(1, 1);
        cache.put(2, 2);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.get(&2), Some(2));
    }
}
