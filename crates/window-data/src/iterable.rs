//! Re-shufflable Iterables
//!
//! Items are addressed through lightweight [`Reference`]s so that shuffling and
//! partitioning reorder handles, never payloads. An arena ([`ReferenceIterable`])
//! owns the items; any number of permutations or subsets can share it.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::error::{DataError, Result};

/// Seed used when callers do not choose one
pub const DEFAULT_SHUFFLE_SEED: u64 = 12_310_331;

/// Boxed cursor returned by [`SizedIterable::items`]
pub type BoxIter<'a, T> = Box<dyn Iterator<Item = T> + Send + 'a>;

/// Opaque handle resolving to one item of a shuffle iterable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference(Arc<str>);

impl Reference {
    /// Create a reference from any string-like identifier
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Reference(id.into())
    }

    /// Get the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Reference {
    fn from(id: &str) -> Self {
        Reference::new(id)
    }
}

impl From<String> for Reference {
    fn from(id: String) -> Self {
        Reference::new(id)
    }
}

/// A finite, restartable sequence of items
pub trait SizedIterable<T>: Send + Sync {
    /// Start a fresh cursor. Cursors are independent of each other.
    fn items(&self) -> BoxIter<'_, T>;

    /// Number of items, when cheaply known
    fn size(&self) -> Option<usize> {
        None
    }

    /// Reference-based view of this iterable, if it has one
    fn as_shuffle(&self) -> Option<&dyn ShuffleIterable<T>> {
        None
    }
}

/// An iterable whose items are reachable through references and which can
/// produce deterministic permutations of itself.
pub trait ShuffleIterable<T>: SizedIterable<T> {
    /// References in iteration order
    fn references(&self) -> &[Reference];

    /// Resolve one reference
    fn dereference(&self, reference: &Reference) -> Result<T>;

    /// Resolve many references, failing on the first unknown one
    fn dereference_all(&self, references: &[Reference]) -> Result<Vec<T>> {
        references.iter().map(|r| self.dereference(r)).collect()
    }

    /// Build an iterable over the same items in the given reference order.
    ///
    /// References may repeat or be a subset; unknown references are skipped
    /// (with a warning) during iteration.
    fn new_iterable(&self, references: Vec<Reference>) -> Arc<dyn ShuffleIterable<T>>;

    /// Build a new iterable with a permutation determined by `seed`. The receiver is not changed.
    fn shuffle(&self, seed: u64) -> Arc<dyn ShuffleIterable<T>> {
        let mut references = self.references().to_vec();
        shuffle_references(&mut references, seed);
        self.new_iterable(references)
    }
}

/// Permute references in place, reproducibly for a given seed
pub fn shuffle_references(references: &mut [Reference], seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    references.shuffle(&mut rng);
}

impl<T: Clone + Send + Sync> SizedIterable<T> for Vec<T> {
    fn items(&self) -> BoxIter<'_, T> {
        Box::new(self.as_slice().iter().cloned())
    }

    fn size(&self) -> Option<usize> {
        Some(self.len())
    }
}

impl<T, I> SizedIterable<T> for Arc<I>
where
    I: SizedIterable<T> + ?Sized,
{
    fn items(&self) -> BoxIter<'_, T> {
        (**self).items()
    }

    fn size(&self) -> Option<usize> {
        (**self).size()
    }

    fn as_shuffle(&self) -> Option<&dyn ShuffleIterable<T>> {
        (**self).as_shuffle()
    }
}

/// Arena of items addressed by reference
struct ItemStore<T> {
    items: Vec<T>,
    index: HashMap<Reference, usize>,
}

impl<T> ItemStore<T> {
    fn get(&self, reference: &Reference) -> Option<&T> {
        self.index.get(reference).map(|&i| &self.items[i])
    }
}

/// Shuffle iterable owning its items in a shared arena
pub struct ReferenceIterable<T> {
    /// Shared item arena
    store: Arc<ItemStore<T>>,
    /// Iteration order
    order: Arc<[Reference]>,
    /// References in `order` present in the arena
    resolvable: usize,
}

impl<T: Clone + Send + Sync + 'static> ReferenceIterable<T> {
    /// Take ownership of items, referencing them by their position ("0", "1", ...)
    pub fn from_items(items: Vec<T>) -> Self {
        let order: Vec<Reference> = (0..items.len()).map(|i| Reference::new(i.to_string())).collect();
        let index = order.iter().cloned().enumerate().map(|(i, r)| (r, i)).collect();
        Self {
            resolvable: order.len(),
            store: Arc::new(ItemStore { items, index }),
            order: order.into(),
        }
    }

    /// Take ownership of items under caller-chosen references
    pub fn from_keyed(keyed: Vec<(Reference, T)>) -> Result<Self> {
        let mut items = Vec::with_capacity(keyed.len());
        let mut index = HashMap::with_capacity(keyed.len());
        let mut order = Vec::with_capacity(keyed.len());
        for (reference, item) in keyed {
            if index.insert(reference.clone(), items.len()).is_some() {
                return Err(DataError::invalid(format!("Duplicate reference: {}", reference)));
            }
            items.push(item);
            order.push(reference);
        }
        Ok(Self {
            resolvable: order.len(),
            store: Arc::new(ItemStore { items, index }),
            order: order.into(),
        })
    }

    /// Wrap into a shared trait object
    pub fn into_shared(self) -> Arc<dyn ShuffleIterable<T>> {
        Arc::new(self)
    }
}

impl<T: Clone + Send + Sync + 'static> SizedIterable<T> for ReferenceIterable<T> {
    fn items(&self) -> BoxIter<'_, T> {
        Box::new(self.order.iter().filter_map(move |r| match self.store.get(r) {
            Some(item) => Some(item.clone()),
            None => {
                warn!("Skipping unknown reference {}", r);
                None
            }
        }))
    }

    fn size(&self) -> Option<usize> {
        Some(self.resolvable)
    }

    fn as_shuffle(&self) -> Option<&dyn ShuffleIterable<T>> {
        Some(self)
    }
}

impl<T: Clone + Send + Sync + 'static> ShuffleIterable<T> for ReferenceIterable<T> {
    fn references(&self) -> &[Reference] {
        &self.order
    }

    fn dereference(&self, reference: &Reference) -> Result<T> {
        self.store
            .get(reference)
            .cloned()
            .ok_or_else(|| DataError::NotFound(reference.to_string()))
    }

    fn new_iterable(&self, references: Vec<Reference>) -> Arc<dyn ShuffleIterable<T>> {
        let resolvable = references.iter().filter(|r| self.store.index.contains_key(*r)).count();
        if resolvable < references.len() {
            warn!("{} of {} references are unknown", references.len() - resolvable, references.len());
        }
        Arc::new(ReferenceIterable {
            store: Arc::clone(&self.store),
            order: references.into(),
            resolvable,
        })
    }
}

/// Shuffle iterable over a reference list resolved by another shuffle iterable
pub struct DelegatingShuffleIterable<T> {
    /// Resolves references
    source: Arc<dyn ShuffleIterable<T>>,
    /// Iteration order, may repeat references
    references: Arc<[Reference]>,
}

impl<T: Clone + Send + Sync + 'static> DelegatingShuffleIterable<T> {
    /// Create a new delegating iterable
    pub fn new(source: Arc<dyn ShuffleIterable<T>>, references: Vec<Reference>) -> Self {
        Self {
            source,
            references: references.into(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SizedIterable<T> for DelegatingShuffleIterable<T> {
    fn items(&self) -> BoxIter<'_, T> {
        Box::new(self.references.iter().filter_map(move |r| match self.source.dereference(r) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping item: {}", e);
                None
            }
        }))
    }

    fn size(&self) -> Option<usize> {
        Some(self.references.len())
    }

    fn as_shuffle(&self) -> Option<&dyn ShuffleIterable<T>> {
        Some(self)
    }
}

impl<T: Clone + Send + Sync + 'static> ShuffleIterable<T> for DelegatingShuffleIterable<T> {
    fn references(&self) -> &[Reference] {
        &self.references
    }

    fn dereference(&self, reference: &Reference) -> Result<T> {
        self.source.dereference(reference)
    }

    fn new_iterable(&self, references: Vec<Reference>) -> Arc<dyn ShuffleIterable<T>> {
        Arc::new(DelegatingShuffleIterable {
            source: Arc::clone(&self.source),
            references: references.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: usize) -> ReferenceIterable<usize> {
        ReferenceIterable::from_items((0..n).collect())
    }

    #[test]
    fn test_iterates_in_order() {
        let data = numbers(5);
        let items: Vec<usize> = data.items().collect();
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
        assert_eq!(data.size(), Some(5));
    }

    #[test]
    fn test_independent_cursors() {
        let data = numbers(4);
        let mut first = data.items();
        let mut second = data.items();
        assert_eq!(first.next(), Some(0));
        assert_eq!(first.next(), Some(1));
        assert_eq!(second.next(), Some(0));
        assert_eq!(first.next(), Some(2));
    }

    #[test]
    fn test_exhausted_cursor_stays_empty() {
        let data = numbers(1);
        let mut it = data.items();
        assert_eq!(it.next(), Some(0));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_shuffle_reproducible_and_pure() {
        let data = numbers(50);
        let before: Vec<Reference> = data.references().to_vec();

        let a: Vec<usize> = data.shuffle(42).items().collect();
        let b: Vec<usize> = data.shuffle(42).items().collect();
        let c: Vec<usize> = data.shuffle(7).items().collect();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(data.references(), before.as_slice());

        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_unknown_reference_not_found() {
        let data = numbers(3);
        let err = data.dereference(&Reference::from("99")).unwrap_err();
        assert_eq!(err, DataError::NotFound("99".to_string()));
        assert!(data
            .dereference_all(&[Reference::from("0"), Reference::from("x")])
            .is_err());
    }

    #[test]
    fn test_keyed_duplicates_rejected() {
        let keyed = vec![(Reference::from("a"), 1), (Reference::from("a"), 2)];
        assert!(matches!(
            ReferenceIterable::from_keyed(keyed),
            Err(DataError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_delegating_subset_with_repeats() {
        let base = numbers(5).into_shared();
        let refs = vec![Reference::from("4"), Reference::from("1"), Reference::from("4")];
        let view = DelegatingShuffleIterable::new(Arc::clone(&base), refs);
        assert_eq!(view.items().collect::<Vec<_>>(), vec![4, 1, 4]);
        assert_eq!(view.size(), Some(3));

        let reshuffled = view.shuffle(3);
        let mut items: Vec<usize> = reshuffled.items().collect();
        items.sort_unstable();
        assert_eq!(items, vec![1, 4, 4]);
    }

    #[test]
    fn test_unknown_references_skipped_on_iteration() {
        let data = numbers(2);
        let view = data.new_iterable(vec![Reference::from("1"), Reference::from("nope")]);
        assert_eq!(view.items().collect::<Vec<_>>(), vec![1]);
        assert_eq!(view.size(), Some(1));
        assert_eq!(view.references().len(), 2);
    }

    #[test]
    fn test_vec_has_no_references() {
        let data = vec![1, 2, 3];
        assert!(data.as_shuffle().is_none());
        assert_eq!(SizedIterable::size(&data), Some(3));
    }

    #[test]
    fn test_vec_keeps_slice_iteration() {
        let data = vec!["a".to_string(), "b".to_string()];
        let borrowed: Vec<&String> = data.iter().collect();
        assert_eq!(borrowed, vec![&data[0], &data[1]]);

        let owned: Vec<String> = data.items().collect();
        assert_eq!(owned, data);

        let erased: &dyn SizedIterable<String> = &data;
        assert_eq!(erased.items().count(), 2);
    }
}
