//! Label-stratified Fold Partitioning

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{DataError, Result};
use crate::iterable::{BoxIter, Reference, ShuffleIterable, SizedIterable};
use crate::window::Labeled;

/// One of the N disjoint subsets produced by [`Partitioner::partition`]
pub enum Partition<T> {
    /// Reference list over a shared source
    References(Arc<dyn ShuffleIterable<T>>),
    /// Items collected in memory
    Items(Arc<Vec<T>>),
}

impl<T> Clone for Partition<T> {
    fn clone(&self) -> Self {
        match self {
            Partition::References(refs) => Partition::References(Arc::clone(refs)),
            Partition::Items(items) => Partition::Items(Arc::clone(items)),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Partition<T> {
    /// Number of items in the partition
    pub fn len(&self) -> usize {
        match self {
            Partition::References(refs) => refs.references().len(),
            Partition::Items(items) => items.len(),
        }
    }

    /// Whether the partition holds no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Union of several partitions, in the given order.
    ///
    /// Reference partitions of the same source stay reference-based.
    pub fn merge(parts: &[&Partition<T>]) -> Partition<T> {
        let all_refs: Option<Vec<&Arc<dyn ShuffleIterable<T>>>> = parts
            .iter()
            .map(|p| match p {
                Partition::References(refs) => Some(refs),
                Partition::Items(_) => None,
            })
            .collect();

        match all_refs.as_deref() {
            Some([first, ..]) => {
                let references: Vec<Reference> = all_refs
                    .iter()
                    .flatten()
                    .flat_map(|refs| refs.references().iter().cloned())
                    .collect();
                Partition::References(first.new_iterable(references))
            }
            _ => {
                let items: Vec<T> = parts.iter().flat_map(|p| p.items()).collect();
                Partition::Items(Arc::new(items))
            }
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SizedIterable<T> for Partition<T> {
    fn items(&self) -> BoxIter<'_, T> {
        match self {
            Partition::References(refs) => refs.items(),
            Partition::Items(items) => Box::new(items.as_slice().iter().cloned()),
        }
    }

    fn size(&self) -> Option<usize> {
        Some(self.len())
    }

    fn as_shuffle(&self) -> Option<&dyn ShuffleIterable<T>> {
        match self {
            Partition::References(refs) => Some(refs.as_ref()),
            Partition::Items(_) => None,
        }
    }
}

/// Splits labeled data into folds with even per-label-value representation
pub struct Partitioner;

impl Partitioner {
    /// Split `data` into `count` disjoint partitions stratified on `label`.
    ///
    /// Items are grouped by their value of `label` (items without it are
    /// dropped). Each group holding at least `count` items is dealt out
    /// round-robin starting at partition 0, so every partition gets
    /// `floor(m/count)` or `ceil(m/count)` of a group of size `m`. Groups
    /// smaller than `count` are left out of every partition.
    pub fn partition<T>(data: &dyn SizedIterable<T>, label: &str, count: usize) -> Result<Vec<Partition<T>>>
    where
        T: Labeled + Clone + Send + Sync + 'static,
    {
        if count <= 1 {
            return Err(DataError::invalid(format!(
                "The number of partitions must be larger than 1 (got {})",
                count
            )));
        }

        match data.as_shuffle() {
            Some(source) => {
                let mut groups = ValueGroups::default();
                for reference in source.references() {
                    let item = source.dereference(reference)?;
                    if let Some(value) = item.label(label) {
                        groups.push(value, reference.clone());
                    }
                }
                let dealt = groups.deal(label, count)?;
                Ok(dealt
                    .into_iter()
                    .map(|refs| Partition::References(source.new_iterable(refs)))
                    .collect())
            }
            None => {
                let mut groups = ValueGroups::default();
                for item in data.items() {
                    if let Some(value) = item.label(label).map(str::to_string) {
                        groups.push(&value, item);
                    }
                }
                let dealt = groups.deal(label, count)?;
                Ok(dealt
                    .into_iter()
                    .map(|items| Partition::Items(Arc::new(items)))
                    .collect())
            }
        }
    }
}

/// Members grouped by label value, groups kept in first-encounter order
struct ValueGroups<M> {
    index: HashMap<String, usize>,
    groups: Vec<(String, Vec<M>)>,
}

impl<M> Default for ValueGroups<M> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }
}

impl<M> ValueGroups<M> {
    fn push(&mut self, value: &str, member: M) {
        let slot = match self.index.get(value) {
            Some(&slot) => slot,
            None => {
                self.index.insert(value.to_string(), self.groups.len());
                self.groups.push((value.to_string(), Vec::new()));
                self.groups.len() - 1
            }
        };
        self.groups[slot].1.push(member);
    }

    /// Deal each large-enough group round-robin over `count` partitions
    fn deal(self, label: &str, count: usize) -> Result<Vec<Vec<M>>> {
        if self.groups.is_empty() {
            return Err(DataError::invalid(format!(
                "Data does not contain any data with label {}",
                label
            )));
        }

        let mut partitions: Vec<Vec<M>> = (0..count).map(|_| Vec::new()).collect();
        for (value, members) in self.groups {
            if members.len() < count {
                debug!(
                    "Label {} value {} has {} samples, fewer than {} partitions; excluded",
                    label,
                    value,
                    members.len(),
                    count
                );
                continue;
            }
            for (i, member) in members.into_iter().enumerate() {
                partitions[i % count].push(member);
            }
        }
        Ok(partitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterable::ReferenceIterable;
    use crate::window::{DataWindow, LabeledWindow};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn data(values: &[&str]) -> Vec<LabeledWindow> {
        values
            .iter()
            .map(|v| LabeledWindow::with_label(DataWindow::new(vec![0.0; 4], 100.0), "class", v))
            .collect()
    }

    fn ids(part: &Partition<LabeledWindow>) -> Vec<uuid::Uuid> {
        part.items().map(|w| w.window().id()).collect()
    }

    #[test]
    fn test_rejects_single_partition() {
        let source = data(&["a", "b"]);
        assert!(matches!(
            Partitioner::partition(&source, "class", 1),
            Err(DataError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rejects_missing_label() {
        let source = data(&["a", "b"]);
        let err = Partitioner::partition(&source, "other", 2).err().unwrap();
        assert!(err.to_string().contains("other"));
    }

    #[test]
    fn test_round_robin_per_value() {
        let source = ReferenceIterable::from_items(data(&["a", "a", "a", "b", "b", "b", "b", "c"]));
        let parts = Partitioner::partition(&source, "class", 3).unwrap();
        assert_eq!(parts.len(), 3);
        // a: 1,1,1  b: 2,1,1  c excluded
        assert_eq!(parts.iter().map(|p| p.len()).collect::<Vec<_>>(), vec![3, 2, 2]);
        assert!(parts.iter().all(|p| p.as_shuffle().is_some()));
        for part in &parts {
            assert!(part.items().all(|w| w.label("class") != Some("c")));
        }
    }

    #[test]
    fn test_materialized_partitions() {
        let source = data(&["a", "b", "a", "b"]);
        let parts = Partitioner::partition(&source, "class", 2).unwrap();
        assert!(parts.iter().all(|p| p.as_shuffle().is_none()));
        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[1].len(), 2);
    }

    #[test]
    fn test_merge_is_union() {
        let source = ReferenceIterable::from_items(data(&["a", "a", "a", "b", "b", "b"]));
        let parts = Partitioner::partition(&source, "class", 3).unwrap();
        let merged = Partition::merge(&[&parts[0], &parts[2]]);
        assert_eq!(merged.len(), 4);
        assert!(merged.as_shuffle().is_some());

        let mut expected = ids(&parts[0]);
        expected.extend(ids(&parts[2]));
        assert_eq!(ids(&merged), expected);
    }

    proptest! {
        #[test]
        fn partitions_are_balanced_disjoint_and_complete(
            labels in prop::collection::vec(0u8..4, 0..80),
            count in 2usize..6,
        ) {
            let values: Vec<String> = labels.iter().map(|l| format!("v{}", l)).collect();
            let refs: Vec<&str> = values.iter().map(String::as_str).collect();
            let items = data(&refs);
            let source = ReferenceIterable::from_items(items.clone());

            let result = Partitioner::partition(&source, "class", count);
            if items.is_empty() {
                prop_assert!(result.is_err());
                return Ok(());
            }
            let parts = result.unwrap();
            prop_assert_eq!(parts.len(), count);

            let mut seen = HashSet::new();
            for part in &parts {
                for w in part.items() {
                    prop_assert!(seen.insert(w.window().id()));
                }
            }

            for value in values.iter().collect::<HashSet<_>>() {
                let m = values.iter().filter(|v| *v == value).count();
                let per_part: Vec<usize> = parts
                    .iter()
                    .map(|p| p.items().filter(|w| w.label("class") == Some(value.as_str())).count())
                    .collect();
                if m >= count {
                    let lo = *per_part.iter().min().unwrap();
                    let hi = *per_part.iter().max().unwrap();
                    prop_assert!(hi - lo <= 1);
                    prop_assert_eq!(per_part.iter().sum::<usize>(), m);
                } else {
                    prop_assert!(per_part.iter().all(|&c| c == 0));
                }
            }
        }
    }
}
