//! Label Balancing
//!
//! Evens out how many items each value of a label contributes, either by
//! truncating frequent values or by repeating rare ones on a fixed schedule.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::bounded::{bound_references, LabelBounds};
use crate::error::{DataError, Result};
use crate::iterable::{Reference, ReferenceIterable, ShuffleIterable, SizedIterable};
use crate::window::Labeled;

/// How per-value counts are evened out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalancePolicy {
    /// Truncate every value to the count of the least frequent value
    DownSample,
    /// Repeat items of every value up to the count of the most frequent value
    UpSample,
    /// Level every value to exactly this many items
    Count(usize),
}

/// Balances the values of one label
pub struct LabelBalancer {
    /// Label whose values are balanced
    label: String,
    /// Balancing policy
    policy: BalancePolicy,
    /// Whether the in-memory fallback was already reported
    warned: AtomicBool,
}

impl LabelBalancer {
    /// Create a new balancer
    pub fn new(label: &str, policy: BalancePolicy) -> Self {
        Self {
            label: label.to_string(),
            policy,
            warned: AtomicBool::new(false),
        }
    }

    /// Get the balanced label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Get the policy
    pub fn policy(&self) -> BalancePolicy {
        self.policy
    }

    /// Produce a balanced view of `data`.
    ///
    /// Items lacking the label are dropped. Sources without references are
    /// first collected into memory.
    pub fn balance<T>(&self, data: &dyn SizedIterable<T>) -> Result<Arc<dyn ShuffleIterable<T>>>
    where
        T: Labeled + Clone + Send + Sync + 'static,
    {
        if self.policy == BalancePolicy::Count(0) {
            return Err(DataError::invalid("Balanced count per label value must be larger than 0"));
        }

        let source: Arc<dyn ShuffleIterable<T>> = match data.as_shuffle() {
            Some(shuffle) => shuffle.new_iterable(shuffle.references().to_vec()),
            None => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    warn!("Balancing data without references requires holding all of it in memory");
                }
                ReferenceIterable::from_items(data.items().collect()).into_shared()
            }
        };

        let labeled = labeled_references(source.as_ref(), &self.label)?;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (_, value) in &labeled {
            *counts.entry(value.as_str()).or_insert(0) += 1;
        }
        let (Some(&min), Some(&max)) = (counts.values().min(), counts.values().max()) else {
            debug!("No items with label {} to balance", self.label);
            return Ok(source.new_iterable(Vec::new()));
        };

        let target = match self.policy {
            BalancePolicy::DownSample => {
                debug!("Down-sampling {} values of label {} to {} each", counts.len(), self.label, min);
                return bound_references(source.as_ref(), &LabelBounds::new(&self.label, min));
            }
            BalancePolicy::UpSample => max,
            BalancePolicy::Count(count) => count,
        };

        debug!("Leveling {} values of label {} to {} each", counts.len(), self.label, target);
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut leveled = Vec::with_capacity(counts.len() * target);
        for (reference, value) in &labeled {
            let n = counts[value.as_str()];
            let k = seen.entry(value.as_str()).or_insert(0);
            *k += 1;
            for _ in 0..emission_count(*k, n, target) {
                leveled.push(reference.clone());
            }
        }
        Ok(source.new_iterable(leveled))
    }
}

/// Pair each reference with its value of `label`, skipping unlabeled items
fn labeled_references<T: Labeled>(source: &dyn ShuffleIterable<T>, label: &str) -> Result<Vec<(Reference, String)>> {
    let mut labeled = Vec::new();
    for reference in source.references() {
        let item = source.dereference(reference)?;
        if let Some(value) = item.label(label) {
            labeled.push((reference.clone(), value.to_string()));
        }
    }
    Ok(labeled)
}

/// Times the k-th (1-based) of `n` items is emitted when leveling to `target`.
///
/// Equals `round(k*target/n) - round((k-1)*target/n)`, so the counts over a
/// full pass sum to exactly `target` and the repeats are spread evenly.
fn emission_count(k: usize, n: usize, target: usize) -> usize {
    let rounded = |i: usize| (2 * i * target + n) / (2 * n);
    rounded(k) - rounded(k - 1)
}
