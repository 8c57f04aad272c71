//! Per-label-value Count Bounding

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::error::{DataError, Result};
use crate::info::TrainingSetInfo;
use crate::iterable::{BoxIter, Reference, ShuffleIterable, SizedIterable};
use crate::window::Labeled;

/// Limits on how many items of each label value pass through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelBounds {
    /// Label whose values are counted
    pub label: String,
    /// Values with fewer samples than this are dropped entirely (0 disables)
    pub min: usize,
    /// At most this many items per value pass
    pub max: usize,
    /// If set, only these values pass
    pub allowed_values: Option<BTreeSet<String>>,
}

impl LabelBounds {
    /// Cap every value of `label` at `max` items
    pub fn new(label: &str, max: usize) -> Self {
        Self {
            label: label.to_string(),
            min: 0,
            max,
            allowed_values: None,
        }
    }

    /// Require at least `min` samples of a value for it to pass at all
    pub fn with_min(mut self, min: usize) -> Self {
        self.min = min;
        self
    }

    /// Only pass the given values
    pub fn with_allowed_values<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.min > self.max {
            return Err(DataError::invalid(format!(
                "Minimum count {} must not exceed maximum count {}",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Resolve the values allowed through, scanning the items only when a minimum is set
    fn resolve_allowed(
        &self,
        scan: impl FnOnce() -> Result<TrainingSetInfo>,
    ) -> Result<Option<Arc<BTreeSet<String>>>> {
        if self.min == 0 {
            return Ok(self.allowed_values.clone().map(Arc::new));
        }

        let info = scan()?;
        let frequent: BTreeSet<String> = info
            .label_info(&self.label)
            .map(|label| {
                label
                    .values
                    .values()
                    .filter(|v| v.counter.total_samples() >= self.min)
                    .map(|v| v.value.clone())
                    .collect()
            })
            .unwrap_or_default();

        let allowed = match &self.allowed_values {
            Some(list) => frequent.intersection(list).cloned().collect(),
            None => frequent,
        };
        debug!("Label {} values with at least {} samples: {:?}", self.label, self.min, allowed);
        Ok(Some(Arc::new(allowed)))
    }
}

/// Stateful per-cursor filter counting accepted items per value
struct ValueCapFilter {
    label: String,
    max: usize,
    allowed: Option<Arc<BTreeSet<String>>>,
    counts: HashMap<String, usize>,
}

impl ValueCapFilter {
    fn new(label: &str, max: usize, allowed: Option<Arc<BTreeSet<String>>>) -> Self {
        Self {
            label: label.to_string(),
            max,
            allowed,
            counts: HashMap::new(),
        }
    }

    fn accept<T: Labeled>(&mut self, item: &T) -> bool {
        let Some(value) = item.label(&self.label) else {
            return false;
        };
        if let Some(allowed) = &self.allowed {
            if !allowed.contains(value) {
                return false;
            }
        }
        let count = self.counts.entry(value.to_string()).or_insert(0);
        if *count >= self.max {
            return false;
        }
        *count += 1;
        true
    }
}

/// Streaming view passing at most `max` items per label value
pub struct BoundedIterable<T> {
    /// Underlying items
    source: Arc<dyn SizedIterable<T>>,
    /// Counted label
    label: String,
    /// Per-value cap
    max: usize,
    /// Values allowed through, `None` for all
    allowed: Option<Arc<BTreeSet<String>>>,
}

impl<T: Labeled + Clone + Send + Sync + 'static> BoundedIterable<T> {
    /// Create a new bounded view. Scans `source` once if `bounds.min > 0`.
    pub fn new(source: Arc<dyn SizedIterable<T>>, bounds: LabelBounds) -> Result<Self> {
        bounds.validate()?;
        let allowed = bounds.resolve_allowed(|| Ok(TrainingSetInfo::scan(source.items())))?;
        Ok(Self {
            source,
            label: bounds.label,
            max: bounds.max,
            allowed,
        })
    }
}

impl<T: Labeled + Clone + Send + Sync + 'static> SizedIterable<T> for BoundedIterable<T> {
    fn items(&self) -> BoxIter<'_, T> {
        let mut filter = ValueCapFilter::new(&self.label, self.max, self.allowed.clone());
        Box::new(self.source.items().filter(move |item| filter.accept(item)))
    }
}

/// Select the references of `source` that pass the bounds, in order.
pub fn bound_references<T>(source: &dyn ShuffleIterable<T>, bounds: &LabelBounds) -> Result<Arc<dyn ShuffleIterable<T>>>
where
    T: Labeled + Clone + Send + Sync + 'static,
{
    bounds.validate()?;
    let references = source.references();
    let allowed = bounds.resolve_allowed(|| {
        let mut info = TrainingSetInfo::new();
        for r in references {
            info.add(&source.dereference(r)?);
        }
        Ok(info)
    })?;

    let mut filter = ValueCapFilter::new(&bounds.label, bounds.max, allowed);
    let mut selected: Vec<Reference> = Vec::new();
    for r in references {
        if filter.accept(&source.dereference(r)?) {
            selected.push(r.clone());
        }
    }
    debug!("Bounded {} of {} references on label {}", selected.len(), references.len(), bounds.label);
    Ok(source.new_iterable(selected))
}
