//! Dataset Summaries

use sample_stats::{format_msec, SampleCounter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::window::Labeled;

/// Counts for one value of one label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelValueInfo {
    /// The label value
    pub value: String,
    /// Samples carrying this value
    pub counter: SampleCounter,
}

/// Counts for one label name, broken down by value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelInfo {
    /// The label name
    pub name: String,
    /// Samples carrying this label
    pub counter: SampleCounter,
    /// Per-value breakdown, sorted by value
    pub values: BTreeMap<String, LabelValueInfo>,
}

impl LabelInfo {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            counter: SampleCounter::new(),
            values: BTreeMap::new(),
        }
    }

    /// Get the info for one value
    pub fn value_info(&self, value: &str) -> Option<&LabelValueInfo> {
        self.values.get(value)
    }

    /// Sample count per value
    pub fn value_counts(&self) -> BTreeMap<&str, usize> {
        self.values
            .iter()
            .map(|(v, info)| (v.as_str(), info.counter.total_samples()))
            .collect()
    }

    /// Get the total duration of samples carrying this label (milliseconds)
    pub fn total_msec(&self) -> f64 {
        self.counter.total_msec()
    }

    /// Multi-line description of this label and its values
    pub fn pretty_format(&self) -> String {
        let mut out = format!(
            "Label: {}, {} samples, {} value(s), {} hr:min:sec\n",
            self.name,
            self.counter.total_samples(),
            self.values.len(),
            format_msec(self.counter.total_msec())
        );
        for info in self.values.values() {
            let _ = writeln!(
                out,
                "  Value: {}, {} samples, {} hr:min:sec",
                info.value,
                info.counter.total_samples(),
                format_msec(info.counter.total_msec())
            );
        }
        out
    }
}

/// Summary of a labeled dataset, computed by scanning it once
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSetInfo {
    /// All samples
    totals: SampleCounter,
    /// Per label name, sorted by name
    labels: BTreeMap<String, LabelInfo>,
}

impl TrainingSetInfo {
    /// Create an empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every item
    pub fn scan<T: Labeled>(items: impl IntoIterator<Item = T>) -> Self {
        let mut info = Self::new();
        for item in items {
            info.add(&item);
        }
        info
    }

    /// Count one item under each of its labels
    pub fn add<T: Labeled + ?Sized>(&mut self, item: &T) {
        let duration = item.duration_msec();
        self.totals.add_sample(duration);
        for (name, value) in item.labels() {
            let label = self
                .labels
                .entry(name.clone())
                .or_insert_with(|| LabelInfo::new(name));
            label.counter.add_sample(duration);
            label
                .values
                .entry(value.clone())
                .or_insert_with(|| LabelValueInfo {
                    value: value.clone(),
                    counter: SampleCounter::new(),
                })
                .counter
                .add_sample(duration);
        }
    }

    /// Get the number of samples scanned
    pub fn total_samples(&self) -> usize {
        self.totals.total_samples()
    }

    /// Get the total duration scanned (milliseconds)
    pub fn total_msec(&self) -> f64 {
        self.totals.total_msec()
    }

    /// Label names seen, sorted
    pub fn label_names(&self) -> Vec<&str> {
        self.labels.keys().map(String::as_str).collect()
    }

    /// Get info for one label name
    pub fn label_info(&self, name: &str) -> Option<&LabelInfo> {
        self.labels.get(name)
    }

    /// Remove a label from the summary, returning its info
    pub fn remove_label(&mut self, name: &str) -> Option<LabelInfo> {
        self.labels.remove(name)
    }

    /// Multi-line description of the dataset
    pub fn pretty_format(&self) -> String {
        let mut out = format!(
            "Total: {} samples, {} label(s), {} hr:min:sec\n",
            self.totals.total_samples(),
            self.labels.len(),
            format_msec(self.totals.total_msec())
        );
        for label in self.labels.values() {
            out.push_str(&label.pretty_format());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{DataWindow, LabeledWindow, Labels};

    fn window(pairs: &[(&str, &str)], samples: usize) -> LabeledWindow {
        let labels: Labels = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LabeledWindow::new(DataWindow::new(vec![0.0; samples], 1000.0), labels)
    }

    #[test]
    fn test_scan_counts() {
        let data = vec![
            window(&[("state", "on"), ("site", "a")], 1000),
            window(&[("state", "on")], 1000),
            window(&[("state", "off")], 500),
            window(&[], 100),
        ];
        let info = TrainingSetInfo::scan(data);

        assert_eq!(info.total_samples(), 4);
        assert!((info.total_msec() - 2600.0).abs() < 0.001);
        assert_eq!(info.label_names(), vec!["site", "state"]);

        let state = info.label_info("state").unwrap();
        assert_eq!(state.counter.total_samples(), 3);
        assert_eq!(state.value_counts().get("on"), Some(&2));
        assert_eq!(state.value_counts().get("off"), Some(&1));
        assert!((state.value_info("off").unwrap().counter.total_msec() - 500.0).abs() < 0.001);
    }

    #[test]
    fn test_remove_label() {
        let mut info = TrainingSetInfo::scan(vec![window(&[("a", "1"), ("b", "2")], 10)]);
        assert!(info.remove_label("a").is_some());
        assert_eq!(info.label_names(), vec!["b"]);
        assert!(info.remove_label("a").is_none());
    }

    #[test]
    fn test_pretty_format() {
        let info = TrainingSetInfo::scan(vec![window(&[("state", "on")], 2000)]);
        let text = info.pretty_format();
        assert!(text.starts_with("Total: 1 samples, 1 label(s), 00:00:02.000 hr:min:sec"));
        assert!(text.contains("Label: state, 1 samples, 1 value(s)"));
        assert!(text.contains("  Value: on, 1 samples"));
    }
}
