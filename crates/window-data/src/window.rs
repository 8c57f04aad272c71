//! Data Windows and Labels

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Named labels attached to a window (label name -> label value)
pub type Labels = BTreeMap<String, String>;

/// Anything carrying labels and an intrinsic duration
pub trait Labeled {
    /// All labels of the item
    fn labels(&self) -> &Labels;

    /// Duration covered by the item (milliseconds)
    fn duration_msec(&self) -> f64;

    /// Value of a single label, if present
    fn label(&self, name: &str) -> Option<&str> {
        self.labels().get(name).map(String::as_str)
    }
}

/// A fixed-duration slice of sampled sensor data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataWindow {
    /// Identity of the window, used to key cached features
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    /// Start time of the first sample (milliseconds)
    #[serde(default)]
    start_msec: f64,
    /// Sampling rate (Hz)
    sampling_rate: f64,
    /// Sample values, shared between clones
    samples: Arc<[f64]>,
}

impl DataWindow {
    /// Create a new window starting at time 0 with a fresh identity
    pub fn new(samples: Vec<f64>, sampling_rate: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_msec: 0.0,
            sampling_rate,
            samples: samples.into(),
        }
    }

    /// Set the start time
    pub fn with_start_msec(mut self, start_msec: f64) -> Self {
        self.start_msec = start_msec;
        self
    }

    /// Get the window identity
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the sample values
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Get the sampling rate (Hz)
    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Get the start time (milliseconds)
    pub fn start_msec(&self) -> f64 {
        self.start_msec
    }

    /// Get the duration (milliseconds)
    pub fn duration_msec(&self) -> f64 {
        if self.sampling_rate <= 0.0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sampling_rate * 1000.0
    }

    /// Get the samples covering `[offset, offset + duration)` relative to the window start.
    ///
    /// The range is clipped to the window; an empty slice is returned past the end.
    pub fn sample_range(&self, offset_msec: f64, duration_msec: f64) -> &[f64] {
        let per_msec = self.sampling_rate / 1000.0;
        let len = self.samples.len();
        let start = ((offset_msec.max(0.0) * per_msec).round() as usize).min(len);
        let end = (((offset_msec + duration_msec).max(0.0) * per_msec).round() as usize).min(len);
        &self.samples[start..end.max(start)]
    }
}

/// A data window paired with its labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledWindow {
    /// Label name -> value
    #[serde(default)]
    labels: Labels,
    /// The raw data
    window: DataWindow,
}

impl LabeledWindow {
    /// Create a new labeled window
    pub fn new(window: DataWindow, labels: Labels) -> Self {
        Self { labels, window }
    }

    /// Create a labeled window carrying a single label
    pub fn with_label(window: DataWindow, name: &str, value: &str) -> Self {
        let mut labels = Labels::new();
        labels.insert(name.to_string(), value.to_string());
        Self::new(window, labels)
    }

    /// Get the raw data window
    pub fn window(&self) -> &DataWindow {
        &self.window
    }
}

impl<T: Labeled + ?Sized> Labeled for &T {
    fn labels(&self) -> &Labels {
        (**self).labels()
    }

    fn duration_msec(&self) -> f64 {
        (**self).duration_msec()
    }
}

impl Labeled for LabeledWindow {
    fn labels(&self) -> &Labels {
        &self.labels
    }

    fn duration_msec(&self) -> f64 {
        self.window.duration_msec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let window = DataWindow::new(vec![0.0; 500], 1000.0);
        assert!((window.duration_msec() - 500.0).abs() < 0.001);
    }

    #[test]
    fn test_sample_range_clipped() {
        let window = DataWindow::new((0..10).map(|v| v as f64).collect(), 1000.0);
        assert_eq!(window.sample_range(2.0, 3.0), &[2.0, 3.0, 4.0]);
        assert_eq!(window.sample_range(8.0, 5.0), &[8.0, 9.0]);
        assert!(window.sample_range(20.0, 5.0).is_empty());
    }

    #[test]
    fn test_label_lookup() {
        let lw = LabeledWindow::with_label(DataWindow::new(vec![1.0], 10.0), "state", "idle");
        assert_eq!(lw.label("state"), Some("idle"));
        assert_eq!(lw.label("missing"), None);
    }

    #[test]
    fn test_json_without_id() {
        let json = r#"{"labels":{"state":"on"},"window":{"sampling_rate":100.0,"samples":[1.0,2.0]}}"#;
        let lw: LabeledWindow = serde_json::from_str(json).unwrap();
        assert_eq!(lw.label("state"), Some("on"));
        assert_eq!(lw.window().samples().len(), 2);
        assert!(!lw.window().id().is_nil());
    }
}
