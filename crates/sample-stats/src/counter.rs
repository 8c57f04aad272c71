//! Sample and Duration Counters

use serde::{Deserialize, Serialize};

/// Running count of samples and their total duration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleCounter {
    /// Number of samples seen
    total_samples: usize,
    /// Sum of sample durations (milliseconds)
    total_msec: f64,
}

impl SampleCounter {
    /// Create an empty counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one sample of the given duration
    pub fn add_sample(&mut self, duration_msec: f64) {
        self.total_samples += 1;
        self.total_msec += duration_msec;
    }

    /// Merge two counters into a new one
    pub fn combine(&self, other: &SampleCounter) -> SampleCounter {
        SampleCounter {
            total_samples: self.total_samples + other.total_samples,
            total_msec: self.total_msec + other.total_msec,
        }
    }

    /// Get the number of samples
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Get the total duration in milliseconds
    pub fn total_msec(&self) -> f64 {
        self.total_msec
    }

    /// Get the mean sample duration, 0 when empty
    pub fn average_msec(&self) -> f64 {
        if self.total_samples == 0 {
            0.0
        } else {
            self.total_msec / self.total_samples as f64
        }
    }
}

/// Render milliseconds as `hh:mm:ss.sss`
pub fn format_msec(msec: f64) -> String {
    let total_secs = (msec.max(0.0)) / 1000.0;
    let hours = (total_secs / 3600.0).floor();
    let minutes = ((total_secs - hours * 3600.0) / 60.0).floor();
    let seconds = total_secs - hours * 3600.0 - minutes * 60.0;
    format!("{:02}:{:02}:{:06.3}", hours as u64, minutes as u64, seconds)
}
