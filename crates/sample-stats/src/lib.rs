//! Sample Statistics
//!
//! Combinable running statistics used to summarize datasets and evaluation results.

mod counter;
mod online;

pub use counter::{format_msec, SampleCounter};
pub use online::OnlineStats;
