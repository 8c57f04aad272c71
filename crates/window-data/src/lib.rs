//! Labeled Window Data
//!
//! Labeled data windows and the lazy, re-shufflable iterables used to feed them
//! through balancing, fold partitioning and training.

mod balance;
mod bounded;
mod error;
mod info;
mod iterable;
mod partition;
mod window;

pub use balance::{BalancePolicy, LabelBalancer};
pub use bounded::{bound_references, BoundedIterable, LabelBounds};
pub use error::{DataError, Result};
pub use info::{LabelInfo, LabelValueInfo, TrainingSetInfo};
pub use iterable::{
    shuffle_references, BoxIter, DelegatingShuffleIterable, Reference, ReferenceIterable,
    ShuffleIterable, SizedIterable, DEFAULT_SHUFFLE_SEED,
};
pub use partition::{Partition, Partitioner};
pub use window::{DataWindow, Labeled, LabeledWindow, Labels};
