//! Data Error Types

use thiserror::Error;

/// Errors raised while iterating, balancing or partitioning labeled data
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// Malformed input detected before any work started
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Reference could not be resolved to an item
    #[error("Could not load item for reference: {0}")]
    NotFound(String),
}

impl DataError {
    /// Shorthand for an invalid argument error
    pub fn invalid(msg: impl Into<String>) -> Self {
        DataError::InvalidArgument(msg.into())
    }
}

/// Result alias for data operations
pub type Result<T> = std::result::Result<T, DataError>;
