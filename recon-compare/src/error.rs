//! Error types for record comparison.

use thiserror::Error;

/// Result type for comparison operations.
pub type CompareResult<T> = Result<T, CompareError>;

/// Errors that can occur while comparing a pair of records.
#[derive(Debug, Error)]
pub enum CompareError {
    /// The policy could not extract a primary key from a record.
    #[error("record has no usable primary key")]
    MissingPrimaryKey,

    /// The two records do not share a primary key.
    #[error("primary keys differ: {left} vs {right}")]
    KeyMismatch { left: String, right: String },
}
