//! Error types for correlation and record sources.

use recon_types::Side;
use thiserror::Error;

/// Result type for correlation runs.
pub type CorrelateResult<T> = Result<T, CorrelateError>;

/// Result type for record sources.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that end a correlation run.
#[derive(Debug, Error)]
pub enum CorrelateError {
    /// A source failed to deliver. Fatal for the run; the caller decides
    /// whether to restart it.
    #[error("{side} source failed: {source}")]
    Source {
        side: Side,
        #[source]
        source: SourceError,
    },

    /// A correlator for this schema is already registered.
    #[error("schema already has a correlator: {0}")]
    DuplicateSchema(String),
}

/// Errors raised by a [`crate::RecordSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An input could not be turned into a record.
    #[error("malformed record at line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: recon_types::Error,
    },

    /// Transport-specific failure.
    #[error("source failed: {0}")]
    Failed(String),
}
