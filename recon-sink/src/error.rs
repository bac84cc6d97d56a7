//! Error types for the difference sink.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors that can occur in sink operations.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink has been shut down and accepts no more differences.
    #[error("sink is closed")]
    Closed,

    /// Could not start a writer for the schema.
    #[error("no report writer available for schema {0}")]
    Unavailable(String),

    /// No tokio runtime was available to host the writer tasks.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    /// A difference could not be rendered as a report line.
    #[error("failed to encode report line: {0}")]
    Encode(String),

    /// I/O failure on a report file.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SinkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
