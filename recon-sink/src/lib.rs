//! Per-schema difference sink.
//!
//! [`DiffSink`] routes each [`recon_types::Difference`] to the report of
//! its schema. Every schema has exactly one writer task, started lazily on
//! the first submission; the writer appends one line per difference to
//! `<schema>_diff_report.csv` and flushes after every line. Shutdown drains
//! every writer and reports per-schema outcomes, so a failing report never
//! takes its siblings down with it.

mod config;
mod error;
mod lane;
pub mod report;
mod sink;
mod writer;

pub use config::SinkConfig;
pub use error::{SinkError, SinkResult};
pub use report::{REPORT_HEADER, report_file_name};
pub use sink::{DiffSink, LaneOutcome, ShutdownReport};
