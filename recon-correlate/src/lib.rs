//! Correlation of two record streams.
//!
//! A [`Correlator`] matches records from two [`RecordSource`]s by primary
//! key, compares each matched pair with a [`recon_compare::FieldComparator`]
//! and submits the differences to a [`recon_sink::DiffSink`]. In batch mode,
//! records still unmatched after an idle period are reported as missing
//! rows. A [`Reconciler`] runs one correlator per schema over a shared sink
//! and collects their results.

mod config;
mod correlator;
mod error;
mod pending;
mod reconciler;
mod source;

pub use config::{CorrelationConfig, CorrelationMode, SupersededPolicy};
pub use correlator::{CorrelationSummary, Correlator, RunOutcome};
pub use error::{CorrelateError, CorrelateResult, SourceError, SourceResult};
pub use pending::{PendingEntry, PendingSet};
pub use reconciler::{ReconcileReport, Reconciler};
pub use source::{mock, ChannelSource, Pull, RecordSource};
