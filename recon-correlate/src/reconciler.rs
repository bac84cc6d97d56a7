use crate::config::CorrelationConfig;
use crate::correlator::{CorrelationSummary, Correlator};
use crate::error::{CorrelateError, CorrelateResult};
use crate::source::RecordSource;
use recon_compare::SchemaPolicy;
use recon_sink::{DiffSink, ShutdownReport};
use recon_types::RunId;
use std::collections::BTreeMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Outcome of a whole reconciliation: one entry per schema plus the sink's
/// drain report.
#[derive(Debug)]
pub struct ReconcileReport {
    /// A failed or panicked correlator appears as `Err` for its schema only.
    pub schemas: BTreeMap<String, Result<CorrelationSummary, String>>,
    pub sink: ShutdownReport,
}

impl ReconcileReport {
    /// True when every correlator finished and every report drained.
    pub fn is_clean(&self) -> bool {
        self.schemas.values().all(Result::is_ok) && self.sink.is_clean()
    }

    pub fn summary(&self, schema: &str) -> Option<&CorrelationSummary> {
        self.schemas.get(schema).and_then(|r| r.as_ref().ok())
    }
}

/// Supervises one correlator per schema, all writing to one shared sink.
pub struct Reconciler {
    sink: DiffSink,
    cancel: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<CorrelateResult<CorrelationSummary>>)>,
}

impl Reconciler {
    pub fn new(sink: DiffSink) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            sink,
            cancel,
            tasks: Vec::new(),
        }
    }

    pub fn sink(&self) -> &DiffSink {
        &self.sink
    }

    /// Starts correlating `schema` on a new task.
    pub fn spawn<S1, S2>(
        &mut self,
        schema: impl Into<String>,
        policy: SchemaPolicy,
        config: CorrelationConfig,
        side1: S1,
        side2: S2,
    ) -> CorrelateResult<RunId>
    where
        S1: RecordSource + 'static,
        S2: RecordSource + 'static,
    {
        let schema = schema.into();
        if self.tasks.iter().any(|(s, _)| *s == schema) {
            return Err(CorrelateError::DuplicateSchema(schema));
        }
        let correlator = Correlator::new(schema.clone(), policy, self.sink.clone(), config)
            .with_cancel(self.cancel.subscribe());
        let run_id = correlator.run_id();
        self.tasks.push((schema, correlator.spawn(side1, side2)));
        Ok(run_id)
    }

    /// Asks every correlator to stop at its next cycle.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Waits for every correlator, then shuts the sink down.
    pub async fn finish(self) -> ReconcileReport {
        let mut schemas = BTreeMap::new();
        for (schema, handle) in self.tasks {
            let result = match handle.await {
                Ok(Ok(summary)) => Ok(summary),
                Ok(Err(e)) => {
                    error!(schema = %schema, error = %e, "correlator failed");
                    Err(e.to_string())
                }
                Err(e) => {
                    error!(schema = %schema, error = %e, "correlator task failed");
                    Err(format!("correlator task failed: {e}"))
                }
            };
            schemas.insert(schema, result);
        }

        let sink = self.sink.shutdown().await;
        info!(
            schemas = schemas.len(),
            written = sink.total_written(),
            clean = sink.is_clean(),
            "reconciliation finished"
        );
        ReconcileReport { schemas, sink }
    }
}
