use crate::config::SinkConfig;
use crate::error::{SinkError, SinkResult};
use crate::lane::{self, Batch, LaneContext};
use crate::report::report_file_name;
use futures::future::join_all;
use futures::FutureExt;
use recon_types::Difference;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::SendError, UnboundedSender};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Times a submission may find its lane dead and provision a new one
/// before giving up.
const PROVISION_ATTEMPTS: usize = 3;

/// How one schema's writer(s) ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LaneOutcome {
    /// Drained and closed normally.
    Closed { written: u64 },
    /// A write failed; `dropped` differences were accepted but never written.
    Failed {
        written: u64,
        dropped: u64,
        error: String,
    },
    /// Did not finish draining within the deadline and was aborted.
    DrainTimedOut,
}

impl LaneOutcome {
    pub fn written(&self) -> u64 {
        match self {
            LaneOutcome::Closed { written } | LaneOutcome::Failed { written, .. } => *written,
            LaneOutcome::DrainTimedOut => 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, LaneOutcome::Closed { .. })
    }

    /// Combines the outcomes of successive writers of the same schema.
    #[must_use]
    pub fn merge(self, other: LaneOutcome) -> LaneOutcome {
        use LaneOutcome::*;
        match (self, other) {
            (DrainTimedOut, _) | (_, DrainTimedOut) => DrainTimedOut,
            (Closed { written: a }, Closed { written: b }) => Closed { written: a + b },
            (Closed { written: w }, Failed { written, dropped, error })
            | (Failed { written, dropped, error }, Closed { written: w }) => Failed {
                written: written + w,
                dropped,
                error,
            },
            (
                Failed {
                    written: w1,
                    dropped: d1,
                    error,
                },
                Failed {
                    written: w2,
                    dropped: d2,
                    ..
                },
            ) => Failed {
                written: w1 + w2,
                dropped: d1 + d2,
                error,
            },
        }
    }
}

/// Result of [`DiffSink::shutdown`]: one outcome per schema that had a
/// writer during the sink's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub schemas: BTreeMap<String, LaneOutcome>,
}

impl ShutdownReport {
    /// True when every writer drained and closed normally.
    pub fn is_clean(&self) -> bool {
        self.schemas.values().all(LaneOutcome::is_clean)
    }

    pub fn outcome(&self, schema: &str) -> Option<&LaneOutcome> {
        self.schemas.get(schema)
    }

    pub fn total_written(&self) -> u64 {
        self.schemas.values().map(LaneOutcome::written).sum()
    }

    fn record(&mut self, schema: String, outcome: LaneOutcome) {
        let merged = match self.schemas.remove(&schema) {
            Some(previous) => previous.merge(outcome),
            None => outcome,
        };
        self.schemas.insert(schema, merged);
    }
}

struct Lane {
    generation: u64,
    tx: UnboundedSender<Batch>,
    handle: JoinHandle<LaneOutcome>,
}

/// Schema → live lane, plus the handles of lanes that already left.
#[derive(Default)]
pub(crate) struct Registry {
    lanes: HashMap<String, Lane>,
    retired: Vec<(String, JoinHandle<LaneOutcome>)>,
    /// Outcomes of retired lanes whose handles were already collected.
    settled: ShutdownReport,
    provisioned: u64,
    closed: bool,
}

impl Registry {
    /// Removes the live lane for `schema`, if it is the given generation (or
    /// any generation when `None`). Dropping the sender lets it drain.
    pub(crate) fn detach(&mut self, schema: &str, generation: Option<u64>) -> bool {
        let matches = self
            .lanes
            .get(schema)
            .is_some_and(|lane| generation.is_none_or(|g| g == lane.generation));
        if !matches {
            return false;
        }
        if let Some(lane) = self.lanes.remove(schema) {
            self.retired.push((schema.to_string(), lane.handle));
        }
        true
    }

    /// Collects the outcomes of retired lanes that have ended and drops
    /// their handles. Lanes still draining stay in `retired`.
    fn prune_retired(&mut self) {
        let mut still_running = Vec::with_capacity(self.retired.len());
        for (schema, mut handle) in self.retired.drain(..) {
            if !handle.is_finished() {
                still_running.push((schema, handle));
                continue;
            }
            match (&mut handle).now_or_never() {
                Some(joined) => self.settled.record(schema, joined_outcome(joined)),
                None => still_running.push((schema, handle)),
            }
        }
        self.retired = still_running;
    }
}

fn joined_outcome(joined: Result<LaneOutcome, JoinError>) -> LaneOutcome {
    joined.unwrap_or_else(|e| LaneOutcome::Failed {
        written: 0,
        dropped: 0,
        error: format!("report writer task failed: {e}"),
    })
}

/// Locks the registry. A panic while holding the lock cannot leave it
/// half-updated, so poisoning is ignored.
pub(crate) fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    config: SinkConfig,
    runtime: Handle,
    registry: Arc<Mutex<Registry>>,
}

/// Per-schema difference sink.
///
/// Each schema gets one unbounded queue and exactly one writer task,
/// created on the first submission for that schema. Submissions never
/// block. Lifecycle is construct → submit* → [`DiffSink::shutdown`].
///
/// `DiffSink` is a cheap handle; clones share the same writers.
#[derive(Clone)]
pub struct DiffSink {
    inner: Arc<Inner>,
}

impl DiffSink {
    /// Creates a sink whose writers run on the current tokio runtime.
    pub fn new(config: SinkConfig) -> SinkResult<Self> {
        let runtime = Handle::try_current().map_err(|e| SinkError::NoRuntime(e.to_string()))?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Creates a sink whose writers run on `runtime`.
    pub fn with_runtime(config: SinkConfig, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                runtime,
                registry: Arc::new(Mutex::new(Registry::default())),
            }),
        }
    }

    pub fn config(&self) -> &SinkConfig {
        &self.inner.config
    }

    /// Enqueues one difference for `schema`.
    pub fn submit(&self, schema: &str, diff: Difference) -> SinkResult<()> {
        self.submit_all(schema, std::iter::once(diff)).map(|_| ())
    }

    /// Enqueues a batch for `schema`. The batch lands contiguously and in
    /// order; returns how many differences were accepted.
    ///
    /// The batch is collected before the registry is locked, and the lock
    /// covers only the lane lookup and one queue send.
    pub fn submit_all<I>(&self, schema: &str, diffs: I) -> SinkResult<usize>
    where
        I: IntoIterator<Item = Difference>,
    {
        let batch: Batch = diffs.into_iter().collect();
        let accepted = batch.len();
        let mut registry = lock(&self.inner.registry);
        if registry.closed {
            return Err(SinkError::Closed);
        }
        if accepted > 0 {
            self.send(&mut registry, schema, batch)?;
        }
        Ok(accepted)
    }

    fn send(&self, registry: &mut Registry, schema: &str, batch: Batch) -> SinkResult<()> {
        let mut pending = batch;
        for _ in 0..PROVISION_ATTEMPTS {
            if !registry.lanes.contains_key(schema) {
                self.provision(registry, schema);
            }
            let Some(lane) = registry.lanes.get(schema) else {
                break;
            };
            match lane.tx.send(pending) {
                Ok(()) => return Ok(()),
                Err(SendError(returned)) => {
                    warn!(schema, "report writer gone, provisioning a new one");
                    pending = returned;
                    registry.detach(schema, None);
                }
            }
        }
        Err(SinkError::Unavailable(schema.to_string()))
    }

    fn provision(&self, registry: &mut Registry, schema: &str) {
        registry.prune_retired();
        registry.provisioned += 1;
        let generation = registry.provisioned;
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = LaneContext {
            schema: schema.to_string(),
            generation,
            dir: self.inner.config.output_dir.clone(),
            file_name: report_file_name(schema),
            config: self.inner.config.clone(),
            registry: Arc::downgrade(&self.inner.registry),
        };
        info!(
            schema,
            generation,
            file = %ctx.file_name,
            "starting report writer"
        );
        let handle = self.inner.runtime.spawn(lane::run(ctx, rx));
        registry.lanes.insert(
            schema.to_string(),
            Lane {
                generation,
                tx,
                handle,
            },
        );
    }

    /// Schemas with a live writer, sorted.
    pub fn schemas(&self) -> Vec<String> {
        let registry = lock(&self.inner.registry);
        let mut schemas: Vec<String> = registry.lanes.keys().cloned().collect();
        schemas.sort();
        schemas
    }

    /// Writers started so far, across all schemas and restarts.
    pub fn lanes_provisioned(&self) -> u64 {
        lock(&self.inner.registry).provisioned
    }

    /// Writers that left the registry but whose outcome has not been
    /// collected yet.
    pub fn retired_writers(&self) -> usize {
        lock(&self.inner.registry).retired.len()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner.registry).closed
    }

    /// Stops accepting submissions and drains every writer.
    ///
    /// Each writer finishes everything already queued before it closes its
    /// report. Writers still running after the drain deadline are aborted
    /// and reported as [`LaneOutcome::DrainTimedOut`]. A failure in one
    /// schema never affects another. Calling this again returns an empty
    /// report.
    pub async fn shutdown(&self) -> ShutdownReport {
        let (handles, settled) = {
            let mut registry = lock(&self.inner.registry);
            registry.closed = true;
            let mut handles: Vec<(String, JoinHandle<LaneOutcome>)> = registry
                .lanes
                .drain()
                .map(|(schema, lane)| (schema, lane.handle))
                .collect();
            handles.append(&mut registry.retired);
            (handles, std::mem::take(&mut registry.settled))
        };

        let deadline = self.inner.config.drain_deadline();
        let outcomes = join_all(handles.into_iter().map(|(schema, mut handle)| async move {
            let outcome = match timeout(deadline, &mut handle).await {
                Ok(joined) => joined_outcome(joined),
                Err(_) => {
                    handle.abort();
                    LaneOutcome::DrainTimedOut
                }
            };
            (schema, outcome)
        }))
        .await;

        let mut report = settled;
        for (schema, outcome) in outcomes {
            report.record(schema, outcome);
        }
        for (schema, outcome) in &report.schemas {
            match outcome {
                LaneOutcome::Closed { written } => {
                    info!(schema = %schema, written, "report closed");
                }
                LaneOutcome::Failed {
                    written,
                    dropped,
                    error,
                } => {
                    error!(schema = %schema, written, dropped, error = %error, "report incomplete");
                }
                LaneOutcome::DrainTimedOut => {
                    error!(schema = %schema, "report writer did not drain in time");
                }
            }
        }
        report
    }
}

impl fmt::Debug for DiffSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffSink")
            .field("config", &self.inner.config)
            .field("schemas", &self.schemas())
            .finish_non_exhaustive()
    }
}
