//! Key-based correlation of two record streams.
//!
//! Each cycle pulls at most one record from side 1, then one from side 2.
//! A record whose key is already pending on the opposite side is matched
//! immediately: both leave their pending sets and the pair is compared.
//! Otherwise it waits in its own side's pending set. When both pulls come
//! back empty the loop sleeps for the backoff, which is also where a
//! cancellation request is noticed without delay.

use crate::config::{CorrelationConfig, CorrelationMode};
use crate::error::{CorrelateError, CorrelateResult};
use crate::pending::PendingSet;
use crate::source::{Pull, RecordSource};
use recon_compare::{FieldComparator, SchemaPolicy};
use recon_sink::DiffSink;
use recon_types::{Difference, Record, RunId, Side};
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Batch mode saw no data for longer than the idle timeout.
    IdleTimeout,
    /// Cancellation was requested.
    Cancelled,
    /// Both sources reported end of stream.
    SourcesClosed,
}

/// Counters for one finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelationSummary {
    pub run_id: RunId,
    pub schema: String,
    pub outcome: RunOutcome,
    pub pulled_side1: u64,
    pub pulled_side2: u64,
    /// Pairs handed to the comparator.
    pub matched: u64,
    /// `VALUE_MISMATCH` differences accepted by the sink.
    pub differences: u64,
    /// `MISSING_ROW` differences accepted by the sink.
    pub missing_rows: u64,
    /// Records or pairs that could not be compared (no key, failing policy).
    pub comparison_failures: u64,
    /// Differences the sink refused.
    pub sink_rejections: u64,
    /// Pending records replaced by a newer version of the same key.
    pub superseded: u64,
    /// Pending records dropped without being reported.
    pub discarded: u64,
}

impl CorrelationSummary {
    fn new(run_id: RunId, schema: &str) -> Self {
        Self {
            run_id,
            schema: schema.to_string(),
            outcome: RunOutcome::Cancelled,
            pulled_side1: 0,
            pulled_side2: 0,
            matched: 0,
            differences: 0,
            missing_rows: 0,
            comparison_failures: 0,
            sink_rejections: 0,
            superseded: 0,
            discarded: 0,
        }
    }
}

/// Cancellation as seen by a run. A dropped sender without a prior
/// request means "never cancelled".
struct CancelSignal(Option<watch::Receiver<bool>>);

impl CancelSignal {
    fn is_requested(&self) -> bool {
        self.0.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleeps for `period`, returning early if cancellation is requested.
    async fn sleep(&mut self, period: Duration) {
        let Some(rx) = self.0.as_mut() else {
            sleep(period).await;
            return;
        };
        let sender_gone = tokio::select! {
            () = sleep(period) => false,
            changed = rx.changed() => changed.is_err(),
        };
        if sender_gone && !*rx.borrow() {
            self.0 = None;
        }
    }
}

/// Correlates one schema's two streams and reports differences to a sink.
pub struct Correlator {
    schema: String,
    comparator: FieldComparator,
    sink: DiffSink,
    config: CorrelationConfig,
    cancel: CancelSignal,
    run_id: RunId,
}

impl Correlator {
    pub fn new(
        schema: impl Into<String>,
        policy: SchemaPolicy,
        sink: DiffSink,
        config: CorrelationConfig,
    ) -> Self {
        Self {
            schema: schema.into(),
            comparator: FieldComparator::new(policy),
            sink,
            config,
            cancel: CancelSignal(None),
            run_id: RunId::new(),
        }
    }

    /// Stops the run once `true` is published on `cancel`.
    #[must_use]
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = CancelSignal(Some(cancel));
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Runs the correlation on a new task.
    pub fn spawn<S1, S2>(self, side1: S1, side2: S2) -> JoinHandle<CorrelateResult<CorrelationSummary>>
    where
        S1: RecordSource + 'static,
        S2: RecordSource + 'static,
    {
        tokio::spawn(self.run(side1, side2))
    }

    /// Runs until the idle timeout (batch), cancellation, or both sources
    /// closing. A source error ends the run with [`CorrelateError::Source`].
    pub async fn run<S1, S2>(mut self, mut side1: S1, mut side2: S2) -> CorrelateResult<CorrelationSummary>
    where
        S1: RecordSource,
        S2: RecordSource,
    {
        info!(
            run_id = %self.run_id,
            schema = %self.schema,
            mode = ?self.config.mode,
            "correlation started"
        );
        let mut state = RunState::new(&self);
        let mut open = [true, true];

        let outcome = loop {
            if self.cancel.is_requested() {
                break RunOutcome::Cancelled;
            }

            let mut received = false;
            for side in [Side::One, Side::Two] {
                let slot = side_index(side);
                if !open[slot] {
                    continue;
                }
                let pulled = match side {
                    Side::One => side1.try_pull().await,
                    Side::Two => side2.try_pull().await,
                };
                match pulled {
                    Ok(Pull::Record(record)) => {
                        received = true;
                        self.receive(&mut state, side, record);
                    }
                    Ok(Pull::Empty) => {}
                    Ok(Pull::Closed) => {
                        debug!(schema = %self.schema, side = %side, "source closed");
                        open[slot] = false;
                    }
                    Err(source) => {
                        error!(
                            run_id = %self.run_id,
                            schema = %self.schema,
                            side = %side,
                            error = %source,
                            pending = state.pending_total(),
                            "source failed, stopping correlation"
                        );
                        return Err(CorrelateError::Source { side, source });
                    }
                }
            }

            if received {
                state.last_activity = Instant::now();
            }
            if !open[0] && !open[1] {
                break RunOutcome::SourcesClosed;
            }
            if self.config.mode == CorrelationMode::Batch
                && state.last_activity.elapsed() > self.config.idle_timeout()
            {
                break RunOutcome::IdleTimeout;
            }
            if !received {
                self.cancel.sleep(self.config.backoff()).await;
            }
        };

        self.finish(&mut state, outcome);
        state.summary.outcome = outcome;
        info!(
            run_id = %self.run_id,
            schema = %self.schema,
            outcome = ?outcome,
            matched = state.summary.matched,
            differences = state.summary.differences,
            missing_rows = state.summary.missing_rows,
            comparison_failures = state.summary.comparison_failures,
            discarded = state.summary.discarded,
            "correlation finished"
        );
        Ok(state.summary)
    }

    fn receive(&self, state: &mut RunState, side: Side, record: Record) {
        match side {
            Side::One => state.summary.pulled_side1 += 1,
            Side::Two => state.summary.pulled_side2 += 1,
        }

        let key = match self.primary_key(&record) {
            Ok(Some(key)) => key,
            Ok(None) => {
                warn!(schema = %self.schema, side = %side, "record has no primary key, skipped");
                state.summary.comparison_failures += 1;
                return;
            }
            Err(message) => {
                error!(schema = %self.schema, side = %side, error = %message, "primary key extraction panicked");
                state.summary.comparison_failures += 1;
                return;
            }
        };
        debug!(schema = %self.schema, side = %side, key = %key, "record received");

        let opposite = side.opposite();
        match state.pending_mut(opposite).take(&key) {
            Some(counterpart) => {
                let (left, right) = match side {
                    Side::One => (record, counterpart),
                    Side::Two => (counterpart, record),
                };
                self.compare_pair(state, &key, &left, &right);
            }
            None => {
                if state.pending_mut(side).insert(key, record) {
                    state.summary.superseded += 1;
                }
                state.check_growth(&self.schema);
            }
        }
    }

    fn primary_key(&self, record: &Record) -> Result<Option<String>, String> {
        let policy = self.comparator.policy();
        catch_unwind(AssertUnwindSafe(|| policy.primary_key_of(record))).map_err(panic_message)
    }

    /// Compares one matched pair. A panicking policy is contained here so
    /// later pairs are still processed.
    fn compare_pair(&self, state: &mut RunState, key: &str, left: &Record, right: &Record) {
        state.summary.matched += 1;
        let compared = catch_unwind(AssertUnwindSafe(|| {
            self.comparator.compare_keyed(key, left, right)
        }));
        match compared {
            Ok(diffs) if diffs.is_empty() => {
                debug!(schema = %self.schema, key, "records match");
            }
            Ok(diffs) => {
                let count = diffs.len() as u64;
                if self.submit(state, diffs) {
                    state.summary.differences += count;
                }
            }
            Err(panic) => {
                error!(
                    schema = %self.schema,
                    key,
                    error = %panic_message(panic),
                    "comparison panicked, pair skipped"
                );
                state.summary.comparison_failures += 1;
            }
        }
    }

    fn submit(&self, state: &mut RunState, diffs: Vec<Difference>) -> bool {
        let count = diffs.len() as u64;
        match self.sink.submit_all(&self.schema, diffs) {
            Ok(_) => true,
            Err(e) => {
                error!(schema = %self.schema, error = %e, count, "sink rejected differences");
                state.summary.sink_rejections += count;
                false
            }
        }
    }

    fn finish(&self, state: &mut RunState, outcome: RunOutcome) {
        let (flush_side1, flush_side2) = match (self.config.mode, outcome) {
            (CorrelationMode::Batch, RunOutcome::IdleTimeout | RunOutcome::SourcesClosed) => {
                (true, self.config.flush_side2_on_timeout)
            }
            _ => (self.config.flush_on_cancel, self.config.flush_on_cancel),
        };
        for (side, flush) in [(Side::One, flush_side1), (Side::Two, flush_side2)] {
            let leftovers = state.pending_mut(side).drain();
            if leftovers.is_empty() {
                continue;
            }
            if flush {
                info!(
                    schema = %self.schema,
                    side = %side,
                    count = leftovers.len(),
                    outcome = ?outcome,
                    "reporting unmatched records as missing rows"
                );
                let diffs: Vec<Difference> = leftovers
                    .into_iter()
                    .map(|(key, record)| {
                        Difference::missing_row(key, side, record.to_json().to_string())
                    })
                    .collect();
                let count = diffs.len() as u64;
                if self.submit(state, diffs) {
                    state.summary.missing_rows += count;
                }
            } else {
                debug!(
                    schema = %self.schema,
                    side = %side,
                    count = leftovers.len(),
                    "discarding unmatched records"
                );
                state.summary.discarded += leftovers.len() as u64;
            }
        }
    }
}

struct RunState {
    pending: [PendingSet; 2],
    summary: CorrelationSummary,
    last_activity: Instant,
    warn_threshold: usize,
    warned: bool,
}

impl RunState {
    fn new(correlator: &Correlator) -> Self {
        let policy = correlator.config.superseded;
        Self {
            pending: [
                PendingSet::new(Side::One, policy),
                PendingSet::new(Side::Two, policy),
            ],
            summary: CorrelationSummary::new(correlator.run_id, &correlator.schema),
            last_activity: Instant::now(),
            warn_threshold: correlator.config.pending_warn_threshold,
            warned: false,
        }
    }

    fn pending_mut(&mut self, side: Side) -> &mut PendingSet {
        &mut self.pending[side_index(side)]
    }

    fn pending_total(&self) -> usize {
        self.pending.iter().map(PendingSet::len).sum()
    }

    /// Warns once each time the pending total crosses the threshold.
    fn check_growth(&mut self, schema: &str) {
        let total = self.pending_total();
        if total > self.warn_threshold {
            if !self.warned {
                warn!(
                    schema,
                    pending = total,
                    threshold = self.warn_threshold,
                    "pending records exceed threshold"
                );
                self.warned = true;
            }
        } else {
            self.warned = false;
        }
    }
}

fn side_index(side: Side) -> usize {
    match side {
        Side::One => 0,
        Side::Two => 1,
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
