//! Per-schema writer task.
//!
//! A lane owns the receiving end of one schema's queue and the report file.
//! The queue carries whole submissions, so a batch is written contiguously.
//! It ends when every sender is gone (shutdown, after draining), when it
//! retires after an idle period, or when a write fails.

use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::sink::{lock, LaneOutcome, Registry};
use crate::writer::ReportWriter;
use recon_types::Difference;
use std::path::PathBuf;
use std::sync::{Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tracing::{debug, error};

pub(crate) struct LaneContext {
    pub(crate) schema: String,
    pub(crate) generation: u64,
    pub(crate) dir: PathBuf,
    pub(crate) file_name: String,
    pub(crate) config: SinkConfig,
    pub(crate) registry: Weak<Mutex<Registry>>,
}

pub(crate) type Batch = Vec<Difference>;

pub(crate) async fn run(ctx: LaneContext, mut rx: UnboundedReceiver<Batch>) -> LaneOutcome {
    let mut writer = match ReportWriter::open(&ctx.dir, &ctx.file_name).await {
        Ok(writer) => writer,
        Err(e) => return ctx.fail(rx, 0, 0, e),
    };
    debug!(schema = %ctx.schema, path = %writer.path().display(), "report opened");

    let poll = ctx.config.poll_interval();
    let idle_close = ctx.config.idle_close();
    let mut idle = Duration::ZERO;
    let mut written = 0u64;

    loop {
        match timeout(poll, rx.recv()).await {
            Ok(Some(batch)) => {
                idle = Duration::ZERO;
                let total = batch.len() as u64;
                for (done, diff) in batch.iter().enumerate() {
                    if let Err(e) = writer.write(diff).await {
                        return ctx.fail(rx, written, total - done as u64, e);
                    }
                    written += 1;
                }
            }
            Ok(None) => break,
            Err(_) => {
                idle += poll;
                if let Some(limit) = idle_close {
                    if idle >= limit && ctx.retire(&rx) {
                        debug!(schema = %ctx.schema, written, "report writer retired after idle period");
                        break;
                    }
                }
            }
        }
    }

    LaneOutcome::Closed { written }
}

impl LaneContext {
    /// Detaches this lane from the registry if its queue is empty. Checked
    /// under the registry lock, so no submission can slip in between.
    fn retire(&self, rx: &UnboundedReceiver<Batch>) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = lock(&registry);
        rx.is_empty() && registry.detach(&self.schema, Some(self.generation))
    }

    /// Stops accepting work, counts what is lost, and detaches so the next
    /// submission provisions a fresh lane.
    fn fail(
        &self,
        mut rx: UnboundedReceiver<Batch>,
        written: u64,
        lost: u64,
        e: SinkError,
    ) -> LaneOutcome {
        rx.close();
        let mut dropped = lost;
        while let Ok(batch) = rx.try_recv() {
            dropped += batch.len() as u64;
        }
        error!(schema = %self.schema, error = %e, written, dropped, "report writer failed");

        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).detach(&self.schema, Some(self.generation));
        }
        LaneOutcome::Failed {
            written,
            dropped,
            error: e.to_string(),
        }
    }
}
