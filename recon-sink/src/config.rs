use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`crate::DiffSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Directory receiving one report file per schema.
    pub output_dir: PathBuf,
    /// How long a writer waits on its queue before checking idleness.
    pub poll_interval_ms: u64,
    /// Idle time after which a writer retires. `None` keeps writers open
    /// until shutdown.
    pub idle_close_ms: Option<u64>,
    /// Upper bound on how long shutdown waits for each writer to drain.
    pub drain_deadline_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            poll_interval_ms: 5_000,
            idle_close_ms: None,
            drain_deadline_ms: 30_000,
        }
    }
}

impl SinkConfig {
    /// Default configuration writing into `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn with_idle_close_ms(mut self, ms: u64) -> Self {
        self.idle_close_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn with_drain_deadline_ms(mut self, ms: u64) -> Self {
        self.drain_deadline_ms = ms;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn idle_close(&self) -> Option<Duration> {
        self.idle_close_ms.map(Duration::from_millis)
    }

    pub fn drain_deadline(&self) -> Duration {
        Duration::from_millis(self.drain_deadline_ms)
    }
}
