use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a correlation run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    /// Ends after `idle_timeout` without data (or when both sources
    /// close); side-1 leftovers are reported as missing rows.
    #[default]
    Batch,
    /// Runs until cancelled; leftovers are never reported as missing
    /// while running.
    Streaming,
}

/// What happens when a side delivers a key that is already pending on
/// that same side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersededPolicy {
    /// The newer record replaces the pending one.
    #[default]
    LatestWins,
    /// Every version is kept and matched first-in first-out.
    RetainAll,
}

/// Configuration for a correlation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub mode: CorrelationMode,
    /// Batch mode: end the run after this long without a record (ms).
    pub idle_timeout_ms: u64,
    /// Sleep between cycles in which neither source had data (ms).
    pub backoff_ms: u64,
    /// Batch mode: also report side-2 leftovers as missing rows.
    pub flush_side2_on_timeout: bool,
    /// Report leftovers of both sides as missing rows when cancelled,
    /// instead of discarding them.
    pub flush_on_cancel: bool,
    pub superseded: SupersededPolicy,
    /// Warn once the pending records of both sides exceed this many.
    pub pending_warn_threshold: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            mode: CorrelationMode::Batch,
            idle_timeout_ms: 60_000,
            backoff_ms: 200,
            flush_side2_on_timeout: false,
            flush_on_cancel: false,
            superseded: SupersededPolicy::LatestWins,
            pending_warn_threshold: 100_000,
        }
    }
}

impl CorrelationConfig {
    /// Batch mode with the given idle timeout.
    #[must_use]
    pub fn batch(idle_timeout_ms: u64) -> Self {
        Self {
            mode: CorrelationMode::Batch,
            idle_timeout_ms,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn streaming() -> Self {
        Self {
            mode: CorrelationMode::Streaming,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_backoff_ms(mut self, ms: u64) -> Self {
        self.backoff_ms = ms;
        self
    }

    #[must_use]
    pub fn with_flush_side2(mut self, flush: bool) -> Self {
        self.flush_side2_on_timeout = flush;
        self
    }

    #[must_use]
    pub fn with_flush_on_cancel(mut self, flush: bool) -> Self {
        self.flush_on_cancel = flush;
        self
    }

    #[must_use]
    pub fn with_superseded(mut self, policy: SupersededPolicy) -> Self {
        self.superseded = policy;
        self
    }

    #[must_use]
    pub fn with_pending_warn_threshold(mut self, threshold: usize) -> Self {
        self.pending_warn_threshold = threshold;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}
