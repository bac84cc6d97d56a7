//! Record sources.
//!
//! A [`RecordSource`] is polled once per correlation cycle. "Nothing right
//! now" ([`Pull::Empty`]) and "nothing ever again" ([`Pull::Closed`]) are
//! distinct answers; errors are fatal for the run that polled them.

use crate::error::SourceResult;
use async_trait::async_trait;
use recon_types::Record;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::timeout;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Pull {
    Record(Record),
    /// No record available now; the source may deliver later.
    Empty,
    /// End of stream.
    Closed,
}

/// One side's supply of records.
#[async_trait]
pub trait RecordSource: Send {
    /// Pulls at most one record. Implementations must not block for long;
    /// a short bounded wait is acceptable.
    async fn try_pull(&mut self) -> SourceResult<Pull>;
}

#[async_trait]
impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    async fn try_pull(&mut self) -> SourceResult<Pull> {
        (**self).try_pull().await
    }
}

enum Receiver {
    Unbounded(mpsc::UnboundedReceiver<Record>),
    Bounded(mpsc::Receiver<Record>),
}

/// Source fed through a tokio channel. The stream closes when every
/// sender is dropped.
pub struct ChannelSource {
    rx: Receiver,
    poll_timeout: Option<Duration>,
}

impl ChannelSource {
    /// Unbounded channel: producers never wait.
    pub fn unbounded() -> (mpsc::UnboundedSender<Record>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::from_receiver(Receiver::Unbounded(rx)))
    }

    /// Bounded channel: producers wait once `capacity` records are
    /// buffered, which pushes back on a side that runs ahead.
    pub fn bounded(capacity: usize) -> (mpsc::Sender<Record>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::from_receiver(Receiver::Bounded(rx)))
    }

    fn from_receiver(rx: Receiver) -> Self {
        Self {
            rx,
            poll_timeout: None,
        }
    }

    /// Waits up to `wait` for a record on each pull instead of returning
    /// immediately.
    #[must_use]
    pub fn with_poll_timeout(mut self, wait: Duration) -> Self {
        self.poll_timeout = Some(wait);
        self
    }

    fn try_recv(&mut self) -> Pull {
        let result = match &mut self.rx {
            Receiver::Unbounded(rx) => rx.try_recv(),
            Receiver::Bounded(rx) => rx.try_recv(),
        };
        match result {
            Ok(record) => Pull::Record(record),
            Err(TryRecvError::Empty) => Pull::Empty,
            Err(TryRecvError::Disconnected) => Pull::Closed,
        }
    }

    async fn recv_within(&mut self, wait: Duration) -> Pull {
        let received = match &mut self.rx {
            Receiver::Unbounded(rx) => timeout(wait, rx.recv()).await,
            Receiver::Bounded(rx) => timeout(wait, rx.recv()).await,
        };
        match received {
            Ok(Some(record)) => Pull::Record(record),
            Ok(None) => Pull::Closed,
            Err(_) => Pull::Empty,
        }
    }
}

#[async_trait]
impl RecordSource for ChannelSource {
    async fn try_pull(&mut self) -> SourceResult<Pull> {
        Ok(match self.poll_timeout {
            Some(wait) => self.recv_within(wait).await,
            None => self.try_recv(),
        })
    }
}

/// Scripted source for tests.
pub mod mock {
    use super::*;
    use crate::error::SourceError;
    use std::collections::VecDeque;

    enum Step {
        Pull(Pull),
        Fail(String),
        Panic(String),
    }

    /// Replays a fixed script of pulls, then reports [`Pull::Empty`]
    /// forever (or [`Pull::Closed`] after [`ScriptedSource::then_close`]).
    pub struct ScriptedSource {
        script: VecDeque<Step>,
        close_when_done: bool,
        pulls: usize,
    }

    impl ScriptedSource {
        pub fn new() -> Self {
            Self {
                script: VecDeque::new(),
                close_when_done: false,
                pulls: 0,
            }
        }

        /// A source that delivers `records` on consecutive pulls.
        pub fn records(records: impl IntoIterator<Item = Record>) -> Self {
            records.into_iter().fold(Self::new(), Self::record)
        }

        #[must_use]
        pub fn record(mut self, record: Record) -> Self {
            self.script.push_back(Step::Pull(Pull::Record(record)));
            self
        }

        /// `n` pulls that find nothing.
        #[must_use]
        pub fn empty(mut self, n: usize) -> Self {
            self.script
                .extend(std::iter::repeat_with(|| Step::Pull(Pull::Empty)).take(n));
            self
        }

        #[must_use]
        pub fn fail(mut self, message: impl Into<String>) -> Self {
            self.script.push_back(Step::Fail(message.into()));
            self
        }

        #[must_use]
        pub fn panic(mut self, message: impl Into<String>) -> Self {
            self.script.push_back(Step::Panic(message.into()));
            self
        }

        #[must_use]
        pub fn then_close(mut self) -> Self {
            self.close_when_done = true;
            self
        }

        /// Number of pulls served so far.
        pub fn pulls(&self) -> usize {
            self.pulls
        }
    }

    impl Default for ScriptedSource {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl RecordSource for ScriptedSource {
        async fn try_pull(&mut self) -> SourceResult<Pull> {
            self.pulls += 1;
            match self.script.pop_front() {
                Some(Step::Pull(pull)) => Ok(pull),
                Some(Step::Fail(message)) => Err(SourceError::Failed(message)),
                Some(Step::Panic(message)) => panic!("{message}"),
                None if self.close_when_done => Ok(Pull::Closed),
                None => Ok(Pull::Empty),
            }
        }
    }
}
