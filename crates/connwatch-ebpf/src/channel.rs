//! Event channels between the kernel buffers and the consumers.
//!
//! A consumer only ever sees an [`EventChannel`]: something it can ask for the
//! next raw record and that tells it when there will be no more. The kernel
//! attachment feeds [`QueueChannel`]s from per-CPU perf readers; tests feed
//! them by hand.

use std::future::Future;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// One item read from a kernel event buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRecord {
    /// Raw bytes of one record, possibly followed by padding.
    Sample(Vec<u8>),
    /// Number of records the kernel dropped because the buffer was full.
    Lost(u64),
}

/// Failure modes of [`EventChannel::next_record`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel will yield nothing more. Consumers stop on this.
    #[error("event channel closed")]
    Closed,

    /// A transient read failure. Consumers log it and keep reading.
    #[error("event channel read failed: {0}")]
    Read(String),
}

/// Source of raw kernel records.
pub trait EventChannel: Send {
    /// Waits for the next record.
    ///
    /// Resolves to [`ChannelError::Closed`] once shutdown was requested or
    /// the producer side is gone.
    fn next_record(&mut self) -> impl Future<Output = Result<ChannelRecord, ChannelError>> + Send;
}

/// Owner of the process-wide stop signal.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Returns a handle that observes this signal.
    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Requests shutdown. Every reader waiting on a channel wakes up.
    pub fn trigger(&self) {
        let _ = self.tx.send_replace(true);
    }

    /// Whether [`Shutdown::trigger`] was called.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Completes once shutdown is requested.
    ///
    /// Never completes if the [`Shutdown`] is dropped untriggered.
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Whether shutdown was requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

type QueueItem = Result<ChannelRecord, ChannelError>;

/// Creates a bounded queue channel and its producer handle.
///
/// `capacity` is clamped to at least one slot.
#[must_use]
pub fn queue_channel(capacity: usize, shutdown: ShutdownSignal) -> (ChannelFeed, QueueChannel) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelFeed { tx }, QueueChannel { rx, shutdown })
}

/// Producer half of a [`QueueChannel`].
///
/// Cloneable so several per-CPU readers can feed one consumer. Every send
/// returns `false` once the consumer side is gone.
#[derive(Debug, Clone)]
pub struct ChannelFeed {
    tx: mpsc::Sender<QueueItem>,
}

impl ChannelFeed {
    /// Queues one raw record.
    pub async fn sample(&self, raw: Vec<u8>) -> bool {
        self.tx.send(Ok(ChannelRecord::Sample(raw))).await.is_ok()
    }

    /// Queues a lost-sample notification.
    pub async fn lost(&self, count: u64) -> bool {
        self.tx.send(Ok(ChannelRecord::Lost(count))).await.is_ok()
    }

    /// Queues a transient read error.
    pub async fn error(&self, message: impl Into<String>) -> bool {
        self.tx
            .send(Err(ChannelError::Read(message.into())))
            .await
            .is_ok()
    }
}

/// Consumer half: a bounded FIFO that also watches the shutdown signal.
#[derive(Debug)]
pub struct QueueChannel {
    rx: mpsc::Receiver<QueueItem>,
    shutdown: ShutdownSignal,
}

impl EventChannel for QueueChannel {
    async fn next_record(&mut self) -> Result<ChannelRecord, ChannelError> {
        tokio::select! {
            biased;
            () = self.shutdown.wait() => Err(ChannelError::Closed),
            item = self.rx.recv() => item.unwrap_or(Err(ChannelError::Closed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn yields_records_in_feed_order() {
        let shutdown = Shutdown::new();
        let (feed, mut channel) = queue_channel(8, shutdown.signal());

        assert!(feed.sample(vec![1, 2, 3]).await);
        assert!(feed.lost(4).await);
        assert!(feed.error("EAGAIN").await);

        assert_eq!(
            channel.next_record().await,
            Ok(ChannelRecord::Sample(vec![1, 2, 3]))
        );
        assert_eq!(channel.next_record().await, Ok(ChannelRecord::Lost(4)));
        assert_eq!(
            channel.next_record().await,
            Err(ChannelError::Read("EAGAIN".into()))
        );
    }

    #[tokio::test]
    async fn closes_after_feeds_dropped_and_drained() {
        let shutdown = Shutdown::new();
        let (feed, mut channel) = queue_channel(8, shutdown.signal());
        let second = feed.clone();

        assert!(feed.sample(vec![9]).await);
        drop(feed);
        drop(second);

        assert_eq!(channel.next_record().await, Ok(ChannelRecord::Sample(vec![9])));
        assert_eq!(channel.next_record().await, Err(ChannelError::Closed));
    }

    #[tokio::test]
    async fn shutdown_wakes_a_blocked_reader() {
        let shutdown = Shutdown::new();
        let (_feed, mut channel) = queue_channel(8, shutdown.signal());

        let reader = tokio::spawn(async move { channel.next_record().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader.is_finished());

        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), reader)
            .await
            .expect("reader woke up")
            .expect("reader task");
        assert_eq!(result, Err(ChannelError::Closed));
    }

    #[tokio::test]
    async fn shutdown_takes_precedence_over_queued_records() {
        let shutdown = Shutdown::new();
        let (feed, mut channel) = queue_channel(8, shutdown.signal());
        assert!(feed.sample(vec![1]).await);

        shutdown.trigger();
        assert!(shutdown.is_triggered());
        assert_eq!(channel.next_record().await, Err(ChannelError::Closed));
    }

    #[tokio::test]
    async fn feed_reports_dropped_consumer() {
        let shutdown = Shutdown::new();
        let (feed, channel) = queue_channel(1, shutdown.signal());
        drop(channel);

        assert!(!feed.sample(vec![1]).await);
        assert!(!feed.lost(1).await);
        assert!(!feed.error("EIO").await);
    }

    #[tokio::test]
    async fn signal_clones_observe_the_same_trigger() {
        let shutdown = Shutdown::new();
        let mut first = shutdown.signal();
        let second = first.clone();
        assert!(!second.is_triggered());

        shutdown.trigger();
        first.wait().await;
        assert!(second.is_triggered());
    }
}
