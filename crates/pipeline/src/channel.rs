//! Bounded FIFO channel between request handlers and the worker.
//!
//! Capacity is fixed when the channel is created and is the only admission
//! control against producer overload. Any number of [`EventSender`] clones
//! may publish; exactly one [`EventReceiver`] consumes. The channel closes
//! once every sender is gone, after which the receiver reports
//! [`Received::Closed`].

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Buffer size used by the service.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Creates a bounded channel. `capacity` must be non-zero.
pub fn channel<T>(capacity: usize) -> (EventSender<T>, EventReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender { inner: tx }, EventReceiver { inner: rx })
}

/// Why a published event was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The channel stayed full until the publisher's deadline.
    DeadlineExceeded,
    /// Shutdown started before the event could be enqueued.
    ShuttingDown,
    /// The receiver is gone.
    ChannelClosed,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::DeadlineExceeded => "deadline_exceeded",
            DropReason::ShuttingDown => "shutting_down",
            DropReason::ChannelClosed => "channel_closed",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a publish attempt. Dropping is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Enqueued,
    Dropped(DropReason),
}

impl PublishOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, PublishOutcome::Enqueued)
    }
}

/// Result of a receive attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Received<T> {
    /// The next event in FIFO order.
    Event(T),
    /// Nothing buffered right now; only returned by [`EventReceiver::try_recv`].
    WouldBlock,
    /// Every sender is gone and the buffer is drained.
    Closed,
}

/// Producer half of the channel.
pub struct EventSender<T> {
    inner: mpsc::Sender<T>,
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> EventSender<T> {
    /// Publishes `event` without ever blocking past `deadline`.
    ///
    /// Tries a non-blocking enqueue first. If the buffer is full, waits for
    /// space until `deadline`, abandoning the attempt as soon as `shutdown`
    /// is cancelled. On any drop the event is discarded.
    pub async fn publish(
        &self,
        event: T,
        deadline: Instant,
        shutdown: &CancellationToken,
    ) -> PublishOutcome {
        if shutdown.is_cancelled() {
            return PublishOutcome::Dropped(DropReason::ShuttingDown);
        }

        let event = match self.inner.try_send(event) {
            Ok(()) => return PublishOutcome::Enqueued,
            Err(TrySendError::Closed(_)) => {
                return PublishOutcome::Dropped(DropReason::ChannelClosed);
            }
            Err(TrySendError::Full(event)) => event,
        };

        tokio::select! {
            biased;
            () = shutdown.cancelled() => PublishOutcome::Dropped(DropReason::ShuttingDown),
            sent = tokio::time::timeout_at(deadline, self.inner.send(event)) => match sent {
                Ok(Ok(())) => PublishOutcome::Enqueued,
                Ok(Err(_)) => PublishOutcome::Dropped(DropReason::ChannelClosed),
                Err(_) => PublishOutcome::Dropped(DropReason::DeadlineExceeded),
            },
        }
    }

    /// Fixed buffer size of the channel.
    pub fn capacity(&self) -> usize {
        self.inner.max_capacity()
    }

    /// True once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Consumer half of the channel.
pub struct EventReceiver<T> {
    inner: mpsc::Receiver<T>,
}

impl<T> EventReceiver<T> {
    /// Waits for the next event. Never returns [`Received::WouldBlock`].
    pub async fn recv(&mut self) -> Received<T> {
        match self.inner.recv().await {
            Some(event) => Received::Event(event),
            None => Received::Closed,
        }
    }

    /// Takes the next event if one is buffered.
    pub fn try_recv(&mut self) -> Received<T> {
        match self.inner.try_recv() {
            Ok(event) => Received::Event(event),
            Err(TryRecvError::Empty) => Received::WouldBlock,
            Err(TryRecvError::Disconnected) => Received::Closed,
        }
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
