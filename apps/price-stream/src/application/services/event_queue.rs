//! Event Queue
//!
//! Bounded FIFO between the session (producer) and the consumer thread.
//!
//! The producer never blocks: when the queue is full the incoming event is
//! dropped, counted, and a warning is logged at most once per second so a
//! stalled callback cannot flood the logs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::streaming::StreamEvent;
use crate::infrastructure::metrics::{record_event_dropped, record_event_received};

/// Default queue capacity.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 12_000;

/// Largest capacity the underlying channel can hold.
pub const MAX_QUEUE_SIZE: usize = tokio::sync::Semaphore::MAX_PERMITS;

const OVERFLOW_WARN_INTERVAL: Duration = Duration::from_secs(1);

/// Result of offering an event to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The event was queued.
    Enqueued,
    /// The queue was full; the event was discarded.
    Dropped,
    /// The consumer is gone; the event was discarded.
    Closed,
}

/// Create a bounded queue with the given capacity.
///
/// # Panics
///
/// Panics if `capacity` is zero or above [`MAX_QUEUE_SIZE`]. Configuration
/// validation rejects both before a queue is ever built.
#[must_use]
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        EventSender {
            tx,
            overflow: Arc::new(OverflowLimiter::new(OVERFLOW_WARN_INTERVAL)),
        },
        EventReceiver { rx },
    )
}

// =============================================================================
// Sender
// =============================================================================

/// Producer half. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<StreamEvent>,
    overflow: Arc<OverflowLimiter>,
}

impl EventSender {
    /// Offer an event without blocking.
    pub fn put(&self, event: StreamEvent) -> PutOutcome {
        match self.tx.try_send(event) {
            Ok(()) => {
                record_event_received();
                PutOutcome::Enqueued
            }
            Err(TrySendError::Full(_)) => {
                record_event_dropped();
                if self.overflow.should_warn() {
                    tracing::warn!(
                        capacity = self.capacity(),
                        "Event queue full, dropping incoming events"
                    );
                }
                PutOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Event queue closed, discarding event");
                PutOutcome::Closed
            }
        }
    }

    /// Queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Number of events currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Receiver
// =============================================================================

/// Consumer half.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<StreamEvent>,
}

impl EventReceiver {
    /// Block the current thread until an event is available.
    ///
    /// Returns `None` once every sender is gone and the queue is drained.
    /// Must not be called from inside an async runtime.
    pub fn take(&mut self) -> Option<StreamEvent> {
        self.rx.blocking_recv()
    }

    /// Await the next event.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Take an event if one is queued.
    pub fn try_take(&mut self) -> Option<StreamEvent> {
        self.rx.try_recv().ok()
    }

    /// Number of events currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

// =============================================================================
// Overflow Limiter
// =============================================================================

/// Allows one overflow warning per interval.
#[derive(Debug)]
struct OverflowLimiter {
    interval: Duration,
    last_warned: Mutex<Option<Instant>>,
}

impl OverflowLimiter {
    const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_warned: Mutex::new(None),
        }
    }

    fn should_warn(&self) -> bool {
        let mut last = self.last_warned.lock();
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}
