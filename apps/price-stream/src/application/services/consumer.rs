//! Event Consumer
//!
//! A dedicated OS thread drains the event queue and invokes the user
//! callback once per event, in arrival order. The callback may block for as
//! long as it likes without stalling the network session; a failing or
//! panicking callback is logged and the loop moves on to the next event.

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use crate::application::services::event_queue::EventReceiver;
use crate::domain::streaming::{StreamEvent, event_kind};
use crate::infrastructure::metrics::record_callback_failure;

/// Name given to the consumer thread.
pub const CONSUMER_THREAD_NAME: &str = "price-stream-consumer";

/// User callback invoked for every decoded event.
pub type EventCallback = Arc<dyn Fn(StreamEvent) -> anyhow::Result<()> + Send + Sync>;

/// What happened to a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The callback returned `Ok`.
    Delivered,
    /// No callback is configured.
    Discarded,
    /// The callback returned an error.
    Failed,
    /// The callback panicked.
    Panicked,
}

/// Spawn the consumer thread.
///
/// The thread exits once every [`EventSender`](super::EventSender) has been
/// dropped and the queue is drained.
///
/// # Errors
///
/// Returns an error if the OS refuses to create the thread.
pub fn spawn_consumer(
    mut events: EventReceiver,
    callback: Option<EventCallback>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(CONSUMER_THREAD_NAME.to_string())
        .spawn(move || {
            tracing::debug!("Event consumer started");
            while let Some(event) = events.take() {
                let _ = deliver(callback.as_ref(), event);
            }
            tracing::debug!("Event consumer stopped");
        })
}

/// Hand one event to the callback, isolating errors and panics.
pub fn deliver(callback: Option<&EventCallback>, event: StreamEvent) -> Delivery {
    let Some(callback) = callback else {
        return Delivery::Discarded;
    };

    let kind = event_kind(&event).map(str::to_owned);
    match catch_unwind(AssertUnwindSafe(|| callback(event))) {
        Ok(Ok(())) => Delivery::Delivered,
        Ok(Err(e)) => {
            record_callback_failure("error");
            tracing::error!(error = %e, event = kind.as_deref(), "Event callback failed");
            Delivery::Failed
        }
        Err(panic) => {
            record_callback_failure("panic");
            tracing::error!(
                panic = panic_message(panic.as_ref()),
                event = kind.as_deref(),
                "Event callback panicked"
            );
            Delivery::Panicked
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
