//! Application Services
//!
//! Services that sit between the session and the user's callback.
//!
//! - `event_queue`: Bounded, drop-on-full queue of decoded events
//! - `consumer`: Dedicated thread draining the queue into the callback

/// Dedicated consumer thread.
pub mod consumer;

/// Bounded event queue.
pub mod event_queue;

pub use consumer::{CONSUMER_THREAD_NAME, Delivery, EventCallback, spawn_consumer};
pub use event_queue::{
    DEFAULT_MAX_QUEUE_SIZE, EventReceiver, EventSender, MAX_QUEUE_SIZE, PutOutcome, event_queue,
};
