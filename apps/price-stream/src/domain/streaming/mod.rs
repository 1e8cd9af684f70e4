//! Streaming Session Types
//!
//! Connection state and the opaque event type handed to consumers.

use std::fmt;

/// A decoded inbound server message.
///
/// The server schema is treated opaquely: events are passed to the consumer
/// exactly as decoded.
pub type StreamEvent = serde_json::Value;

/// The `event` discriminator most server messages carry (`price`,
/// `subscribe-status`, `heartbeat`, ...), if present.
#[must_use]
pub fn event_kind(event: &StreamEvent) -> Option<&str> {
    event.get("event").and_then(serde_json::Value::as_str)
}

/// Connection session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No live transport. Initial state.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The transport reported open; control frames may be sent.
    Ready,
}

impl SessionState {
    /// Whether control frames may be sent.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Get the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
