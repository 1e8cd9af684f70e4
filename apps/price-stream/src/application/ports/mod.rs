//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Transport`: opens one long-lived, bidirectional text-frame connection
//!   and hands back its write half (`FrameSink`) and read half
//!   (`FrameStream`). The session never touches sockets directly.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};

#[cfg(test)]
use mockall::automock;

// =============================================================================
// Frames
// =============================================================================

/// Close code for a deliberate, normal closure.
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Frame written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// JSON control frame.
    Text(String),
    /// Liveness ping.
    Ping,
    /// Close the connection.
    Close,
}

/// Close information sent by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// WebSocket close code.
    pub code: u16,
    /// Close reason.
    pub reason: String,
}

impl CloseFrame {
    /// Whether the peer closed deliberately (code 1000).
    #[must_use]
    pub const fn is_normal(&self) -> bool {
        self.code == NORMAL_CLOSE_CODE
    }
}

/// Frame read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Text payload (JSON from the server).
    Text(String),
    /// Liveness pong.
    Pong,
    /// The peer closed the connection.
    Close(Option<CloseFrame>),
}

// =============================================================================
// Errors
// =============================================================================

/// Transport failures. All of them are recoverable from the session's
/// point of view.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection establishment failed (DNS, TCP, TLS, handshake).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// No pong arrived within the ping timeout.
    #[error("ping timeout after {0:?}")]
    PingTimeout(std::time::Duration),

    /// Connection closed by the peer without a normal close frame.
    #[error("connection closed abnormally: {0}")]
    AbnormalClose(String),
}

impl TransportError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Send(_) => "send",
            Self::Receive(_) => "receive",
            Self::PingTimeout(_) => "ping_timeout",
            Self::AbnormalClose(_) => "abnormal_close",
        }
    }
}

// =============================================================================
// Transport Port
// =============================================================================

/// Write half of a transport connection.
pub type FrameSink = Pin<Box<dyn Sink<OutboundFrame, Error = TransportError> + Send>>;

/// Read half of a transport connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<InboundFrame, TransportError>> + Send>>;

/// An established connection.
pub struct TransportConnection {
    /// Write half.
    pub sink: FrameSink,
    /// Read half.
    pub stream: FrameStream,
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection").finish_non_exhaustive()
    }
}

/// Opens connections to the streaming endpoint.
///
/// Returning `Ok` is the "open" event: the session transitions to ready as
/// soon as `connect` resolves.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to `url`.
    async fn connect(&self, url: &str) -> Result<TransportConnection, TransportError>;
}
