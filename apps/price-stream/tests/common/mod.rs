//! Shared test fixtures: an in-memory transport and client helpers.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::SinkExt;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout};
use tokio_stream::wrappers::UnboundedReceiverStream;

use price_stream::{
    CloseFrame, InboundFrame, OutboundFrame, PriceStreamClient, SessionState, StreamConfig,
    StreamEvent, Transport, TransportConnection, TransportError, WebSocketSettings,
};

/// How long helpers wait before declaring a test hung.
pub const WAIT: Duration = Duration::from_secs(2);

// =============================================================================
// Fake Transport
// =============================================================================

/// Transport that fails a fixed number of times, then hands every accepted
/// connection to the test through a channel.
pub struct FakeTransport {
    failures_left: AtomicU32,
    attempts: Mutex<Vec<Instant>>,
    urls: Mutex<Vec<String>>,
    connections: mpsc::UnboundedSender<FakeConnection>,
}

impl FakeTransport {
    /// Create a transport that refuses the first `failures` attempts.
    pub fn new(failures: u32) -> (Arc<Self>, mpsc::UnboundedReceiver<FakeConnection>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            failures_left: AtomicU32::new(failures),
            attempts: Mutex::new(Vec::new()),
            urls: Mutex::new(Vec::new()),
            connections: tx,
        });
        (transport, rx)
    }

    /// Instants of every connection attempt.
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    /// URLs of every connection attempt.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self, url: &str) -> Result<TransportConnection, TransportError> {
        self.attempts.lock().push(Instant::now());
        self.urls.lock().push(url.to_string());

        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (sent_tx, sent_rx) = futures::channel::mpsc::unbounded();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let _ = self.connections.send(FakeConnection {
            sent: sent_rx,
            inbound: inbound_tx,
        });

        Ok(TransportConnection {
            sink: Box::pin(sent_tx.sink_map_err(|e| TransportError::Send(e.to_string()))),
            stream: Box::pin(UnboundedReceiverStream::new(inbound_rx)),
        })
    }
}

/// The server side of one accepted connection.
///
/// Dropping it ends the client's read stream, which the client treats as an
/// abnormal close.
pub struct FakeConnection {
    sent: futures::channel::mpsc::UnboundedReceiver<OutboundFrame>,
    inbound: mpsc::UnboundedSender<Result<InboundFrame, TransportError>>,
}

impl FakeConnection {
    /// Next frame written by the client, pings included.
    pub async fn next_frame(&mut self) -> Option<OutboundFrame> {
        self.next_frame_within(WAIT).await
    }

    /// Next frame written by the client within `wait`.
    pub async fn next_frame_within(&mut self, wait: Duration) -> Option<OutboundFrame> {
        timeout(wait, self.sent.next())
            .await
            .expect("timed out waiting for a client frame")
    }

    /// Next text frame written by the client, skipping pings.
    pub async fn next_text(&mut self) -> String {
        loop {
            match self.next_frame().await {
                Some(OutboundFrame::Text(text)) => return text,
                Some(OutboundFrame::Ping) => {}
                other => panic!("expected a text frame, got {other:?}"),
            }
        }
    }

    /// Assert that no text frame arrives within `window`.
    pub async fn expect_no_text(&mut self, window: Duration) {
        let deadline = Instant::now() + window;
        while let Ok(frame) = tokio::time::timeout_at(deadline, self.sent.next()).await {
            match frame {
                Some(OutboundFrame::Text(text)) => panic!("unexpected text frame: {text}"),
                Some(_) => {}
                None => return,
            }
        }
    }

    /// Deliver a text frame to the client.
    pub fn push_text(&self, text: &str) {
        self.inbound
            .send(Ok(InboundFrame::Text(text.to_string())))
            .unwrap();
    }

    /// Deliver a pong to the client.
    pub fn push_pong(&self) {
        self.inbound.send(Ok(InboundFrame::Pong)).unwrap();
    }

    /// Fail the connection with a read error.
    pub fn fail(&self) {
        self.inbound
            .send(Err(TransportError::Receive("connection reset by peer".to_string())))
            .unwrap();
    }

    /// Close the connection from the server side.
    pub fn close(&self, code: u16) {
        self.inbound
            .send(Ok(InboundFrame::Close(Some(CloseFrame {
                code,
                reason: String::new(),
            }))))
            .unwrap();
    }
}

// =============================================================================
// Client Helpers
// =============================================================================

/// Settings with pings off and a short self-heal delay.
pub fn quiet_settings(self_heal_time: Duration) -> WebSocketSettings {
    WebSocketSettings {
        ping_interval: Duration::ZERO,
        ping_timeout: Duration::ZERO,
        self_heal_time,
    }
}

/// Test configuration for the given symbols.
pub fn test_config(symbols: &str) -> StreamConfig {
    StreamConfig::new("test-key")
        .with_symbols(symbols)
        .with_websocket(quiet_settings(Duration::from_millis(50)))
}

/// Build a client over the fake transport.
pub fn client_with(config: StreamConfig, transport: &Arc<FakeTransport>) -> PriceStreamClient {
    let transport: Arc<dyn Transport> = Arc::clone(transport) as Arc<dyn Transport>;
    PriceStreamClient::with_transport(config, transport).unwrap()
}

/// Callback that forwards every event to a channel.
pub fn collecting_callback(
    config: StreamConfig,
) -> (StreamConfig, mpsc::UnboundedReceiver<StreamEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let config = config.with_on_event(move |event| {
        let _ = tx.send(event);
        Ok(())
    });
    (config, rx)
}

/// Wait until the client reaches `state`.
pub async fn wait_for_state(client: &PriceStreamClient, state: SessionState) {
    let mut changes = client.state_changes();
    timeout(WAIT, changes.wait_for(|s| *s == state))
        .await
        .expect("timed out waiting for session state")
        .expect("session state channel closed");
}

/// Wait for the next accepted connection.
pub async fn next_connection(
    connections: &mut mpsc::UnboundedReceiver<FakeConnection>,
) -> FakeConnection {
    next_connection_within(connections, WAIT).await
}

/// Wait up to `wait` for the next accepted connection.
pub async fn next_connection_within(
    connections: &mut mpsc::UnboundedReceiver<FakeConnection>,
    wait: Duration,
) -> FakeConnection {
    timeout(wait, connections.recv())
        .await
        .expect("timed out waiting for a connection")
        .expect("transport dropped")
}

/// Wait for the next delivered event.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<StreamEvent>) -> StreamEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("callback channel closed")
}
