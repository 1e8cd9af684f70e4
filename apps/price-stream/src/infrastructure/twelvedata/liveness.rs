//! Liveness Monitor
//!
//! Detects dead connections with WebSocket-level ping/pong. Every
//! `ping_interval` a ping is requested; if nothing arrives from the server
//! within `ping_timeout` the monitor reports a timeout and exits, and the
//! session treats the connection as failed.
//!
//! Any inbound frame counts as proof of life, not only pongs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::config::WebSocketSettings;

/// Configuration for liveness pings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingConfig {
    /// Interval between pings (zero disables pings).
    pub ping_interval: Duration,
    /// How long to wait for a reply.
    pub ping_timeout: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(15),
            ping_timeout: Duration::from_secs(10),
        }
    }
}

impl PingConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(ping_interval: Duration, ping_timeout: Duration) -> Self {
        Self {
            ping_interval,
            ping_timeout,
        }
    }

    /// Create configuration from `WebSocketSettings`.
    #[must_use]
    pub const fn from_websocket_settings(settings: &WebSocketSettings) -> Self {
        Self {
            ping_interval: settings.ping_interval,
            ping_timeout: settings.ping_timeout,
        }
    }

    /// Whether pings are sent at all.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        !self.ping_interval.is_zero()
    }
}

/// Events emitted by the liveness monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingEvent {
    /// Send a ping frame now.
    SendPing,
    /// No reply within the timeout; the connection is dead.
    Timeout,
}

/// State shared between the monitor and the frame reader.
#[derive(Debug)]
pub struct PingState {
    last_seen: RwLock<Instant>,
    waiting: AtomicBool,
}

impl Default for PingState {
    fn default() -> Self {
        Self::new()
    }
}

impl PingState {
    /// Create new state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_seen: RwLock::new(Instant::now()),
            waiting: AtomicBool::new(false),
        }
    }

    /// Record that the server showed signs of life.
    pub fn record_pong(&self) {
        *self.last_seen.write() = Instant::now();
        self.waiting.store(false, Ordering::SeqCst);
    }

    /// Mark that a ping is outstanding.
    pub fn mark_ping_sent(&self) {
        self.waiting.store(true, Ordering::SeqCst);
    }

    /// Whether a ping is outstanding.
    #[must_use]
    pub fn is_waiting_for_pong(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Time since the server last showed signs of life.
    #[must_use]
    pub fn time_since_pong(&self) -> Duration {
        self.last_seen.read().elapsed()
    }
}

/// Drives the ping schedule for one connection.
pub struct PingMonitor {
    config: PingConfig,
    state: Arc<PingState>,
    event_tx: mpsc::Sender<PingEvent>,
    cancel: CancellationToken,
}

impl PingMonitor {
    /// Create a new monitor.
    #[must_use]
    pub const fn new(
        config: PingConfig,
        state: Arc<PingState>,
        event_tx: mpsc::Sender<PingEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            state,
            event_tx,
            cancel,
        }
    }

    /// Run until cancelled, the receiver is dropped or a timeout fires.
    pub async fn run(self) {
        if !self.config.enabled() {
            return;
        }

        let start = Instant::now() + self.config.ping_interval;
        let mut interval = tokio::time::interval_at(start, self.config.ping_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Liveness monitor cancelled");
                    return;
                }
                _ = interval.tick() => {}
            }

            self.state.mark_ping_sent();
            if self.event_tx.send(PingEvent::SendPing).await.is_err() {
                tracing::debug!("Ping channel closed, stopping liveness monitor");
                return;
            }

            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Liveness monitor cancelled");
                    return;
                }
                () = tokio::time::sleep(self.config.ping_timeout) => {}
            }

            if self.state.is_waiting_for_pong() {
                tracing::warn!(
                    silent_secs = self.state.time_since_pong().as_secs(),
                    timeout_secs = self.config.ping_timeout.as_secs(),
                    "Ping timeout, connection considered dead"
                );
                let _ = self.event_tx.send(PingEvent::Timeout).await;
                return;
            }
        }
    }
}
