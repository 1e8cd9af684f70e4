//! Connection Session
//!
//! [`Session`] is the single owner of mutable streaming state: the session
//! state machine, the desired/subscribed symbol sets and the writer handle
//! of the live connection. Every mutation happens under one mutex, and
//! control frames are queued to the writer while that mutex is held, so a
//! caller's reconciliation can never interleave with the open handler.
//!
//! [`SessionRunner`] is the network side: one task per `connect()` that
//! establishes the transport, pumps frames, watches liveness and recovers
//! from failures with a fixed back-off.
//!
//! # Epochs
//!
//! Every `connect()`/`disconnect()` starts a new epoch. A runner only
//! mutates the session while its epoch is current, so a superseded task
//! winding down cannot clobber the state of its replacement.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::ports::{
    CloseFrame, FrameSink, InboundFrame, OutboundFrame, Transport, TransportConnection,
    TransportError,
};
use crate::application::services::EventSender;
use crate::domain::streaming::SessionState;
use crate::domain::subscription::SubscriptionState;
use crate::domain::symbol::SymbolSet;
use crate::infrastructure::metrics::{
    record_connection_attempt, record_connection_failure, record_control_frame,
    record_decode_error, set_session_ready, set_subscribed_symbols,
};
use crate::infrastructure::twelvedata::codec::{ControlFrame, JsonCodec};
use crate::infrastructure::twelvedata::liveness::{PingConfig, PingEvent, PingMonitor, PingState};
use crate::infrastructure::twelvedata::recovery::RecoveryPolicy;

/// How long a cancelled connection gets to send its close frame.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

// =============================================================================
// Session
// =============================================================================

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    subscriptions: SubscriptionState,
    outbound: Option<mpsc::UnboundedSender<OutboundFrame>>,
    epoch: u64,
}

/// Shared streaming state for one client.
#[derive(Debug)]
pub struct Session {
    inner: Mutex<SessionInner>,
    state_tx: watch::Sender<SessionState>,
    codec: JsonCodec,
}

impl Session {
    /// Create a disconnected session with an initial desired set.
    #[must_use]
    pub fn new(desired: SymbolSet) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            inner: Mutex::new(SessionInner {
                state: SessionState::Disconnected,
                subscriptions: SubscriptionState::new(desired),
                outbound: None,
                epoch: 0,
            }),
            state_tx,
            codec: JsonCodec::new(),
        }
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Current connection epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    /// Snapshot of the desired symbols.
    #[must_use]
    pub fn desired(&self) -> SymbolSet {
        self.inner.lock().subscriptions.desired().clone()
    }

    /// Snapshot of the subscribed symbols.
    #[must_use]
    pub fn subscribed(&self) -> SymbolSet {
        self.inner.lock().subscriptions.subscribed().clone()
    }

    /// Add symbols to the desired set, reconciling immediately when ready.
    pub fn add_desired(&self, symbols: SymbolSet) {
        let mut inner = self.inner.lock();
        inner.subscriptions.add_desired(symbols);
        if inner.state.is_ready() {
            self.reconcile_locked(&mut inner);
        }
    }

    /// Remove symbols from the desired set, reconciling immediately when ready.
    pub fn remove_desired(&self, symbols: &SymbolSet) {
        let mut inner = self.inner.lock();
        inner.subscriptions.remove_desired(symbols);
        if inner.state.is_ready() {
            self.reconcile_locked(&mut inner);
        }
    }

    /// Send the application-level heartbeat.
    ///
    /// Returns `false` without sending anything when not ready.
    pub fn send_heartbeat(&self) -> bool {
        let inner = self.inner.lock();
        if !inner.state.is_ready() {
            tracing::debug!(state = %inner.state, "Heartbeat skipped, session not ready");
            return false;
        }
        self.send_control_locked(&inner, &ControlFrame::Heartbeat)
    }

    /// Send a reset frame (when ready) and forget every symbol.
    ///
    /// Both sets are cleared regardless of state. Nothing is resubscribed.
    pub fn send_reset(&self) {
        let mut inner = self.inner.lock();
        if inner.state.is_ready() {
            self.send_control_locked(&inner, &ControlFrame::Reset);
        }
        inner.subscriptions.clear_all();
        set_subscribed_symbols(0);
    }

    /// Start a new epoch: drop the writer, forget the server-side
    /// subscription and go `Disconnected`.
    ///
    /// Returns the new epoch.
    pub fn next_epoch(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.outbound = None;
        clear_subscribed_locked(&mut inner);
        self.set_state_locked(&mut inner, SessionState::Disconnected);
        inner.epoch
    }

    /// Mark a connection attempt as in flight.
    ///
    /// Returns `false` if `epoch` has been superseded.
    pub fn begin_connecting(&self, epoch: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return false;
        }
        inner.outbound = None;
        clear_subscribed_locked(&mut inner);
        self.set_state_locked(&mut inner, SessionState::Connecting);
        true
    }

    /// The transport opened: go ready and run the initial reconciliation.
    ///
    /// Returns `false` if `epoch` has been superseded.
    pub fn on_open(&self, epoch: u64, outbound: mpsc::UnboundedSender<OutboundFrame>) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return false;
        }
        inner.outbound = Some(outbound);
        clear_subscribed_locked(&mut inner);
        self.set_state_locked(&mut inner, SessionState::Ready);
        self.reconcile_locked(&mut inner);
        true
    }

    /// The transport went away.
    pub fn on_closed(&self, epoch: u64) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            return;
        }
        inner.outbound = None;
        clear_subscribed_locked(&mut inner);
        self.set_state_locked(&mut inner, SessionState::Disconnected);
    }

    fn set_state_locked(&self, inner: &mut SessionInner, state: SessionState) {
        if inner.state != state {
            tracing::debug!(from = %inner.state, to = %state, "Session state changed");
        }
        inner.state = state;
        set_session_ready(state.is_ready());
        self.state_tx.send_replace(state);
    }

    fn reconcile_locked(&self, inner: &mut SessionInner) {
        let changes = inner.subscriptions.reconcile();
        if changes.is_empty() {
            return;
        }

        if !changes.subscribe.is_empty() {
            tracing::info!(symbols = changes.subscribe.len(), "Subscribing");
            self.send_control_locked(inner, &ControlFrame::subscribe(&changes.subscribe));
        }
        if !changes.unsubscribe.is_empty() {
            tracing::info!(symbols = changes.unsubscribe.len(), "Unsubscribing");
            self.send_control_locked(inner, &ControlFrame::unsubscribe(&changes.unsubscribe));
        }
        set_subscribed_symbols(inner.subscriptions.subscribed().len());
    }

    fn send_control_locked(&self, inner: &SessionInner, frame: &ControlFrame) -> bool {
        let Some(outbound) = inner.outbound.as_ref() else {
            return false;
        };

        let text = match self.codec.encode(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, action = frame.action(), "Failed to encode control frame");
                return false;
            }
        };

        if outbound.send(OutboundFrame::Text(text)).is_err() {
            tracing::debug!(action = frame.action(), "Writer gone, control frame dropped");
            return false;
        }

        record_control_frame(frame.action());
        tracing::debug!(action = frame.action(), "Control frame queued");
        true
    }
}

fn clear_subscribed_locked(inner: &mut SessionInner) {
    inner.subscriptions.clear_subscribed();
    set_subscribed_symbols(0);
}

// =============================================================================
// Session Runner
// =============================================================================

/// Why a connection ended.
#[derive(Debug)]
enum SessionEnd {
    /// `disconnect()`/`connect()`/drop asked us to stop.
    Cancelled,
    /// The server closed with code 1000.
    NormalClose,
    /// Anything else; recovery runs.
    Failed(TransportError),
}

/// Network task for one connection epoch.
pub struct SessionRunner {
    session: Arc<Session>,
    transport: Arc<dyn Transport>,
    url: String,
    redacted_url: String,
    ping: PingConfig,
    recovery: RecoveryPolicy,
    events: EventSender,
    cancel: CancellationToken,
    epoch: u64,
}

impl SessionRunner {
    /// Create a runner.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        session: Arc<Session>,
        transport: Arc<dyn Transport>,
        url: String,
        redacted_url: String,
        ping: PingConfig,
        recovery: RecoveryPolicy,
        events: EventSender,
        cancel: CancellationToken,
        epoch: u64,
    ) -> Self {
        Self {
            session,
            transport,
            url,
            redacted_url,
            ping,
            recovery,
            events,
            cancel,
            epoch,
        }
    }

    /// Connect, stream, and recover until cancelled or closed normally.
    pub async fn run(mut self) {
        loop {
            if !self.session.begin_connecting(self.epoch) {
                break;
            }

            record_connection_attempt();
            tracing::info!(url = %self.redacted_url, "Connecting to price stream");

            let connected = tokio::select! {
                () = self.cancel.cancelled() => break,
                result = self.transport.connect(&self.url) => result,
            };

            match connected {
                Ok(connection) => {
                    self.recovery.reset();
                    match self.drive(connection).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::NormalClose => {
                            tracing::info!("Price stream closed by server");
                            self.session.on_closed(self.epoch);
                            break;
                        }
                        SessionEnd::Failed(e) => {
                            record_connection_failure(e.kind());
                            tracing::warn!(error = %e, "Price stream connection lost");
                            self.session.on_closed(self.epoch);
                        }
                    }
                }
                Err(e) => {
                    record_connection_failure(e.kind());
                    tracing::warn!(error = %e, "Price stream connection failed");
                    self.session.on_closed(self.epoch);
                }
            }

            if !self.recovery.backoff(&self.cancel).await {
                break;
            }
        }

        tracing::debug!("Session runner stopped");
    }

    async fn drive(&self, connection: TransportConnection) -> SessionEnd {
        let TransportConnection {
            mut sink,
            mut stream,
        } = connection;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        if !self.session.on_open(self.epoch, out_tx) {
            close_gracefully(&mut sink).await;
            return SessionEnd::Cancelled;
        }
        tracing::info!("Price stream ready");

        let ping_state = Arc::new(PingState::new());
        let (ping_tx, mut ping_rx) = mpsc::channel(4);
        let ping_cancel = self.cancel.child_token();
        let _ping_guard = ping_cancel.clone().drop_guard();
        tokio::spawn(
            PingMonitor::new(self.ping, Arc::clone(&ping_state), ping_tx, ping_cancel)
                .run()
                .in_current_span(),
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    close_gracefully(&mut sink).await;
                    return SessionEnd::Cancelled;
                }
                Some(frame) = out_rx.recv() => {
                    if let Err(e) = sink.send(frame).await {
                        return SessionEnd::Failed(e);
                    }
                }
                Some(event) = ping_rx.recv() => match event {
                    PingEvent::SendPing => {
                        if let Err(e) = sink.send(OutboundFrame::Ping).await {
                            return SessionEnd::Failed(e);
                        }
                    }
                    PingEvent::Timeout => {
                        let timeout = self.ping.ping_timeout;
                        return SessionEnd::Failed(TransportError::PingTimeout(timeout));
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(InboundFrame::Text(text))) => {
                        ping_state.record_pong();
                        self.handle_text(&text);
                    }
                    Some(Ok(InboundFrame::Pong)) => ping_state.record_pong(),
                    Some(Ok(InboundFrame::Close(close))) => return classify_close(close),
                    Some(Err(e)) => return SessionEnd::Failed(e),
                    None => {
                        return SessionEnd::Failed(TransportError::AbnormalClose(
                            "stream ended without close frame".to_string(),
                        ));
                    }
                },
            }
        }
    }

    fn handle_text(&self, text: &str) {
        match self.session.codec.decode(text) {
            Ok(event) => {
                let _ = self.events.put(event);
            }
            Err(e) => {
                record_decode_error();
                tracing::warn!(error = %e, bytes = text.len(), "Discarding undecodable frame");
            }
        }
    }
}

fn classify_close(close: Option<CloseFrame>) -> SessionEnd {
    match close {
        Some(frame) if frame.is_normal() => SessionEnd::NormalClose,
        Some(frame) => SessionEnd::Failed(TransportError::AbnormalClose(format!(
            "code {} ({})",
            frame.code, frame.reason
        ))),
        None => SessionEnd::Failed(TransportError::AbnormalClose(
            "close without status".to_string(),
        )),
    }
}

async fn close_gracefully(sink: &mut FrameSink) {
    match tokio::time::timeout(CLOSE_GRACE, sink.send(OutboundFrame::Close)).await {
        Ok(Ok(())) => tracing::debug!("Close frame sent"),
        Ok(Err(e)) => tracing::debug!(error = %e, "Close frame not sent"),
        Err(_) => tracing::debug!("Close frame timed out"),
    }
}

// =============================================================================
// Tests
// =============================================================================
