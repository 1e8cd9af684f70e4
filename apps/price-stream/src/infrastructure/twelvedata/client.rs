//! Price Stream Client
//!
//! Public facade over the session, the recovery loop and the event consumer.
//!
//! Construction validates the configuration, creates the bounded event
//! queue and starts the consumer thread; nothing touches the network until
//! [`PriceStreamClient::connect`] is awaited.
//!
//! # Example
//!
//! ```rust,no_run
//! use price_stream::{PriceStreamClient, StreamConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = StreamConfig::new("your-api-key")
//!     .with_symbols("AAPL,MSFT")
//!     .with_on_event(|event| {
//!         println!("{event}");
//!         Ok(())
//!     });
//!
//! let client = PriceStreamClient::new(config)?;
//! client.connect().await;
//! client.subscribe("TSLA");
//! # Ok(())
//! # }
//! ```

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::ports::Transport;
use crate::application::services::{EventSender, event_queue, spawn_consumer};
use crate::domain::streaming::SessionState;
use crate::domain::symbol::{IntoSymbols, SymbolSet};
use crate::infrastructure::config::{ConfigError, StreamConfig};
use crate::infrastructure::twelvedata::liveness::PingConfig;
use crate::infrastructure::twelvedata::recovery::{RecoveryConfig, RecoveryPolicy};
use crate::infrastructure::twelvedata::session::{Session, SessionRunner};
use crate::infrastructure::websocket::TungsteniteTransport;

/// How long `connect()`/`disconnect()` wait for the previous connection task.
const TEARDOWN_GRACE: Duration = Duration::from_secs(1);

/// Client construction errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The consumer thread could not be started.
    #[error("failed to start event consumer: {0}")]
    ConsumerSpawn(#[source] io::Error),
}

struct RunnerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Self-healing real-time price stream client.
pub struct PriceStreamClient {
    config: StreamConfig,
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    events: EventSender,
    runner: tokio::sync::Mutex<Option<RunnerHandle>>,
    root_cancel: CancellationToken,
    consumer: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for PriceStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceStreamClient")
            .field("config", &self.config)
            .field("state", &self.session.state())
            .finish_non_exhaustive()
    }
}

impl PriceStreamClient {
    /// Create a client that connects over TLS WebSockets.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the consumer
    /// thread cannot be started.
    pub fn new(config: StreamConfig) -> Result<Self, ClientError> {
        Self::with_transport(config, Arc::new(TungsteniteTransport::new()))
    }

    /// Create a client over a custom transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the consumer
    /// thread cannot be started.
    pub fn with_transport(
        config: StreamConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        config.validate()?;

        let (events, receiver) = event_queue(config.max_queue_size);
        let consumer =
            spawn_consumer(receiver, config.on_event.clone()).map_err(ClientError::ConsumerSpawn)?;

        tracing::debug!(
            symbols = config.symbols.len(),
            max_queue_size = config.max_queue_size,
            "Price stream client created"
        );

        Ok(Self {
            session: Arc::new(Session::new(config.symbols.clone())),
            config,
            transport,
            events,
            runner: tokio::sync::Mutex::new(None),
            root_cancel: CancellationToken::new(),
            consumer: Some(consumer),
        })
    }

    /// Add symbols to the desired set.
    ///
    /// Sent to the server right away when ready, otherwise on the next open.
    pub fn subscribe(&self, symbols: impl IntoSymbols) {
        let symbols = symbols.into_symbols();
        if symbols.is_empty() {
            return;
        }
        self.session.add_desired(symbols);
    }

    /// Remove symbols from the desired set.
    ///
    /// Sent to the server right away when ready, otherwise on the next open.
    pub fn unsubscribe(&self, symbols: impl IntoSymbols) {
        let symbols = symbols.into_symbols();
        if symbols.is_empty() {
            return;
        }
        self.session.remove_desired(&symbols);
    }

    /// Start streaming, replacing any existing connection.
    ///
    /// Returns once the connection task is running; readiness is reported
    /// through [`state_changes`](Self::state_changes). Failures are retried
    /// in the background forever.
    pub async fn connect(&self) {
        let mut runner = self.runner.lock().await;
        if let Some(previous) = runner.take() {
            tracing::info!("Replacing existing price stream connection");
            teardown(previous).await;
        }

        let epoch = self.session.next_epoch();
        let cancel = self.root_cancel.child_token();
        let task = SessionRunner::new(
            Arc::clone(&self.session),
            Arc::clone(&self.transport),
            self.config.stream_url(),
            self.config.redacted_url(),
            PingConfig::from_websocket_settings(&self.config.websocket),
            RecoveryPolicy::new(RecoveryConfig::from_websocket_settings(&self.config.websocket)),
            self.events.clone(),
            cancel.clone(),
            epoch,
        );

        let join = tokio::spawn(
            task.run()
                .instrument(tracing::info_span!("price_stream_session", epoch)),
        );
        *runner = Some(RunnerHandle { cancel, join });
    }

    /// Stop streaming without recovery.
    ///
    /// The desired set is kept, so a later [`connect`](Self::connect)
    /// resubscribes to the same symbols.
    pub async fn disconnect(&self) {
        let mut runner = self.runner.lock().await;
        let _ = self.session.next_epoch();
        if let Some(previous) = runner.take() {
            teardown(previous).await;
            tracing::info!("Price stream disconnected");
        }
    }

    /// Send the application-level heartbeat.
    ///
    /// Returns `false` (and sends nothing) when not ready.
    pub fn heartbeat(&self) -> bool {
        self.session.send_heartbeat()
    }

    /// Alias of [`heartbeat`](Self::heartbeat).
    #[deprecated(note = "use `heartbeat` instead")]
    pub fn keep_alive(&self) -> bool {
        self.heartbeat()
    }

    /// Drop every subscription, server-side (when ready) and locally.
    ///
    /// Symbols are not resubscribed; call [`subscribe`](Self::subscribe)
    /// again afterwards.
    pub fn reset(&self) {
        self.session.send_reset();
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Watch session state changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.session.state_changes()
    }

    /// Symbols the client wants streamed.
    #[must_use]
    pub fn desired_symbols(&self) -> SymbolSet {
        self.session.desired()
    }

    /// Symbols the server has been told about on the current connection.
    #[must_use]
    pub fn subscribed_symbols(&self) -> SymbolSet {
        self.session.subscribed()
    }

    /// The client configuration.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }
}

impl Drop for PriceStreamClient {
    fn drop(&mut self) {
        self.root_cancel.cancel();
        // The consumer exits by itself once the runner drops its sender;
        // joining here could block inside the runtime.
        drop(self.consumer.take());
    }
}

async fn teardown(handle: RunnerHandle) {
    handle.cancel.cancel();
    let RunnerHandle { join, .. } = handle;
    let abort = join.abort_handle();
    match tokio::time::timeout(TEARDOWN_GRACE, join).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Connection task ended abnormally"),
        Err(_) => {
            tracing::warn!("Connection task did not stop in time, aborting");
            abort.abort();
        }
    }
}
