//! Stream Configuration Settings
//!
//! Configuration types for the price stream client, built in code or loaded
//! from environment variables.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::application::services::{DEFAULT_MAX_QUEUE_SIZE, EventCallback, MAX_QUEUE_SIZE};
use crate::domain::streaming::StreamEvent;
use crate::domain::symbol::{IntoSymbols, SymbolSet, normalize_symbols};

/// Default streaming host.
pub const DEFAULT_HOST: &str = "ws.twelvedata.com";

/// Path of the real-time price endpoint.
const PRICE_ENDPOINT_PATH: &str = "/v1/quotes/price";

/// Twelve Data API key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw API key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the raw key.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the key is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&"[REDACTED]").finish()
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketSettings {
    /// Interval between liveness pings (zero disables pings).
    pub ping_interval: Duration,
    /// How long to wait for a pong before the connection is considered dead.
    pub ping_timeout: Duration,
    /// Fixed delay before each reconnection attempt.
    pub self_heal_time: Duration,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(15),
            ping_timeout: Duration::from_secs(10),
            self_heal_time: Duration::from_secs(1),
        }
    }
}

/// Complete client configuration.
#[derive(Clone)]
pub struct StreamConfig {
    /// API credentials.
    pub api_key: ApiKey,
    /// Streaming host.
    pub host: String,
    /// Initial desired symbols.
    pub symbols: SymbolSet,
    /// Event queue capacity.
    pub max_queue_size: usize,
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
    /// Callback invoked for every event. Events are discarded when unset.
    pub on_event: Option<EventCallback>,
}

impl fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConfig")
            .field("api_key", &self.api_key)
            .field("host", &self.host)
            .field("symbols", &self.symbols)
            .field("max_queue_size", &self.max_queue_size)
            .field("websocket", &self.websocket)
            .field("on_event", &self.on_event.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl StreamConfig {
    /// Create a configuration with defaults for everything but the key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            host: DEFAULT_HOST.to_string(),
            symbols: SymbolSet::new(),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            websocket: WebSocketSettings::default(),
            on_event: None,
        }
    }

    /// Set the initial symbols.
    #[must_use]
    pub fn with_symbols(mut self, symbols: impl IntoSymbols) -> Self {
        self.symbols = symbols.into_symbols();
        self
    }

    /// Set the streaming host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the event queue capacity.
    #[must_use]
    pub const fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the WebSocket settings.
    #[must_use]
    pub const fn with_websocket(mut self, websocket: WebSocketSettings) -> Self {
        self.websocket = websocket;
        self
    }

    /// Set the event callback.
    #[must_use]
    pub fn with_on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(StreamEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_event = Some(std::sync::Arc::new(callback));
        self
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `TWELVEDATA_API_KEY` is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("TWELVEDATA_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("TWELVEDATA_API_KEY".to_string()))?;

        if api_key.trim().is_empty() {
            return Err(ConfigError::EmptyValue("TWELVEDATA_API_KEY".to_string()));
        }

        let host = std::env::var("PRICE_STREAM_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let symbols = std::env::var("PRICE_STREAM_SYMBOLS")
            .map(|raw| normalize_symbols([raw]))
            .unwrap_or_default();

        let defaults = WebSocketSettings::default();
        let websocket = WebSocketSettings {
            ping_interval: parse_env_duration_secs(
                "PRICE_STREAM_PING_INTERVAL_SECS",
                defaults.ping_interval,
            ),
            ping_timeout: parse_env_duration_secs(
                "PRICE_STREAM_PING_TIMEOUT_SECS",
                defaults.ping_timeout,
            ),
            self_heal_time: parse_env_duration_millis(
                "PRICE_STREAM_SELF_HEAL_MS",
                defaults.self_heal_time,
            ),
        };

        Ok(Self {
            api_key: ApiKey::new(api_key),
            host,
            symbols,
            max_queue_size: parse_env_usize("PRICE_STREAM_MAX_QUEUE_SIZE", DEFAULT_MAX_QUEUE_SIZE),
            websocket,
            on_event: None,
        })
    }

    /// Check the configuration for values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_blank() {
            return Err(ConfigError::EmptyValue("api_key".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyValue("host".to_string()));
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.max_queue_size > MAX_QUEUE_SIZE {
            return Err(ConfigError::QueueCapacityTooLarge {
                requested: self.max_queue_size,
                max: MAX_QUEUE_SIZE,
            });
        }
        let ws = &self.websocket;
        if !ws.ping_interval.is_zero() && ws.ping_timeout >= ws.ping_interval {
            return Err(ConfigError::PingTimeoutTooLong {
                timeout: ws.ping_timeout,
                interval: ws.ping_interval,
            });
        }
        if ws.self_heal_time.is_zero() {
            return Err(ConfigError::ZeroSelfHealTime);
        }
        Ok(())
    }

    /// Full WebSocket URL of the price endpoint, API key included.
    #[must_use]
    pub fn stream_url(&self) -> String {
        format!(
            "wss://{}{PRICE_ENDPOINT_PATH}?apikey={}",
            self.host,
            self.api_key.expose()
        )
    }

    /// The stream URL with the API key masked, for logs.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        format!("wss://{}{PRICE_ENDPOINT_PATH}?apikey=***", self.host)
    }
}

/// Process-level settings used by the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Period of the application-level heartbeat frame (never zero).
    pub heartbeat_interval: Duration,
    /// Prometheus listen address (`None` = metrics disabled).
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            metrics_addr: None,
        }
    }
}

impl RuntimeSettings {
    /// Load settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `PRICE_STREAM_METRICS_ADDR` is set but is not a
    /// socket address.
    pub fn from_env() -> Result<Self, ConfigError> {
        let metrics_addr = match std::env::var("PRICE_STREAM_METRICS_ADDR") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse().map_err(|_| {
                ConfigError::InvalidValue {
                    key: "PRICE_STREAM_METRICS_ADDR".to_string(),
                    value: raw.clone(),
                }
            })?),
            _ => None,
        };

        let default = Self::default().heartbeat_interval;
        let mut heartbeat_interval = parse_env_duration_secs("PRICE_STREAM_HEARTBEAT_SECS", default);
        if heartbeat_interval.is_zero() {
            heartbeat_interval = default;
        }

        Ok(Self {
            heartbeat_interval,
            metrics_addr,
        })
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Value is empty.
    #[error("{0} cannot be empty")]
    EmptyValue(String),
    /// Value could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// Queue capacity is zero.
    #[error("max_queue_size must be greater than zero")]
    ZeroQueueCapacity,
    /// Queue capacity exceeds what the channel supports.
    #[error("max_queue_size {requested} exceeds the maximum of {max}")]
    QueueCapacityTooLarge {
        /// Configured capacity.
        requested: usize,
        /// Largest accepted capacity.
        max: usize,
    },
    /// Ping timeout does not fit inside the ping interval.
    #[error("ping timeout {timeout:?} must be shorter than ping interval {interval:?}")]
    PingTimeoutTooLong {
        /// Configured timeout.
        timeout: Duration,
        /// Configured interval.
        interval: Duration,
    },
    /// Recovery back-off is zero.
    #[error("self-heal time must be greater than zero")]
    ZeroSelfHealTime,
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
