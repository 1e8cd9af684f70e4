#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Price Stream - Self-Healing Real-Time Quote Client
//!
//! Keeps one WebSocket connection to the Twelve Data real-time price feed,
//! converges the live subscription toward the symbols the caller wants, and
//! recovers from transport failures with a fixed back-off. Decoded events
//! reach the caller's callback through a bounded queue drained by a
//! dedicated thread, so a slow callback never stalls the network.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and logic
//!   - `symbol`: Symbol normalization
//!   - `subscription`: Desired/subscribed reconciliation
//!   - `streaming`: Session state and event type
//!
//! - **Application**: Ports and services
//!   - `ports`: Transport interface
//!   - `services`: Bounded event queue and consumer thread
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `twelvedata`: Session, liveness, recovery and client facade
//!   - `websocket`: tokio-tungstenite transport
//!   - `config`: Configuration and validation
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! subscribe()/unsubscribe() ──▶ Session ──control frames──▶ WebSocket
//!                                                              │
//! callback ◀── consumer thread ◀── bounded queue ◀── decode ◀──┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Ports and services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{SessionState, StreamEvent};
pub use domain::subscription::{SubscriptionChanges, reconcile};
pub use domain::symbol::{IntoSymbols, Symbol, SymbolSet, normalize_symbols};

// Ports and services
pub use application::ports::{
    CloseFrame, InboundFrame, OutboundFrame, Transport, TransportConnection, TransportError,
};
pub use application::services::{DEFAULT_MAX_QUEUE_SIZE, EventCallback};

// Client
pub use infrastructure::twelvedata::{ClientError, PriceStreamClient};

// Infrastructure config
pub use infrastructure::config::{
    ApiKey, ConfigError, RuntimeSettings, StreamConfig, WebSocketSettings,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{
    LogLevel, TelemetryConfig, TelemetryGuard, init as init_telemetry,
};
