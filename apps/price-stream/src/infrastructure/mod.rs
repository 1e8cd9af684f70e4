//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the price stream client itself.

/// Twelve Data price stream: session, liveness, recovery and client facade.
pub mod twelvedata;

/// WebSocket transport adapter.
pub mod websocket;

/// Configuration loading and validation.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
