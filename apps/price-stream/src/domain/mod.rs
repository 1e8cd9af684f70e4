//! Domain Layer - Core streaming types and business logic.
//!
//! This layer contains the symbol model, the subscription reconciler and the
//! session state types. Nothing here performs I/O.

/// Instrument symbols and normalization.
pub mod symbol;

/// Session state and inbound event types.
pub mod streaming;

/// Desired/subscribed tracking and reconciliation.
pub mod subscription;
