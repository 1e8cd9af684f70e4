//! Twelve Data Price Stream
//!
//! Client for the real-time price endpoint
//! (`wss://ws.twelvedata.com/v1/quotes/price`).
//!
//! # Architecture
//!
//! ```text
//! PriceStreamClient ──▶ Session (mutex: state, symbol sets, writer)
//!        │                  ▲
//!        │ connect()        │ on_open / on_closed
//!        ▼                  │
//!   SessionRunner ──▶ Transport ──▶ frames ──▶ EventQueue ──▶ consumer thread ──▶ callback
//!        │
//!        ├── PingMonitor (liveness)
//!        └── RecoveryPolicy (fixed back-off)
//! ```

pub mod client;
pub mod codec;
pub mod liveness;
pub mod recovery;
pub mod session;

pub use client::{ClientError, PriceStreamClient};
pub use codec::{CodecError, ControlFrame, JsonCodec};
pub use liveness::{PingConfig, PingEvent, PingMonitor, PingState};
pub use recovery::{DEFAULT_SELF_HEAL_TIME, RecoveryConfig, RecoveryPolicy};
pub use session::{Session, SessionRunner};
