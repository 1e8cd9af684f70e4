//! Stream Codec
//!
//! JSON encoding of client control frames and decoding of server events.
//!
//! Control frames on the wire:
//!
//! ```json
//! {"action":"subscribe","params":{"symbols":"AAPL,MSFT"}}
//! {"action":"unsubscribe","params":{"symbols":"TSLA"}}
//! {"action":"heartbeat"}
//! {"action":"reset"}
//! ```
//!
//! Server events are passed through as untyped JSON.

use serde::Serialize;

use crate::domain::streaming::StreamEvent;
use crate::domain::symbol::{SymbolSet, join_symbols};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Symbol list parameter of subscribe/unsubscribe frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolParams {
    /// Comma-joined symbols.
    pub symbols: String,
}

/// Client-to-server control frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ControlFrame {
    /// Start streaming symbols.
    Subscribe {
        /// Symbols to add.
        params: SymbolParams,
    },
    /// Stop streaming symbols.
    Unsubscribe {
        /// Symbols to remove.
        params: SymbolParams,
    },
    /// Application-level keep-alive.
    Heartbeat,
    /// Drop every subscription server-side.
    Reset,
}

impl ControlFrame {
    /// Subscribe frame for a symbol set.
    #[must_use]
    pub fn subscribe(symbols: &SymbolSet) -> Self {
        Self::Subscribe {
            params: SymbolParams {
                symbols: join_symbols(symbols),
            },
        }
    }

    /// Unsubscribe frame for a symbol set.
    #[must_use]
    pub fn unsubscribe(symbols: &SymbolSet) -> Self {
        Self::Unsubscribe {
            params: SymbolParams {
                symbols: join_symbols(symbols),
            },
        }
    }

    /// The frame's `action` value.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Heartbeat => "heartbeat",
            Self::Reset => "reset",
        }
    }
}

/// JSON codec for the price stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a control frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self, frame: &ControlFrame) -> Result<String, CodecError> {
        Ok(serde_json::to_string(frame)?)
    }

    /// Decode a server text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON.
    pub fn decode(&self, text: &str) -> Result<StreamEvent, CodecError> {
        Ok(serde_json::from_str(text)?)
    }
}
