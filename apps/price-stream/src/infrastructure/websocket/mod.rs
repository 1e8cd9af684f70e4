//! WebSocket Transport
//!
//! [`Transport`] adapter over `tokio-tungstenite` (rustls, webpki roots).
//!
//! Inbound pings are answered by tungstenite itself and never reach the
//! session. Binary frames are forwarded as text when they hold UTF-8.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;

use crate::application::ports::{
    CloseFrame, InboundFrame, OutboundFrame, Transport, TransportConnection, TransportError,
};

/// TLS WebSocket transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteTransport;

impl TungsteniteTransport {
    /// Create a new transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<TransportConnection, TransportError> {
        let (ws_stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| TransportError::Send(e.to_string()))
            .with(|frame: OutboundFrame| future::ready(Ok::<_, TransportError>(to_message(frame))));

        let stream = read.filter_map(|message| future::ready(from_message(message)));

        Ok(TransportConnection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

fn to_message(frame: OutboundFrame) -> Message {
    match frame {
        OutboundFrame::Text(text) => Message::Text(text.into()),
        OutboundFrame::Ping => Message::Ping(Vec::new().into()),
        OutboundFrame::Close => Message::Close(None),
    }
}

fn from_message(
    message: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<InboundFrame, TransportError>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(InboundFrame::Text(text.as_str().to_owned()))),
        Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
            Ok(text) => Some(Ok(InboundFrame::Text(text))),
            Err(_) => {
                tracing::debug!(bytes = data.len(), "Ignoring non-UTF-8 binary frame");
                None
            }
        },
        Ok(Message::Pong(_)) => Some(Ok(InboundFrame::Pong)),
        Ok(Message::Close(frame)) => Some(Ok(InboundFrame::Close(frame.map(from_close_frame)))),
        Ok(Message::Ping(_) | Message::Frame(_)) => None,
        Err(e) => Some(Err(TransportError::Receive(e.to_string()))),
    }
}

fn from_close_frame(frame: WsCloseFrame) -> CloseFrame {
    CloseFrame {
        code: u16::from(frame.code),
        reason: frame.reason.as_str().to_owned(),
    }
}
