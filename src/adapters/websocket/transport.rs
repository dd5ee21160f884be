//! tokio-tungstenite implementation of the push transport port.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::ports::{FrameSink, InboundFrame, PushChannel, PushTransport, PushTransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default bound on the TCP connect plus WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens push channels over WebSocket.
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    connect_timeout: Duration,
}

impl TungsteniteTransport {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushTransport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<PushChannel, PushTransportError> {
        let (stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                PushTransportError::Connect(format!(
                    "handshake timed out after {}ms",
                    self.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| PushTransportError::Connect(e.to_string()))?;

        let (write, read) = stream.split();

        Ok(PushChannel {
            frames: read.map(to_inbound_frame).boxed(),
            sink: Box::new(TungsteniteSink { inner: write }),
        })
    }
}

/// Maps a tungstenite read result onto the transport-neutral frame type.
///
/// Only a close frame carrying the normal-closure code counts as clean.
fn to_inbound_frame(result: Result<Message, WsError>) -> InboundFrame {
    match result {
        Ok(Message::Text(text)) => InboundFrame::Text(text),
        Ok(Message::Close(frame)) => InboundFrame::Closed {
            clean: frame.map_or(false, |f| f.code == CloseCode::Normal),
        },
        Ok(_) => InboundFrame::Other,
        Err(e) => InboundFrame::Error(e.to_string()),
    }
}

struct TungsteniteSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for TungsteniteSink {
    async fn send_text(&mut self, text: String) -> Result<(), PushTransportError> {
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(map_send_error)
    }

    async fn close(&mut self) -> Result<(), PushTransportError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client disconnect".into(),
        };
        self.inner
            .send(Message::Close(Some(frame)))
            .await
            .map_err(map_send_error)
    }
}

fn map_send_error(error: WsError) -> PushTransportError {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => PushTransportError::Closed,
        other => PushTransportError::Protocol(other.to_string()),
    }
}
