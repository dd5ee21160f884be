//! PushTransport port - Interface for the persistent push channel.
//!
//! The connection manager opens channels through this port and never sees
//! the underlying WebSocket library. A channel is split into an inbound
//! frame stream and an outbound sink so both can be driven concurrently.

use async_trait::async_trait;
use futures::stream::BoxStream;

/// One event read from the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A text frame carrying a JSON message.
    Text(String),
    /// The peer closed the channel. `clean` is true for a normal closure.
    Closed { clean: bool },
    /// A transport-level error. The channel should be treated as dead.
    Error(String),
    /// Binary, ping/pong and other control frames.
    Other,
}

/// Errors raised by push transport operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushTransportError {
    /// The connection could not be established.
    #[error("Push connection failed: {0}")]
    Connect(String),

    /// A protocol or I/O failure on an established connection.
    #[error("Push protocol error: {0}")]
    Protocol(String),

    /// The channel is already closed.
    #[error("Push channel closed")]
    Closed,
}

/// Outbound half of a push channel.
#[async_trait]
pub trait FrameSink: Send {
    /// Send a text frame.
    async fn send_text(&mut self, text: String) -> Result<(), PushTransportError>;

    /// Close the channel with a normal closure.
    async fn close(&mut self) -> Result<(), PushTransportError>;
}

/// An open push channel.
///
/// The stream ending without a `Closed` frame means the connection dropped.
pub struct PushChannel {
    pub frames: BoxStream<'static, InboundFrame>,
    pub sink: Box<dyn FrameSink>,
}

impl std::fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannel").finish_non_exhaustive()
    }
}

/// Port for opening push channels.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Open a channel to `url`.
    async fn connect(&self, url: &str) -> Result<PushChannel, PushTransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_transport_object_safe(_: &dyn PushTransport) {}

    #[allow(dead_code)]
    fn assert_sink_object_safe(_: &dyn FrameSink) {}

    #[test]
    fn error_messages_are_descriptive() {
        let err = PushTransportError::Connect("connection refused".to_string());
        assert_eq!(err.to_string(), "Push connection failed: connection refused");
        assert_eq!(PushTransportError::Closed.to_string(), "Push channel closed");
    }
}
