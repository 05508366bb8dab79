//! Outbound connections the relay writes text frames to.

mod channel;
mod websocket;

use async_trait::async_trait;

pub use channel::ChannelConnection;
pub use websocket::{WebSocketConnection, WsReader, spawn_inbound_logger};

/// Errors surfaced by an outbound connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection closed")]
    Closed,

    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// The send half of a bidirectional text-frame transport.
///
/// `send_text` completes once the frame has been handed to the transport,
/// not when the peer acknowledges it.
#[async_trait]
pub trait OutboundConnection: Send + Sync + 'static {
    async fn send_text(&self, text: String) -> Result<(), ConnectionError>;

    /// Name for logging.
    fn name(&self) -> &'static str {
        "connection"
    }
}
