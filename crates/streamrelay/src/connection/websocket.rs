//! WebSocket client connection.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use super::{ConnectionError, OutboundConnection};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound half of a [`WebSocketConnection`].
pub type WsReader = SplitStream<WsStream>;

impl From<tungstenite::Error> for ConnectionError {
    fn from(e: tungstenite::Error) -> Self {
        match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Closed
            }
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Sends text frames over a client WebSocket.
pub struct WebSocketConnection {
    url: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
}

impl WebSocketConnection {
    /// Connect to `url` (`ws://` or `wss://`).
    ///
    /// The inbound half is returned separately; it must be polled (see
    /// [`spawn_inbound_logger`]) for the peer's control frames to be handled.
    pub async fn connect(url: &str) -> Result<(Self, WsReader), ConnectionError> {
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;
        info!(url, status = %response.status(), "WebSocket connected");

        let (sink, reader) = stream.split();
        Ok((
            Self {
                url: url.to_string(),
                sink: Mutex::new(sink),
            },
            reader,
        ))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a close frame and flush.
    pub async fn close(&self) -> Result<(), ConnectionError> {
        let mut sink = self.sink.lock().await;
        match sink.close().await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl OutboundConnection for WebSocketConnection {
    async fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        self.sink.lock().await.send(Message::text(text)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Drain and log frames sent by the peer until it closes the socket.
pub fn spawn_inbound_logger(mut reader: WsReader) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = reader.next().await {
            match msg {
                Ok(Message::Text(text)) => debug!(len = text.len(), "Inbound text frame"),
                Ok(Message::Close(frame)) => {
                    info!(?frame, "Peer closed the WebSocket");
                    break;
                }
                Ok(other) => trace!(len = other.len(), "Inbound frame"),
                Err(e) => {
                    warn!(error = %e, "WebSocket read error");
                    break;
                }
            }
        }
    })
}
