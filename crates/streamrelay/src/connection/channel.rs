//! In-process connection backed by a tokio channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ConnectionError, OutboundConnection};

/// Delivers frames to an in-process consumer instead of a socket.
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    frame_tx: mpsc::UnboundedSender<String>,
}

impl ChannelConnection {
    pub const fn new(frame_tx: mpsc::UnboundedSender<String>) -> Self {
        Self { frame_tx }
    }

    /// Create a connection together with the receiver that observes its frames.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl OutboundConnection for ChannelConnection {
    async fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        self.frame_tx.send(text).map_err(|_| ConnectionError::Closed)
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_arrive_in_send_order() {
        let (conn, mut rx) = ChannelConnection::pair();
        conn.send_text("a".into()).await.unwrap();
        conn.send_text("b".into()).await.unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn dropped_receiver_reports_closed() {
        let (conn, rx) = ChannelConnection::pair();
        drop(rx);

        let err = conn.send_text("lost".into()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Closed));
    }
}
