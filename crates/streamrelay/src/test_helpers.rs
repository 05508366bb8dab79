//! Shared test helpers for relay and connection tests.
//!
//! `RecordingConnection` records every frame it is asked to send and can be
//! configured to hold writes until released or to fail a chosen write.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc};

use crate::connection::{ConnectionError, OutboundConnection};

pub struct RecordingConnection {
    frames: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
    fail_at: Option<usize>,
    attempts: AtomicUsize,
    attempt_tx: mpsc::UnboundedSender<usize>,
}

impl RecordingConnection {
    fn build(
        gated: bool,
        fail_at: Option<usize>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<usize>) {
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            frames: Mutex::new(Vec::new()),
            gate: gated.then(|| Semaphore::new(0)),
            fail_at,
            attempts: AtomicUsize::new(0),
            attempt_tx,
        });
        (conn, attempt_rx)
    }

    /// Accepts every write immediately.
    pub fn open() -> Arc<Self> {
        Self::build(false, None).0
    }

    /// Holds each write until [`release`](Self::release) grants it.
    /// The receiver yields the index of every write attempt as it starts.
    pub fn gated() -> (Arc<Self>, mpsc::UnboundedReceiver<usize>) {
        Self::build(true, None)
    }

    /// Fails the write with index `n` (0-based).
    pub fn failing_at(n: usize) -> Arc<Self> {
        Self::build(false, Some(n)).0
    }

    pub fn release(&self, writes: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(writes);
        }
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutboundConnection for RecordingConnection {
    async fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        let _ = self.attempt_tx.send(n);

        if let Some(gate) = &self.gate {
            gate.acquire().await.map_err(|_| ConnectionError::Closed)?.forget();
        }
        if self.fail_at == Some(n) {
            return Err(ConnectionError::Transport("injected failure".into()));
        }
        self.frames.lock().unwrap().push(text);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Wait (bounded) for the next write attempt index.
pub async fn next_attempt(rx: &mut mpsc::UnboundedReceiver<usize>) -> usize {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a write attempt")
        .expect("attempt channel closed")
}

/// Wait (bounded) until `conn` has recorded at least `n` frames.
pub async fn wait_for_frames(conn: &RecordingConnection, n: usize) -> Vec<String> {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let frames = conn.frames();
            if frames.len() >= n {
                return frames;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for frames")
}
