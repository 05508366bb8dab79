//! Stream relay: producers → ordered queue → delivery task → connection.
//!
//! Data flow:
//! ```text
//! enqueue_audio / enqueue_interrupt / enqueue_transcript
//!     → JSON text → EventQueue (FIFO) → delivery task → OutboundConnection::send_text
//! ```
//!
//! The delivery task is the only reader of the queue and the only writer to
//! the connection. Each write is awaited before the next item is taken, so a
//! slow connection throttles delivery while producers keep enqueueing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use streamrelay_core::wire::{self, AudioEncoder};
use streamrelay_core::{AudioFormat, OutboundEvent, RelayConfig, TranscriptEvent};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};
use uuid::Uuid;

use crate::connection::OutboundConnection;

use super::queue::{EventQueue, PushOutcome};
use super::types::{QueueConfig, RelayCounters, RelayError, RelayStats, RelayStatus};

/// State shared between the relay handles and the delivery task.
struct Shared {
    id: Uuid,
    queue: EventQueue,
    status: watch::Sender<RelayStatus>,
    counters: RelayCounters,
    /// Set while a write is awaiting the connection.
    in_flight: AtomicBool,
}

impl Shared {
    /// Move to `next` unless a terminal status was already reached.
    fn transition(&self, next: RelayStatus) -> bool {
        self.status.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            *current = next;
            true
        })
    }
}

struct Inner {
    shared: Arc<Shared>,
    connection: Arc<dyn OutboundConnection>,
    encoder: AudioEncoder,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    // Last handle gone: stop accepting and let the task drain and exit.
    fn drop(&mut self) {
        self.shared.queue.close();
        let started = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        self.shared.transition(if started {
            RelayStatus::Closing
        } else {
            RelayStatus::Finished
        });
    }
}

/// Forwards audio, interrupt and transcript events to one outbound connection
/// in submission order without ever blocking the producers.
///
/// Cloning yields another handle to the same relay, so several producers can
/// share it. Dropping the last handle behaves like [`mark_closed`].
///
/// [`mark_closed`]: StreamRelay::mark_closed
#[derive(Clone)]
pub struct StreamRelay {
    inner: Arc<Inner>,
}

impl StreamRelay {
    /// Create a relay with an unbounded queue.
    pub fn new(connection: Arc<dyn OutboundConnection>, format: AudioFormat) -> Self {
        Self::with_queue(connection, format, QueueConfig::unbounded())
    }

    pub fn with_queue(
        connection: Arc<dyn OutboundConnection>,
        format: AudioFormat,
        queue: QueueConfig,
    ) -> Self {
        let (status, _) = watch::channel(RelayStatus::Idle);
        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            queue: EventQueue::new(queue),
            status,
            counters: RelayCounters::default(),
            in_flight: AtomicBool::new(false),
        });
        debug!(
            relay_id = %shared.id,
            connection = connection.name(),
            sample_rate = format.sample_rate,
            encoding = %format.encoding,
            capacity = ?queue.capacity,
            "Relay created"
        );
        Self {
            inner: Arc::new(Inner {
                shared,
                connection,
                encoder: AudioEncoder::new(format),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn from_config(
        connection: Arc<dyn OutboundConnection>,
        config: &RelayConfig,
    ) -> Result<Self, RelayError> {
        config.validate()?;
        Ok(Self::with_queue(
            connection,
            config.audio_format()?,
            QueueConfig::from(config),
        ))
    }

    pub fn id(&self) -> Uuid {
        self.inner.shared.id
    }

    pub fn format(&self) -> AudioFormat {
        self.inner.encoder.format()
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin accepting events and spawn the delivery task on the current
    /// tokio runtime.
    ///
    /// A relay runs at most one delivery task: a second call fails with
    /// [`RelayError::AlreadyStarted`].
    pub fn start(&self) -> Result<(), RelayError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RelayError::NoRuntime)?;
        let mut slot = self.task_slot();

        let current = self.status();
        match current {
            RelayStatus::Idle => {}
            RelayStatus::Terminated => return Err(RelayError::Terminated),
            RelayStatus::Finished if slot.is_none() => return Err(RelayError::Closed),
            _ => return Err(RelayError::AlreadyStarted),
        }

        let shared = &self.inner.shared;
        shared.queue.open();
        shared.transition(RelayStatus::Active);

        let span = info_span!("relay_delivery", relay_id = %shared.id);
        *slot = Some(runtime.spawn(
            deliver(Arc::clone(shared), Arc::clone(&self.inner.connection)).instrument(span),
        ));

        let format = self.format();
        info!(
            relay_id = %shared.id,
            sample_rate = format.sample_rate,
            encoding = %format.encoding,
            "Relay started"
        );
        Ok(())
    }

    /// Queue a chunk of raw audio in the relay's format.
    pub fn enqueue_audio(&self, chunk: &[u8]) {
        self.submit("audio", |encoder| encoder.encode(chunk));
    }

    /// Queue an interrupt signal. It is delivered after everything queued
    /// before it and before anything queued later.
    pub fn enqueue_interrupt(&self, interrupt: bool) {
        self.submit("interrupt", |_| wire::encode_interrupt(interrupt));
    }

    pub fn enqueue_transcript(&self, event: &TranscriptEvent) {
        self.submit("transcript", |_| wire::encode_transcript(event));
    }

    pub fn enqueue(&self, event: &OutboundEvent) {
        self.submit(event.kind(), |encoder| event.encode(encoder));
    }

    /// Encode and queue one event. Never blocks and never fails: events that
    /// cannot be queued are counted and dropped.
    fn submit(
        &self,
        kind: &'static str,
        encode: impl FnOnce(&AudioEncoder) -> streamrelay_core::Result<String>,
    ) {
        let shared = &self.inner.shared;
        let counters = &shared.counters;

        if !shared.queue.is_accepting() {
            RelayCounters::bump(&counters.dropped_inactive);
            trace!(relay_id = %shared.id, kind, "Relay inactive, event dropped");
            return;
        }

        let text = match encode(&self.inner.encoder) {
            Ok(text) => text,
            Err(e) => {
                RelayCounters::bump(&counters.dropped_encoding);
                warn!(relay_id = %shared.id, kind, error = %e, "Failed to encode event");
                return;
            }
        };

        match shared.queue.push(text) {
            PushOutcome::Queued => RelayCounters::bump(&counters.enqueued),
            PushOutcome::Evicted => {
                RelayCounters::bump(&counters.enqueued);
                RelayCounters::bump(&counters.dropped_overflow);
                debug!(relay_id = %shared.id, kind, "Queue full, oldest event evicted");
            }
            PushOutcome::Rejected => {
                RelayCounters::bump(&counters.dropped_overflow);
                debug!(relay_id = %shared.id, kind, "Queue full, event rejected");
            }
            // Closed between the gate check and the push.
            PushOutcome::Inactive => RelayCounters::bump(&counters.dropped_inactive),
        }
    }

    /// Stop accepting events. Events already queued are still delivered, in
    /// order; the delivery task exits once the queue is empty.
    pub fn mark_closed(&self) {
        let shared = &self.inner.shared;
        let pending = shared.queue.close();
        let started = self.task_slot().is_some();
        if started {
            shared.transition(RelayStatus::Closing);
        } else {
            shared.transition(RelayStatus::Finished);
        }
        info!(relay_id = %shared.id, pending, "Relay marked closed");
    }

    /// Cancel the delivery task and wait for it to stop.
    ///
    /// Events still queued are discarded without being sent. When this
    /// returns the task is no longer running.
    pub async fn terminate(&self) {
        let shared = &self.inner.shared;
        // Clear the queue first so nothing queued at this instant can be taken.
        let mut abandoned = shared.queue.abort();

        let handle = self.task_slot().take();
        if let Some(handle) = handle {
            handle.abort();
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!(relay_id = %shared.id, error = %e, "Delivery task panicked"),
            }
            // The task is gone; a write it left pending will never complete.
            if shared.in_flight.swap(false, Ordering::AcqRel) {
                abandoned += 1;
            }
        }
        RelayCounters::add(&shared.counters.abandoned, abandoned);

        shared.transition(RelayStatus::Terminated);
        info!(relay_id = %shared.id, abandoned, status = %self.status(), "Relay terminated");
    }

    /// Whether new events are currently accepted.
    pub fn is_active(&self) -> bool {
        self.inner.shared.queue.is_accepting()
    }

    pub fn status(&self) -> RelayStatus {
        self.inner.shared.status.borrow().clone()
    }

    /// Watch lifecycle changes, including delivery failure.
    pub fn subscribe(&self) -> watch::Receiver<RelayStatus> {
        self.inner.shared.status.subscribe()
    }

    /// Wait until the relay reaches a terminal status and return it.
    ///
    /// A relay that is never started or closed never gets there.
    pub async fn wait_finished(&self) -> RelayStatus {
        let mut rx = self.subscribe();
        let result = rx.wait_for(RelayStatus::is_terminal).await.map(|s| s.clone());
        result.unwrap_or_else(|_| self.status())
    }

    pub fn stats(&self) -> RelayStats {
        self.inner.shared.counters.snapshot()
    }

    /// Number of events waiting to be written.
    pub fn queued_len(&self) -> usize {
        self.inner.shared.queue.len()
    }
}

/// Delivery loop: one write in flight at a time, until the queue is closed
/// and drained, the task is cancelled, or a write fails.
async fn deliver(shared: Arc<Shared>, connection: Arc<dyn OutboundConnection>) {
    debug!("Delivery task running");

    while let Some(text) = shared.queue.next().await {
        shared.in_flight.store(true, Ordering::Release);
        let result = connection.send_text(text).await;
        shared.in_flight.store(false, Ordering::Release);

        if let Err(e) = result {
            let abandoned = shared.queue.abort() + 1;
            RelayCounters::add(&shared.counters.abandoned, abandoned);
            error!(
                relay_id = %shared.id,
                connection = connection.name(),
                error = %e,
                abandoned,
                "Send failed, delivery stopped"
            );
            shared.transition(RelayStatus::Failed(e.to_string()));
            return;
        }
        RelayCounters::bump(&shared.counters.delivered);
    }

    if shared.queue.was_aborted() {
        return;
    }
    shared.transition(RelayStatus::Finished);
    info!(
        relay_id = %shared.id,
        delivered = shared.counters.snapshot().delivered,
        "Relay drained"
    );
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::cast_possible_truncation
)]
#[path = "pipeline_tests.rs"]
mod tests;
