//! Relay module types.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use streamrelay_core::{OverflowPolicy, RelayConfig};

/// Queue sizing for a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueConfig {
    /// `None` means unbounded: producers are never refused for lack of room.
    pub capacity: Option<usize>,
    pub overflow: OverflowPolicy,
}

impl QueueConfig {
    pub const fn unbounded() -> Self {
        Self {
            capacity: None,
            overflow: OverflowPolicy::DropOldest,
        }
    }

    pub const fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            capacity: Some(capacity),
            overflow,
        }
    }
}

impl From<&RelayConfig> for QueueConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            capacity: config.queue_capacity,
            overflow: config.overflow_policy,
        }
    }
}

/// Lifecycle of a relay.
///
/// `Finished`, `Failed` and `Terminated` are terminal: once reached the status
/// never changes again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayStatus {
    /// Constructed, not started. Events are dropped.
    Idle,
    /// Accepting events and delivering them.
    Active,
    /// Closed to new events; already-queued events are still being delivered.
    Closing,
    /// Closed and every queued event was delivered.
    Finished,
    /// A send failed. Delivery stopped and queued events were discarded.
    Failed(String),
    /// Delivery task was cancelled. Queued events were discarded.
    Terminated,
}

impl RelayStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed(_) | Self::Terminated)
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Active => f.write_str("active"),
            Self::Closing => f.write_str("closing"),
            Self::Finished => f.write_str("finished"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Terminated => f.write_str("terminated"),
        }
    }
}

/// Point-in-time counters for a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayStats {
    /// Events accepted into the queue.
    pub enqueued: u64,
    /// Events written to the connection.
    pub delivered: u64,
    /// Events refused because the relay was not active.
    pub dropped_inactive: u64,
    /// Events lost to a full bounded queue (either the newcomer or an evicted one).
    pub dropped_overflow: u64,
    /// Events that failed to serialize.
    pub dropped_encoding: u64,
    /// Queued or in-flight events discarded by `terminate` or a send failure.
    pub abandoned: u64,
}

#[derive(Debug, Default)]
pub(crate) struct RelayCounters {
    pub enqueued: AtomicU64,
    pub delivered: AtomicU64,
    pub dropped_inactive: AtomicU64,
    pub dropped_overflow: AtomicU64,
    pub dropped_encoding: AtomicU64,
    pub abandoned: AtomicU64,
}

impl RelayCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelayStats {
        RelayStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_inactive: self.dropped_inactive.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            dropped_encoding: self.dropped_encoding.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Errors from relay lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Relay already started")]
    AlreadyStarted,

    #[error("Relay was closed before it started")]
    Closed,

    #[error("Relay was terminated")]
    Terminated,

    #[error("No tokio runtime available to run the delivery task")]
    NoRuntime,

    #[error("Invalid relay configuration: {0}")]
    Config(#[from] streamrelay_core::Error),
}
