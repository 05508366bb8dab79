//! Ordered queue between producers and the delivery task.
//!
//! Producers push synchronously under a short `std` mutex; the single
//! consumer awaits items through a `Notify`. The accepting gate lives under the
//! same lock as the items, so an event either lands before `close` or is
//! refused, never in between.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use streamrelay_core::OverflowPolicy;
use tokio::sync::Notify;

use super::types::QueueConfig;

/// Result of offering an item to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest item.
    Evicted,
    /// Full queue refused the item.
    Rejected,
    /// Queue is not accepting.
    Inactive,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<String>,
    accepting: bool,
    closed: bool,
    aborted: bool,
}

#[derive(Debug)]
pub(crate) struct EventQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    config: QueueConfig,
}

impl EventQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start accepting items. Has no effect once closed.
    pub fn open(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.accepting = true;
        }
    }

    pub fn push(&self, item: String) -> PushOutcome {
        let outcome = {
            let mut state = self.lock();
            if !state.accepting {
                return PushOutcome::Inactive;
            }
            match self.config.capacity {
                Some(cap) if state.items.len() >= cap => match self.config.overflow {
                    OverflowPolicy::DropNewest => return PushOutcome::Rejected,
                    OverflowPolicy::DropOldest => {
                        state.items.pop_front();
                        state.items.push_back(item);
                        PushOutcome::Evicted
                    }
                },
                _ => {
                    state.items.push_back(item);
                    PushOutcome::Queued
                }
            }
        };
        self.notify.notify_one();
        outcome
    }

    /// Stop accepting; items already queued remain available to `next`.
    /// Returns how many are still queued.
    pub fn close(&self) -> usize {
        let pending = {
            let mut state = self.lock();
            state.accepting = false;
            state.closed = true;
            state.items.len()
        };
        self.notify.notify_one();
        pending
    }

    /// Stop accepting and discard everything queued. Returns the discard count.
    pub fn abort(&self) -> usize {
        let discarded = {
            let mut state = self.lock();
            state.accepting = false;
            state.closed = true;
            state.aborted = true;
            let n = state.items.len();
            state.items.clear();
            n
        };
        self.notify.notify_one();
        discarded
    }

    /// Next item in FIFO order; `None` once closed and empty.
    pub async fn next(&self) -> Option<String> {
        loop {
            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.lock().accepting
    }

    pub fn was_aborted(&self) -> bool {
        self.lock().aborted
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }
}
