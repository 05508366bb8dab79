//! Relay module: ordered, non-blocking delivery of outbound events.
//!
//! This is the piece between the producers and the wire:
//! - `EventQueue` (FIFO, optionally bounded, gated by the active flag)
//! - `StreamRelay` (lifecycle, encoding, single delivery task)

mod pipeline;
mod queue;
mod types;

pub use pipeline::StreamRelay;
pub use types::*;
