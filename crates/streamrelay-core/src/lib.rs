//! `streamrelay` Core Library
//!
//! Shared functionality for `streamrelay` components:
//! - Wire codec for outbound audio, interrupt and transcript messages
//! - Audio format identifiers and transcript records
//! - Configuration resolution and hierarchy
//! - Tracing initialization
//! - Common error types

pub mod audio;
pub mod config;
pub mod error;
pub mod tracing_init;
pub mod transcript;
pub mod wire;

pub use audio::{AudioEncoding, AudioFormat};
pub use config::{Config, OverflowPolicy, RelayConfig};
pub use error::{Error, Result};
pub use transcript::{Sender, TranscriptEvent};
pub use wire::{AudioEncoder, OutboundEvent, WireMessage};
