//! streamrelay Library
//!
//! Core functionality for the streamrelay:
//! - `StreamRelay`: ordered, non-blocking delivery of audio, interrupt and
//!   transcript events to a single outbound connection
//! - Outbound connections (WebSocket client, in-process channel)

pub mod connection;
pub mod relay;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod test_helpers;

pub use connection::{ChannelConnection, ConnectionError, OutboundConnection, WebSocketConnection};
pub use relay::{QueueConfig, RelayError, RelayStats, RelayStatus, StreamRelay};
