//! Transcript records produced by the transcription pipeline.

use serde::{Deserialize, Serialize};

/// Which side of the conversation spoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Human,
    Bot,
}

/// A single transcript update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub sender: Sender,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl TranscriptEvent {
    pub fn new(text: impl Into<String>, sender: Sender, timestamp: f64) -> Self {
        Self {
            text: text.into(),
            sender,
            timestamp,
            conversation_id: None,
        }
    }

    /// Stamp the event with the current wall-clock time.
    pub fn now(text: impl Into<String>, sender: Sender) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64());
        Self::new(text, sender, timestamp)
    }

    #[must_use]
    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }
}
