//! JSON wire codec for outbound relay messages.
//!
//! Every event is serialized to a single JSON text frame before it is queued:
//!
//! ```text
//! audio      {"type":"audio","data":"<base64>"}
//! interrupt  {"data":true,"type":"interrupt"}
//! transcript {"type":"transcript","text":"...","sender":"human","timestamp":1.5}
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::audio::AudioFormat;
use crate::error::{Error, Result};
use crate::transcript::{Sender, TranscriptEvent};

/// An event submitted by a producer, before serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    AudioFrame(Vec<u8>),
    InterruptSignal(bool),
    TranscriptUpdate(TranscriptEvent),
}

impl OutboundEvent {
    /// Short label used in log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AudioFrame(_) => "audio",
            Self::InterruptSignal(_) => "interrupt",
            Self::TranscriptUpdate(_) => "transcript",
        }
    }

    /// Serialize to the text frame written to the connection.
    pub fn encode(&self, audio: &AudioEncoder) -> Result<String> {
        match self {
            Self::AudioFrame(chunk) => audio.encode(chunk),
            Self::InterruptSignal(flag) => encode_interrupt(*flag),
            Self::TranscriptUpdate(event) => encode_transcript(event),
        }
    }
}

#[derive(Serialize)]
struct AudioMessage<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: String,
}

// Field order is part of the format: `data` precedes `type`.
#[derive(Serialize)]
struct InterruptMessage<'a> {
    data: bool,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Serialize)]
struct TranscriptMessage<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
    sender: Sender,
    timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
}

/// Encodes raw audio chunks for a fixed [`AudioFormat`].
///
/// The format is carried so callers can inspect what the chunks contain; it is
/// not written into the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioEncoder {
    format: AudioFormat,
}

impl AudioEncoder {
    pub const fn new(format: AudioFormat) -> Self {
        Self { format }
    }

    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn encode(&self, chunk: &[u8]) -> Result<String> {
        let msg = AudioMessage {
            kind: "audio",
            data: STANDARD.encode(chunk),
        };
        Ok(serde_json::to_string(&msg)?)
    }
}

pub fn encode_interrupt(flag: bool) -> Result<String> {
    Ok(serde_json::to_string(&InterruptMessage {
        data: flag,
        kind: "interrupt",
    })?)
}

pub fn encode_transcript(event: &TranscriptEvent) -> Result<String> {
    let msg = TranscriptMessage {
        kind: "transcript",
        text: &event.text,
        sender: event.sender,
        timestamp: event.timestamp,
        conversation_id: event.conversation_id.as_deref(),
    };
    Ok(serde_json::to_string(&msg)?)
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawMessage {
    Audio { data: String },
    Interrupt { data: bool },
    Transcript(TranscriptEvent),
}

/// A decoded text frame, as seen by the receiving peer.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Audio(Vec<u8>),
    Interrupt(bool),
    Transcript(TranscriptEvent),
}

impl WireMessage {
    pub fn decode(text: &str) -> Result<Self> {
        let raw: RawMessage = serde_json::from_str(text)?;
        Ok(match raw {
            RawMessage::Audio { data } => Self::Audio(
                STANDARD
                    .decode(data.as_bytes())
                    .map_err(|e| Error::InvalidMessage(format!("audio payload: {e}")))?,
            ),
            RawMessage::Interrupt { data } => Self::Interrupt(data),
            RawMessage::Transcript(event) => Self::Transcript(event),
        })
    }
}

impl From<WireMessage> for OutboundEvent {
    fn from(msg: WireMessage) -> Self {
        match msg {
            WireMessage::Audio(chunk) => Self::AudioFrame(chunk),
            WireMessage::Interrupt(flag) => Self::InterruptSignal(flag),
            WireMessage::Transcript(event) => Self::TranscriptUpdate(event),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::float_cmp)]
mod tests {
    use super::*;

    fn encoder() -> AudioEncoder {
        AudioEncoder::new(AudioFormat::default())
    }

    #[test]
    fn audio_is_base64_with_type_tag() {
        let text = encoder().encode(&[0x00, 0x01]).unwrap();
        assert_eq!(text, r#"{"type":"audio","data":"AAE="}"#);
    }

    #[test]
    fn interrupt_puts_data_before_type() {
        assert_eq!(
            encode_interrupt(true).unwrap(),
            r#"{"data":true,"type":"interrupt"}"#
        );
        assert_eq!(
            encode_interrupt(false).unwrap(),
            r#"{"data":false,"type":"interrupt"}"#
        );
    }

    #[test]
    fn transcript_omits_missing_conversation_id() {
        let event = TranscriptEvent::new("hello", Sender::Bot, 1.5);
        let text = encode_transcript(&event).unwrap();
        assert_eq!(
            text,
            r#"{"type":"transcript","text":"hello","sender":"bot","timestamp":1.5}"#
        );
    }

    #[test]
    fn transcript_decodes_with_conversation_id() {
        let event =
            TranscriptEvent::new("hi there", Sender::Human, 2.0).with_conversation_id("c-9");
        let text = OutboundEvent::TranscriptUpdate(event.clone())
            .encode(&encoder())
            .unwrap();
        match WireMessage::decode(&text).unwrap() {
            WireMessage::Transcript(decoded) => {
                assert_eq!(decoded, event);
                assert_eq!(decoded.timestamp, 2.0);
            }
            other => panic!("expected transcript, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_unknown_type() {
        assert!(WireMessage::decode(r#"{"type":"video","data":""}"#).is_err());
    }

    #[test]
    fn decode_rejects_bad_base64() {
        let err = WireMessage::decode(r#"{"type":"audio","data":"!!"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }

    #[test]
    fn decoded_audio_converts_back_to_event() {
        let text = encoder().encode(b"pcm").unwrap();
        let event: OutboundEvent = WireMessage::decode(&text).unwrap().into();
        assert_eq!(event, OutboundEvent::AudioFrame(b"pcm".to_vec()));
        assert_eq!(event.kind(), "audio");
    }
}
