//! Audio format identifiers carried alongside outbound audio.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sample encoding of outbound audio chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// Signed 16-bit little-endian PCM.
    #[default]
    Linear16,
    /// G.711 mu-law, 8 bits per sample.
    Mulaw,
}

impl AudioEncoding {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear16 => "linear16",
            Self::Mulaw => "mulaw",
        }
    }

    /// Bytes occupied by one mono sample.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::Linear16 => 2,
            Self::Mulaw => 1,
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear16" | "pcm" | "s16le" => Ok(Self::Linear16),
            "mulaw" | "mu-law" | "ulaw" => Ok(Self::Mulaw),
            other => Err(Error::UnknownEncoding(other.to_string())),
        }
    }
}

/// Sample rate and encoding the relay was constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Samples per second (Hz). Always positive.
    pub sample_rate: u32,
    pub encoding: AudioEncoding,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, encoding: AudioEncoding) -> crate::Result<Self> {
        if sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }
        Ok(Self {
            sample_rate,
            encoding,
        })
    }

    /// Number of bytes that make up `millis` of mono audio in this format.
    pub fn chunk_bytes(&self, millis: u32) -> usize {
        let samples = u64::from(self.sample_rate) * u64::from(millis) / 1000;
        usize::try_from(samples)
            .unwrap_or(usize::MAX)
            .saturating_mul(self.encoding.bytes_per_sample())
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            encoding: AudioEncoding::Linear16,
        }
    }
}
