//! Media stream descriptors
//!
//! Per-stream metadata handed over by the source when it is attached. The
//! core treats these as read-only; only the set of enabled indices is owned by
//! the player.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::{AvPlayerError, Result};

/// Fixed-width locale code, e.g. `en` or `jpn`
///
/// Stored as four bytes padded with NUL so it can be compared and copied
/// without allocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LanguageCode([u8; 4]);

impl LanguageCode {
    /// The empty code, matching any language
    pub const ANY: LanguageCode = LanguageCode([0; 4]);

    /// Build a code from a short ASCII tag
    pub fn new(tag: &str) -> Result<Self> {
        if tag.len() > 4 || !tag.is_ascii() || tag.bytes().any(|b| b == 0) {
            return Err(AvPlayerError::InvalidInput(format!(
                "language code '{}' must be at most 4 ASCII characters",
                tag
            )));
        }
        let mut bytes = [0u8; 4];
        bytes[..tag.len()].copy_from_slice(tag.as_bytes());
        Ok(Self(bytes))
    }

    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(4);
        // Only ASCII is ever stored.
        std::str::from_utf8(&self.0[..len]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    /// Whether a stream tagged `other` satisfies this preference
    ///
    /// An empty preference matches everything.
    pub fn accepts(&self, other: LanguageCode) -> bool {
        self.is_empty() || *self == other
    }
}

impl fmt::Debug for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LanguageCode({:?})", self.as_str())
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stream kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    Video,
    Audio,
    TimedText,
    Unknown,
}

/// Type-specific stream parameters
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDetails {
    Video {
        width: u32,
        height: u32,
        aspect_ratio: f32,
        language: LanguageCode,
    },
    Audio {
        channel_count: u16,
        sample_rate: u32,
        /// Bytes per decoded audio frame
        size: u32,
        language: LanguageCode,
    },
    TimedText {
        language: LanguageCode,
        text_size: u16,
    },
    Unknown,
}

impl StreamDetails {
    pub fn language(&self) -> Option<LanguageCode> {
        match self {
            StreamDetails::Video { language, .. }
            | StreamDetails::Audio { language, .. }
            | StreamDetails::TimedText { language, .. } => Some(*language),
            StreamDetails::Unknown => None,
        }
    }
}

/// Descriptor of one stream in the attached source
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    /// Stream index within the source
    pub index: u32,

    /// Codec name
    pub codec: String,

    /// Stream duration in milliseconds
    pub duration_ms: u64,

    /// Presentation start time in milliseconds
    pub start_time_ms: u64,

    /// Type-specific parameters
    pub details: StreamDetails,
}

impl StreamDescriptor {
    pub fn stream_type(&self) -> StreamType {
        match self.details {
            StreamDetails::Video { .. } => StreamType::Video,
            StreamDetails::Audio { .. } => StreamType::Audio,
            StreamDetails::TimedText { .. } => StreamType::TimedText,
            StreamDetails::Unknown => StreamType::Unknown,
        }
    }

    pub fn language(&self) -> Option<LanguageCode> {
        self.details.language()
    }

    /// Convenience constructor for a video stream
    pub fn video(index: u32, codec: &str, width: u32, height: u32) -> Self {
        let aspect_ratio = if height == 0 { 0.0 } else { width as f32 / height as f32 };
        Self {
            index,
            codec: codec.to_string(),
            duration_ms: 0,
            start_time_ms: 0,
            details: StreamDetails::Video {
                width,
                height,
                aspect_ratio,
                language: LanguageCode::ANY,
            },
        }
    }

    /// Convenience constructor for an audio stream
    pub fn audio(index: u32, codec: &str, channel_count: u16, sample_rate: u32, language: LanguageCode) -> Self {
        Self {
            index,
            codec: codec.to_string(),
            duration_ms: 0,
            start_time_ms: 0,
            details: StreamDetails::Audio {
                channel_count,
                sample_rate,
                size: 1024 * channel_count as u32 * 2,
                language,
            },
        }
    }

    /// Convenience constructor for a timed-text stream
    pub fn timed_text(index: u32, codec: &str, language: LanguageCode) -> Self {
        Self {
            index,
            codec: codec.to_string(),
            duration_ms: 0,
            start_time_ms: 0,
            details: StreamDetails::TimedText { language, text_size: 16 },
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}
