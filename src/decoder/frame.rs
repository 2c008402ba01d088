//! Decoded frame metadata returned to the host
//!
//! The buffer inside a frame is owned by the caller once it has been
//! returned; the core only relays it from the decoder.

use crate::decoder::LanguageCode;

/// Audio frame parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFrameDetails {
    pub channel_count: u16,
    pub sample_rate: u32,
    /// Payload size in bytes
    pub size: u32,
    pub language: LanguageCode,
}

/// Video frame parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFrameDetails {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f32,
    pub language: LanguageCode,
}

/// Type-specific frame parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameDetails {
    Audio(AudioFrameDetails),
    Video(VideoFrameDetails),
}

/// A decoded audio or video unit
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    /// Decoded payload
    pub data: Vec<u8>,

    /// Presentation timestamp in milliseconds
    pub timestamp: u64,

    pub details: FrameDetails,
}

impl FrameInfo {
    pub fn is_video(&self) -> bool {
        matches!(self.details, FrameDetails::Video(_))
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.details, FrameDetails::Audio(_))
    }
}

/// Extended video parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFrameDetailsEx {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f32,
    pub language: LanguageCode,
    /// Frames per second, rounded
    pub framerate: u32,
    pub crop_left: u32,
    pub crop_right: u32,
    pub crop_top: u32,
    pub crop_bottom: u32,
    /// Row stride in bytes of the luma plane
    pub pitch: u32,
    pub luma_bit_depth: u8,
    pub chroma_bit_depth: u8,
    pub video_full_range: bool,
}

/// A decoded video unit with the richer metadata set
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfoEx {
    pub data: Vec<u8>,
    pub timestamp: u64,
    pub details: VideoFrameDetailsEx,
}

impl FrameInfoEx {
    /// Widen a basic video frame, assuming 8-bit, uncropped, tightly packed
    ///
    /// Returns `None` for audio frames.
    pub fn from_basic(frame: FrameInfo, framerate: u32) -> Option<Self> {
        let FrameDetails::Video(video) = frame.details else {
            return None;
        };
        Some(Self {
            data: frame.data,
            timestamp: frame.timestamp,
            details: VideoFrameDetailsEx {
                width: video.width,
                height: video.height,
                aspect_ratio: video.aspect_ratio,
                language: video.language,
                framerate,
                crop_left: 0,
                crop_right: 0,
                crop_top: 0,
                crop_bottom: 0,
                pitch: video.width,
                luma_bit_depth: 8,
                chroma_bit_depth: 8,
                video_full_range: false,
            },
        })
    }
}
