//! Decoder collaborator boundary
//!
//! Demuxing and decoding happen outside the player core. This module
//! defines what the core requires from those collaborators: a `SourceOpener`
//! that attaches a `Source` for a path, the `Source` itself for stream
//! enumeration and enabling, and a `Decoder` offering non-blocking frame
//! pulls. Collaborators report warnings, errors, end of stream and buffered
//! frame counts through the `SourceEvents` handle they receive at open time.

mod frame;
mod frame_queue;
mod scripted;
mod stream_info;

pub use frame::{
    AudioFrameDetails, FrameDetails, FrameInfo, FrameInfoEx, VideoFrameDetails, VideoFrameDetailsEx,
};
pub use frame_queue::FrameQueue;
pub use scripted::{ScriptedOpener, ScriptedSource};
pub use stream_info::{LanguageCode, StreamDescriptor, StreamDetails, StreamType};

use crate::player::SourceEvents;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kind of media source passed to `add_source`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    Unknown,
    /// Local or mounted file
    File,
    /// HTTP live streaming playlist
    Hls,
}

/// Opens sources for the player
pub trait SourceOpener: Send + Sync {
    /// Whether sources of this type can be opened at all
    fn supports(&self, source_type: SourceType) -> bool;

    /// Open the media at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - File path or URL
    /// * `source_type` - Kind of source, already checked with `supports`
    /// * `events` - Handle for reporting faults and buffering levels
    fn open(&self, path: &str, source_type: SourceType, events: SourceEvents) -> Result<Arc<dyn Source>>;
}

/// An attached media source
pub trait Source: Send + Sync {
    /// Ordered stream descriptors, enumerated once on attach
    fn streams(&self) -> Vec<StreamDescriptor>;

    /// Mark a stream for decoding
    fn enable_stream(&self, index: u32) -> Result<()>;

    /// Begin demuxing and decoding the enabled streams
    fn start(&self) -> Result<()>;

    /// Stop decoding; further frame pulls return nothing
    fn stop(&self) -> Result<()>;

    /// The decoder serving frames for this source
    fn decoder(&self) -> Arc<dyn Decoder>;
}

/// Non-blocking frame access
///
/// None of these calls may wait for decoding to finish.
pub trait Decoder: Send + Sync {
    /// Next decoded audio frame, if one is ready
    fn audio_frame(&self) -> Option<FrameInfo>;

    /// Next decoded video frame, if one is ready
    fn video_frame(&self) -> Option<FrameInfo>;

    /// Next decoded video frame with extended metadata, if one is ready
    fn video_frame_ex(&self) -> Option<FrameInfoEx>;

    /// Timestamp of the last delivered frame in milliseconds
    fn current_time(&self) -> u64;
}
