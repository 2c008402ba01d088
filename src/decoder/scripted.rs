//! In-memory source driven by the host
//!
//! `ScriptedSource` does no demuxing or decoding of its own. The host pushes
//! ready-made frames into it and raises warnings, errors and end of stream
//! explicitly, which makes the player core observable without real media.
//! The demo binary and the test suites use it as their collaborator.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::decoder::{
    AudioFrameDetails, Decoder, FrameDetails, FrameInfo, FrameInfoEx, FrameQueue, LanguageCode,
    Source, SourceOpener, SourceType, StreamDescriptor, StreamDetails, StreamType, VideoFrameDetails,
};
use crate::player::SourceEvents;
use crate::utils::error::{AvPlayerError, Result};

const QUEUE_DEPTH: usize = 64;
const DEFAULT_FRAMERATE: u32 = 25;

/// Opens `ScriptedSource`s with a fixed stream layout
pub struct ScriptedOpener {
    streams: Vec<StreamDescriptor>,
    supported: Vec<SourceType>,
    failing_paths: Mutex<HashSet<String>>,
    opened: Mutex<Vec<Arc<ScriptedSource>>>,
}

impl ScriptedOpener {
    /// Create an opener handing out sources with the given streams
    pub fn new(streams: Vec<StreamDescriptor>) -> Self {
        Self {
            streams,
            supported: vec![SourceType::File, SourceType::Hls],
            failing_paths: Mutex::new(HashSet::new()),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// One audio stream (index 0) and one video stream (index 1)
    pub fn av_clip() -> Self {
        Self::new(vec![
            StreamDescriptor::audio(0, "aac", 2, 48_000, LanguageCode::ANY).with_duration(10_000),
            StreamDescriptor::video(1, "h264", 1280, 720).with_duration(10_000),
        ])
    }

    /// Restrict the source types this opener accepts
    pub fn with_supported(mut self, supported: &[SourceType]) -> Self {
        self.supported = supported.to_vec();
        self
    }

    /// Make opening `path` fail with a source error
    pub fn fail_on(&self, path: &str) {
        self.failing_paths.lock().insert(path.to_string());
    }

    /// The most recently opened source
    pub fn last_opened(&self) -> Option<Arc<ScriptedSource>> {
        self.opened.lock().last().cloned()
    }

    pub fn opened_count(&self) -> usize {
        self.opened.lock().len()
    }
}

impl SourceOpener for ScriptedOpener {
    fn supports(&self, source_type: SourceType) -> bool {
        source_type != SourceType::Unknown && self.supported.contains(&source_type)
    }

    fn open(&self, path: &str, source_type: SourceType, events: SourceEvents) -> Result<Arc<dyn Source>> {
        if self.failing_paths.lock().contains(path) {
            return Err(AvPlayerError::source_error(format!("cannot open {}", path)));
        }

        log::debug!("Opening scripted {:?} source {}", source_type, path);
        let source = Arc::new(ScriptedSource::new(path, self.streams.clone(), events));
        self.opened.lock().push(Arc::clone(&source));
        Ok(source as Arc<dyn Source>)
    }
}

/// Host-driven source; see the module documentation
pub struct ScriptedSource {
    path: String,
    streams: Vec<StreamDescriptor>,
    enabled: Mutex<BTreeSet<u32>>,
    decoder: Arc<ScriptedDecoder>,
    events: SourceEvents,
}

struct ScriptedDecoder {
    audio: Mutex<FrameQueue>,
    video: Mutex<FrameQueue>,
    /// Whether buffering is measured on the video queue
    video_gated: AtomicBool,
    running: AtomicBool,
    clock_ms: AtomicU64,
    events: SourceEvents,
}

impl ScriptedSource {
    pub fn new(path: &str, streams: Vec<StreamDescriptor>, events: SourceEvents) -> Self {
        let has_video = streams.iter().any(|s| s.stream_type() == StreamType::Video);
        Self {
            path: path.to_string(),
            streams,
            enabled: Mutex::new(BTreeSet::new()),
            decoder: Arc::new(ScriptedDecoder {
                audio: Mutex::new(FrameQueue::new(QUEUE_DEPTH)),
                video: Mutex::new(FrameQueue::new(QUEUE_DEPTH)),
                video_gated: AtomicBool::new(has_video),
                running: AtomicBool::new(false),
                clock_ms: AtomicU64::new(0),
                events: events.clone(),
            }),
            events,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fault reporting handle shared with the player
    pub fn events(&self) -> &SourceEvents {
        &self.events
    }

    pub fn enabled_streams(&self) -> Vec<u32> {
        self.enabled.lock().iter().copied().collect()
    }

    pub fn is_running(&self) -> bool {
        self.decoder.running.load(Ordering::Acquire)
    }

    /// Queue a decoded audio frame and report the new buffer level
    pub fn push_audio(&self, frame: FrameInfo) {
        self.decoder.audio.lock().push_frame(frame);
        self.decoder.report_level();
    }

    /// Queue a decoded video frame and report the new buffer level
    pub fn push_video(&self, frame: FrameInfo) {
        self.decoder.video.lock().push_frame(frame);
        self.decoder.report_level();
    }

    pub fn buffered_frames(&self) -> u32 {
        self.decoder.buffered_frames()
    }

    /// Build a blank video frame matching the first video stream
    pub fn make_video_frame(&self, timestamp: u64) -> FrameInfo {
        let (width, height, aspect_ratio, language) = self.streams.iter()
            .find_map(|s| match s.details {
                StreamDetails::Video { width, height, aspect_ratio, language } => {
                    Some((width, height, aspect_ratio, language))
                }
                _ => None,
            })
            .unwrap_or((16, 16, 1.0, LanguageCode::ANY));

        FrameInfo {
            data: vec![0; (width * height) as usize * 3 / 2],
            timestamp,
            details: FrameDetails::Video(VideoFrameDetails { width, height, aspect_ratio, language }),
        }
    }

    /// Build a silent audio frame matching the first audio stream
    pub fn make_audio_frame(&self, timestamp: u64) -> FrameInfo {
        let (channel_count, sample_rate, size, language) = self.streams.iter()
            .find_map(|s| match s.details {
                StreamDetails::Audio { channel_count, sample_rate, size, language } => {
                    Some((channel_count, sample_rate, size, language))
                }
                _ => None,
            })
            .unwrap_or((2, 48_000, 4096, LanguageCode::ANY));

        FrameInfo {
            data: vec![0; size as usize],
            timestamp,
            details: FrameDetails::Audio(AudioFrameDetails { channel_count, sample_rate, size, language }),
        }
    }
}

impl Source for ScriptedSource {
    fn streams(&self) -> Vec<StreamDescriptor> {
        self.streams.clone()
    }

    fn enable_stream(&self, index: u32) -> Result<()> {
        let descriptor = self.streams.iter().find(|s| s.index == index)
            .ok_or(AvPlayerError::StreamIndexOutOfRange { index, count: self.streams.len() })?;

        if descriptor.stream_type() == StreamType::Unknown {
            return Err(AvPlayerError::source_error(format!("stream {} has no decoder", index)));
        }

        let mut enabled = self.enabled.lock();
        enabled.insert(index);
        let video_enabled = enabled.iter()
            .filter_map(|i| self.streams.iter().find(|s| s.index == *i))
            .any(|s| s.stream_type() == StreamType::Video);
        self.decoder.video_gated.store(video_enabled, Ordering::Release);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        if self.enabled.lock().is_empty() {
            return Err(AvPlayerError::source_error("no stream enabled"));
        }
        self.decoder.running.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.decoder.running.store(false, Ordering::Release);
        self.decoder.audio.lock().clear();
        self.decoder.video.lock().clear();
        Ok(())
    }

    fn decoder(&self) -> Arc<dyn Decoder> {
        self.decoder.clone()
    }
}

impl ScriptedDecoder {
    fn buffered_frames(&self) -> u32 {
        let len = if self.video_gated.load(Ordering::Acquire) {
            self.video.lock().len()
        } else {
            self.audio.lock().len()
        };
        len as u32
    }

    fn report_level(&self) {
        self.events.on_buffering_level(self.buffered_frames());
    }

    fn pop(&self, queue: &Mutex<FrameQueue>) -> Option<FrameInfo> {
        if !self.running.load(Ordering::Acquire) {
            return None;
        }
        let frame = queue.lock().pop_frame()?;
        self.clock_ms.fetch_max(frame.timestamp, Ordering::AcqRel);
        self.report_level();
        Some(frame)
    }
}

impl Decoder for ScriptedDecoder {
    fn audio_frame(&self) -> Option<FrameInfo> {
        self.pop(&self.audio)
    }

    fn video_frame(&self) -> Option<FrameInfo> {
        self.pop(&self.video)
    }

    fn video_frame_ex(&self) -> Option<FrameInfoEx> {
        self.pop(&self.video)
            .and_then(|frame| FrameInfoEx::from_basic(frame, DEFAULT_FRAMERATE))
    }

    fn current_time(&self) -> u64 {
        self.clock_ms.load(Ordering::Acquire)
    }
}
