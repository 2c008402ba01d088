//! Frame buffering for decoder collaborators
//!
//! Provides a queue for buffering decoded frames with timestamp ordering
//! and frame dropping once the configured depth is exceeded. The queue
//! itself is not synchronized; owners wrap it in a lock.

use crate::decoder::FrameInfo;
use std::collections::VecDeque;

/// Frame queue for buffering decoded frames
pub struct FrameQueue {
    /// Queue of frames sorted by timestamp
    frames: VecDeque<FrameInfo>,

    /// Maximum number of frames to buffer
    max_frames: usize,

    /// Last frame timestamp for ordering validation
    last_timestamp: Option<u64>,
}

impl FrameQueue {
    /// Create a new frame queue with specified capacity
    pub fn new(max_frames: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(max_frames),
            max_frames: max_frames.max(1),
            last_timestamp: None,
        }
    }

    /// Push a frame to the queue, dropping the oldest when full
    pub fn push_frame(&mut self, frame: FrameInfo) {
        if let Some(last) = self.last_timestamp {
            if frame.timestamp < last {
                log::warn!("Frame timestamp {} is less than last timestamp {}, possible ordering issue",
                    frame.timestamp, last);
            }
        }

        while self.frames.len() >= self.max_frames {
            if let Some(dropped) = self.frames.pop_front() {
                log::debug!("Frame queue full, dropping frame at {} ms", dropped.timestamp);
            }
        }

        let insert_pos = self.frames.iter().position(|f| f.timestamp > frame.timestamp)
            .unwrap_or(self.frames.len());

        self.frames.insert(insert_pos, frame);
        self.last_timestamp = self.frames.back().map(|f| f.timestamp);
    }

    /// Pop the next frame from the queue
    pub fn pop_frame(&mut self) -> Option<FrameInfo> {
        self.frames.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Clear all frames from the queue
    pub fn clear(&mut self) {
        self.frames.clear();
        self.last_timestamp = None;
    }
}
