//! Buffering gate
//!
//! Maps the number of buffered frames to a decision for the controller,
//! with hysteresis between the low and high watermarks.

use crate::utils::BufferingSettings;

/// Decision produced by `BufferingMonitor::evaluate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferingSignal {
    /// No change requested
    Undetermined,
    /// Enough frames to play
    Sufficient,
    /// Too few frames; playback should wait
    Insufficient,
}

/// Watermark-based buffering decision
#[derive(Debug, Clone)]
pub struct BufferingMonitor {
    low_watermark: u32,
    high_watermark: u32,
    last_count: Option<u32>,
}

impl BufferingMonitor {
    pub fn new(settings: BufferingSettings) -> Self {
        Self {
            low_watermark: settings.low_watermark,
            high_watermark: settings.high_watermark.max(settings.low_watermark),
            last_count: None,
        }
    }

    /// Remember the latest buffered-frame count reported by the decoder
    pub fn record(&mut self, count: u32) {
        self.last_count = Some(count);
    }

    pub fn last_count(&self) -> Option<u32> {
        self.last_count
    }

    /// Forget the recorded count, e.g. after the source is replaced
    pub fn reset(&mut self) {
        self.last_count = None;
    }

    /// Classify `count` against the watermarks
    ///
    /// Always `Undetermined` until a count has been recorded.
    pub fn evaluate(&self, count: u32) -> BufferingSignal {
        if self.last_count.is_none() {
            return BufferingSignal::Undetermined;
        }
        if count < self.low_watermark {
            BufferingSignal::Insufficient
        } else if count >= self.high_watermark {
            BufferingSignal::Sufficient
        } else {
            BufferingSignal::Undetermined
        }
    }

    /// Evaluate the last recorded count
    pub fn current_signal(&self) -> BufferingSignal {
        match self.last_count {
            Some(count) => self.evaluate(count),
            None => BufferingSignal::Undetermined,
        }
    }
}

impl Default for BufferingMonitor {
    fn default() -> Self {
        Self::new(BufferingSettings::default())
    }
}
