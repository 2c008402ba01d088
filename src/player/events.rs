//! Internal event queue
//!
//! Every condition that needs a reaction from the controller thread (a
//! collaborator fault, a buffering level, a state change) is recorded here.
//! Producers may live on any thread; the controller is the only consumer.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::player::{EventData, StateChange};

/// A unit of work for the controller
#[derive(Debug, Clone)]
pub enum EventRecord {
    /// Non-fatal condition reported by a collaborator
    Warning { id: u32 },

    /// Fatal collaborator failure
    Error,

    /// The source has no more data
    EndOfStream,

    /// Advance to the pending next source
    AutoPlayNext,

    /// Number of decoded frames currently buffered
    BufferingChanged { frames: u32 },

    /// An accepted lifecycle transition
    StateChanged(StateChange),

    /// Host-defined event relayed untouched
    Custom { id: i32, data: Option<EventData> },

    /// A collaborator record tagged with the source generation that sent it
    FromSource { source_id: i32, record: Box<EventRecord> },
}

/// Discriminant of an `EventRecord`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Warning,
    Error,
    EndOfStream,
    AutoPlayNext,
    BufferingChanged,
    StateChanged,
    Custom,
}

impl EventRecord {
    /// Kind of the record, looking through the source tag
    pub fn kind(&self) -> EventKind {
        match self {
            EventRecord::FromSource { record, .. } => record.kind(),
            EventRecord::Warning { .. } => EventKind::Warning,
            EventRecord::Error => EventKind::Error,
            EventRecord::EndOfStream => EventKind::EndOfStream,
            EventRecord::AutoPlayNext => EventKind::AutoPlayNext,
            EventRecord::BufferingChanged { .. } => EventKind::BufferingChanged,
            EventRecord::StateChanged(_) => EventKind::StateChanged,
            EventRecord::Custom { .. } => EventKind::Custom,
        }
    }

    /// Numeric payload carried by the record, if any
    pub fn payload(&self) -> Option<u64> {
        match self {
            EventRecord::FromSource { record, .. } => record.payload(),
            EventRecord::Warning { id } => Some(*id as u64),
            EventRecord::BufferingChanged { frames } => Some(*frames as u64),
            EventRecord::StateChanged(change) => Some(change.current as u64),
            EventRecord::Custom { id, .. } => Some(*id as u32 as u64),
            EventRecord::Error | EventRecord::EndOfStream | EventRecord::AutoPlayNext => None,
        }
    }
}

/// Result of waiting on the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// At least one record is queued
    Ready,
    /// `interrupt` was called
    Interrupted,
    TimedOut,
}

struct QueueState {
    records: VecDeque<EventRecord>,
    interrupted: bool,
}

/// Multi-producer, single-consumer FIFO of `EventRecord`s
pub struct EventQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                records: VecDeque::new(),
                interrupted: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append a record and wake the consumer
    pub fn push(&self, record: EventRecord) {
        let mut state = self.state.lock();
        log::debug!("Queueing {:?}", record.kind());
        state.records.push_back(record);
        self.available.notify_one();
    }

    /// Take every queued record in push order
    pub fn drain(&self) -> Vec<EventRecord> {
        let mut state = self.state.lock();
        state.records.drain(..).collect()
    }

    /// Block until a record is queued, the queue is interrupted, or `timeout`
    /// elapses
    pub fn wait(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if state.interrupted {
                return WaitOutcome::Interrupted;
            }
            if !state.records.is_empty() {
                return WaitOutcome::Ready;
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return if state.interrupted {
                    WaitOutcome::Interrupted
                } else if !state.records.is_empty() {
                    WaitOutcome::Ready
                } else {
                    WaitOutcome::TimedOut
                };
            }
        }
    }

    /// Wake any pending `wait` and make later waits return at once
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        state.interrupted = true;
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
