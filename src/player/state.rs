//! Player lifecycle state machine
//!
//! The current and previous lifecycle states live in atomics so any thread
//! can read them without blocking. Writes are serialized by a transition lock
//! and must pass the transition table below.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle state of the player
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Nothing attached yet
    Initial = 0,

    /// Source opened and streams enumerated
    SourceAttached = 1,

    /// At least one stream enabled
    Ready = 2,

    /// Playing, waiting for the decoder to refill
    Buffering = 3,

    Playing = 4,

    Paused = 5,

    /// Teardown in progress
    Stopping = 6,

    Stopped = 7,

    /// The source ran out of data
    EndOfStream = 8,

    /// A fatal collaborator failure occurred
    Error = 9,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 10] = [
        LifecycleState::Initial,
        LifecycleState::SourceAttached,
        LifecycleState::Ready,
        LifecycleState::Buffering,
        LifecycleState::Playing,
        LifecycleState::Paused,
        LifecycleState::Stopping,
        LifecycleState::Stopped,
        LifecycleState::EndOfStream,
        LifecycleState::Error,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Whether the table allows moving from `self` to `target`
    pub fn can_transition_to(self, target: LifecycleState) -> bool {
        use LifecycleState::*;

        match (self, target) {
            (Stopped | Error, _) => false,
            (_, Error) => true,
            (Initial, SourceAttached) => true,
            (SourceAttached, Ready) => true,
            (Ready, Playing) => true,
            (Playing, Buffering | Paused | EndOfStream) => true,
            (Buffering, Playing | Paused | EndOfStream) => true,
            (Paused, Playing | EndOfStream) => true,
            (EndOfStream, SourceAttached | Stopping) => true,
            (Initial | SourceAttached | Ready | Playing | Buffering | Paused, Stopping) => true,
            (Stopping, Stopped) => true,
            _ => false,
        }
    }

    /// Stopped, Error and EndOfStream end active playback
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Error | LifecycleState::EndOfStream)
    }

    /// Playing or Buffering
    pub fn is_running(self) -> bool {
        matches!(self, LifecycleState::Playing | LifecycleState::Buffering)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An accepted transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub previous: LifecycleState,
    pub current: LifecycleState,
}

/// Validated, linearizable lifecycle state holder
pub struct StateMachine {
    current: AtomicU8,
    previous: AtomicU8,

    /// Serializes writers; readers go straight to the atomics
    transition_lock: Mutex<()>,

    rejected: AtomicU64,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: AtomicU8::new(LifecycleState::Initial as u8),
            previous: AtomicU8::new(LifecycleState::Initial as u8),
            transition_lock: Mutex::new(()),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> LifecycleState {
        Self::decode(self.current.load(Ordering::Acquire))
    }

    pub fn previous(&self) -> LifecycleState {
        Self::decode(self.previous.load(Ordering::Acquire))
    }

    /// Number of requests refused by the transition table
    pub fn rejected_transitions(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Apply `target` if the table allows it
    ///
    /// Returns the accepted change, or `None` with both states untouched.
    pub fn request_transition(&self, target: LifecycleState) -> Option<StateChange> {
        let _guard = self.transition_lock.lock();
        let current = self.current();

        if !current.can_transition_to(target) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            log::warn!("Rejected state transition {} -> {}", current, target);
            return None;
        }

        self.previous.store(current as u8, Ordering::Release);
        self.current.store(target as u8, Ordering::Release);
        log::info!("State transition {} -> {}", current, target);

        Some(StateChange { previous: current, current: target })
    }

    fn decode(value: u8) -> LifecycleState {
        // Only valid discriminants are ever stored.
        LifecycleState::from_u8(value).unwrap_or(LifecycleState::Error)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
