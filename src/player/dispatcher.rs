//! Host notification
//!
//! `EventDispatcher` is the one place events leave the core. With a
//! replacement handler registered the handler is called synchronously,
//! otherwise events are queued for `AvPlayer::poll_event`.
//!
//! `SourceEvents` is the producer side handed to collaborators. It never
//! reacts inline; it only queues records for the controller.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use crate::player::{EventQueue, EventRecord, LifecycleState, StateChange};

/// Host-facing event identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventId {
    StateStop,
    StateReady,
    StatePlay,
    StatePause,
    StateBuffering,
    TimedTextDelivery,
    WarningId,
    Encryption,
    DrmError,
    /// Host-defined id
    Other(i32),
}

impl EventId {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0x01 => EventId::StateStop,
            0x02 => EventId::StateReady,
            0x03 => EventId::StatePlay,
            0x04 => EventId::StatePause,
            0x05 => EventId::StateBuffering,
            0x10 => EventId::TimedTextDelivery,
            0x20 => EventId::WarningId,
            0x30 => EventId::Encryption,
            0x40 => EventId::DrmError,
            other => EventId::Other(other),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            EventId::StateStop => 0x01,
            EventId::StateReady => 0x02,
            EventId::StatePlay => 0x03,
            EventId::StatePause => 0x04,
            EventId::StateBuffering => 0x05,
            EventId::TimedTextDelivery => 0x10,
            EventId::WarningId => 0x20,
            EventId::Encryption => 0x30,
            EventId::DrmError => 0x40,
            EventId::Other(raw) => raw,
        }
    }

    /// Host event for entering `state`, if the host is told about it
    pub fn for_state(state: LifecycleState) -> Option<Self> {
        match state {
            LifecycleState::Ready => Some(EventId::StateReady),
            LifecycleState::Playing => Some(EventId::StatePlay),
            LifecycleState::Paused => Some(EventId::StatePause),
            LifecycleState::Buffering => Some(EventId::StateBuffering),
            LifecycleState::Stopped => Some(EventId::StateStop),
            _ => None,
        }
    }
}

/// Payload attached to a `PlayerEvent`
#[derive(Clone)]
pub enum EventData {
    /// Warning code reported by a collaborator
    Warning(u32),
    State(StateChange),
    /// Host-defined payload, passed through untouched
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for EventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventData::Warning(id) => f.debug_tuple("Warning").field(id).finish(),
            EventData::State(change) => f.debug_tuple("State").field(change).finish(),
            EventData::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

/// Event delivered to the host
#[derive(Debug, Clone)]
pub struct PlayerEvent {
    pub id: EventId,

    /// Generation of the source the event belongs to
    pub source_id: i32,

    pub data: Option<EventData>,
}

/// Synchronous event sink replacing the polling surface
///
/// Called on whichever thread emitted the event, with no player lock held.
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &PlayerEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&PlayerEvent) + Send + Sync,
{
    fn handle_event(&self, event: &PlayerEvent) {
        self(event)
    }
}

/// How events reach the host
#[derive(Clone, Default)]
pub enum EventReplacement {
    /// Queue events for polling
    #[default]
    None,
    Handler(Arc<dyn EventHandler>),
}

impl fmt::Debug for EventReplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventReplacement::None => f.write_str("None"),
            EventReplacement::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Single choke point for host notifications
pub struct EventDispatcher {
    handler: Mutex<Option<Arc<dyn EventHandler>>>,
    sender: Sender<PlayerEvent>,
    receiver: Receiver<PlayerEvent>,
    source_id: AtomicI32,
}

impl EventDispatcher {
    pub fn new(replacement: EventReplacement) -> Self {
        let (sender, receiver) = unbounded();
        let dispatcher = Self {
            handler: Mutex::new(None),
            sender,
            receiver,
            source_id: AtomicI32::new(0),
        };
        dispatcher.set_handler(replacement);
        dispatcher
    }

    /// Register or clear the replacement handler
    pub fn set_handler(&self, replacement: EventReplacement) {
        let mut handler = self.handler.lock();
        *handler = match replacement {
            EventReplacement::None => None,
            EventReplacement::Handler(h) => Some(h),
        };
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Deliver an event to the host
    pub fn emit(&self, id: EventId, data: Option<EventData>) {
        let event = PlayerEvent {
            id,
            source_id: self.source_id(),
            data,
        };

        // Clone out so the handler runs without the registration lock
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => handler.handle_event(&event),
            None => {
                log::debug!("Queueing {:?} for polling", event.id);
                // The receiver lives as long as self
                let _ = self.sender.send(event);
            }
        }
    }

    /// Tell the host about an accepted transition, if it is host-visible
    pub fn on_state_changed(&self, change: StateChange) {
        if let Some(id) = EventId::for_state(change.current) {
            self.emit(id, Some(EventData::State(change)));
        }
    }

    /// Next queued event, without blocking
    pub fn poll(&self) -> Option<PlayerEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn source_id(&self) -> i32 {
        self.source_id.load(Ordering::Acquire)
    }

    /// Start a new source generation, returning its id
    pub fn advance_source(&self) -> i32 {
        self.source_id.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Fault and progress reporting handle for collaborators
///
/// Every record is tagged with the source generation the handle was created
/// for. The controller ignores records from generations that have been
/// replaced by auto-play-next.
#[derive(Clone)]
pub struct SourceEvents {
    queue: Arc<EventQueue>,
    source_id: i32,
}

impl SourceEvents {
    /// Handle for the first source generation
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self::for_source(queue, 0)
    }

    pub fn for_source(queue: Arc<EventQueue>, source_id: i32) -> Self {
        Self { queue, source_id }
    }

    pub fn source_id(&self) -> i32 {
        self.source_id
    }

    fn push(&self, record: EventRecord) {
        self.queue.push(EventRecord::FromSource {
            source_id: self.source_id,
            record: Box::new(record),
        });
    }

    pub fn on_warning(&self, id: u32) {
        self.push(EventRecord::Warning { id });
    }

    /// Report a fatal failure; the player moves to Error
    pub fn on_error(&self) {
        self.push(EventRecord::Error);
    }

    pub fn on_end_of_stream(&self) {
        self.push(EventRecord::EndOfStream);
    }

    /// Report how many decoded frames are buffered
    pub fn on_buffering_level(&self, frames: u32) {
        self.push(EventRecord::BufferingChanged { frames });
    }

    pub fn on_custom(&self, id: i32, data: Option<EventData>) {
        self.push(EventRecord::Custom { id, data });
    }
}

impl fmt::Debug for SourceEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceEvents")
            .field("source_id", &self.source_id)
            .field("queued", &self.queue.len())
            .finish()
    }
}
