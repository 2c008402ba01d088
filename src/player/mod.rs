//! Player control core
//!
//! This module owns the player lifecycle: the state machine, the internal
//! event queue drained by the controller thread, the buffering gate and the
//! dispatcher that notifies the host. `AvPlayer` is the public surface.

mod buffering;
mod controller;
mod dispatcher;
mod events;
mod media_player;
mod shared;
mod state;

pub use buffering::{BufferingMonitor, BufferingSignal};
pub use controller::{CancellationToken, CONTROLLER_THREAD_NAME};
pub use dispatcher::{
    EventData, EventDispatcher, EventHandler, EventId, EventReplacement, PlayerEvent, SourceEvents,
};
pub use events::{EventKind, EventQueue, EventRecord, WaitOutcome};
pub use media_player::{AvPlayer, AvPlayerBuilder};
pub use state::{LifecycleState, StateChange, StateMachine};

use crate::decoder::LanguageCode;
use crate::utils::error::Result;
use crate::utils::{BufferingSettings, Config, ControllerSettings};

/// Immutable player configuration
///
/// Taken once when the player is built. The event handler can still be
/// swapped later through `AvPlayer::set_event_handler`.
#[derive(Debug, Clone, Default)]
pub struct PlayerConfig {
    /// Select streams and start playing as soon as a source is attached
    pub auto_start: bool,

    /// Preferred language for audio and timed-text selection
    pub default_language: LanguageCode,

    /// Controller thread settings
    pub controller: ControllerSettings,

    /// Buffering gate watermarks
    pub buffering: BufferingSettings,

    /// Synchronous handler replacing the polling surface
    pub event_replacement: EventReplacement,
}

impl PlayerConfig {
    /// Build from the file/environment configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            auto_start: config.player.auto_start,
            default_language: LanguageCode::new(&config.player.default_language)?,
            controller: config.controller,
            buffering: config.buffering,
            event_replacement: EventReplacement::None,
        })
    }

    pub fn with_handler(mut self, handler: std::sync::Arc<dyn EventHandler>) -> Self {
        self.event_replacement = EventReplacement::Handler(handler);
        self
    }
}
