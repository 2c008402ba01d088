//! avplayer-core
//!
//! Control core of a media player: the lifecycle state machine, the
//! controller thread reacting to decoder events, the buffering gate and the
//! event delivery contract seen by the host. Demuxing and decoding are
//! provided by collaborators implementing the traits in [`decoder`].

pub mod decoder;
pub mod player;
pub mod utils;

pub use decoder::{
    Decoder, FrameInfo, FrameInfoEx, LanguageCode, ScriptedOpener, ScriptedSource, Source, SourceOpener,
    SourceType, StreamDescriptor, StreamType,
};
pub use player::{
    AvPlayer, AvPlayerBuilder, EventData, EventHandler, EventId, EventReplacement, LifecycleState,
    PlayerConfig, PlayerEvent, SourceEvents,
};
pub use utils::error::{AvPlayerError, Result};
