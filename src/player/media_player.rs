//! Public player API
//!
//! `AvPlayer` is the operation surface handed to the host. Every method can
//! be called from any thread. Lifecycle reads never block; transitions are
//! validated against the state table and announced to the host.

use std::sync::Arc;

use log::info;

use crate::decoder::{FrameInfo, FrameInfoEx, ScriptedOpener, SourceOpener, SourceType, StreamDescriptor};
use crate::player::shared::PlayerCore;
use crate::player::{
    EventHandler, EventReplacement, LifecycleState, PlayerConfig, PlayerEvent, SourceEvents,
};
use crate::utils::error::Result;

/// Builder for `AvPlayer`
pub struct AvPlayerBuilder {
    config: PlayerConfig,
    opener: Option<Arc<dyn SourceOpener>>,
}

impl AvPlayerBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: PlayerConfig::default(),
            opener: None,
        }
    }

    /// Set player configuration
    pub fn with_config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the collaborator that opens sources
    ///
    /// Defaults to a `ScriptedOpener` with one audio and one video stream.
    pub fn with_opener(mut self, opener: Arc<dyn SourceOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Deliver events synchronously to `handler` instead of queueing them
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.config.event_replacement = EventReplacement::Handler(handler);
        self
    }

    /// Build the player
    pub fn build(self) -> Result<AvPlayer> {
        let opener = self.opener.unwrap_or_else(|| Arc::new(ScriptedOpener::av_clip()));
        info!(
            "Initializing player (auto start: {}, language: '{}')",
            self.config.auto_start, self.config.default_language
        );

        Ok(AvPlayer {
            core: Arc::new(PlayerCore::new(self.config, opener)),
        })
    }
}

impl Default for AvPlayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateful media player
pub struct AvPlayer {
    core: Arc<PlayerCore>,
}

impl AvPlayer {
    /// Create a player with default settings
    pub fn new() -> Result<Self> {
        AvPlayerBuilder::new().build()
    }

    pub fn builder() -> AvPlayerBuilder {
        AvPlayerBuilder::new()
    }

    /// Attach the media at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - File path or URL, must not be empty
    /// * `source_type` - Kind of source
    ///
    /// Only one source can be attached. The controller thread is spawned here
    /// so collaborator faults are handled from the moment the source exists.
    /// If the collaborator fails to open the source the player moves to
    /// `Error`.
    pub fn add_source(&self, path: &str, source_type: SourceType) -> Result<()> {
        self.core.add_source(path, source_type)
    }

    /// Number of streams in the attached source
    pub fn stream_count(&self) -> Result<usize> {
        self.core.stream_count()
    }

    /// Descriptor of the stream at `index`
    pub fn stream_info(&self, index: u32) -> Result<StreamDescriptor> {
        self.core.stream_info(index)
    }

    /// Enable decoding of the stream at `index`
    ///
    /// Enabling an already enabled stream succeeds. The first enabled stream
    /// makes the player `Ready`.
    pub fn enable_stream(&self, index: u32) -> Result<()> {
        self.core.enable_stream(index)
    }

    /// Start playback, or resume it when paused
    pub fn start(&self) -> Result<()> {
        self.core.start()
    }

    pub fn pause(&self) -> Result<()> {
        self.core.pause()
    }

    pub fn resume(&self) -> Result<()> {
        self.core.resume()
    }

    /// Stop playback and join the controller thread
    ///
    /// Stopping a stopped player succeeds. From an event handler the
    /// controller is cancelled but not joined.
    pub fn stop(&self) -> Result<()> {
        self.core.stop()
    }

    /// Next decoded audio frame, if playing and one is ready
    pub fn audio_data(&self) -> Option<FrameInfo> {
        self.core.audio_data()
    }

    /// Next decoded video frame, if playing and one is ready
    pub fn video_data(&self) -> Option<FrameInfo> {
        self.core.video_data()
    }

    pub fn video_data_ex(&self) -> Option<FrameInfoEx> {
        self.core.video_data_ex()
    }

    /// Whether a source is attached and playback has not ended
    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Playback position in milliseconds; never decreases for a given source
    pub fn current_time(&self) -> u64 {
        self.core.current_time()
    }

    pub fn state(&self) -> LifecycleState {
        self.core.state.current()
    }

    pub fn previous_state(&self) -> LifecycleState {
        self.core.state.previous()
    }

    /// Next queued event when no replacement handler is registered
    pub fn poll_event(&self) -> Option<PlayerEvent> {
        self.core.dispatcher.poll()
    }

    /// Swap the event sink at runtime
    pub fn set_event_handler(&self, replacement: EventReplacement) {
        self.core.dispatcher.set_handler(replacement);
    }

    /// Queue a source to play once the current one reaches its end
    pub fn set_next_source(&self, path: &str, source_type: SourceType) -> Result<()> {
        self.core.set_next_source(path, source_type)
    }

    /// Reporting handle for the attached source's collaborators
    pub fn source_events(&self) -> SourceEvents {
        self.core.source_events()
    }

    /// Indices of the streams enabled on the attached source
    pub fn enabled_streams(&self) -> Vec<u32> {
        self.core.enabled_streams()
    }

    /// Generation of the attached source, 0 for the first one
    pub fn source_id(&self) -> i32 {
        self.core.dispatcher.source_id()
    }

    /// Number of transitions refused by the state table
    pub fn rejected_transitions(&self) -> u64 {
        self.core.state.rejected_transitions()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.core.config
    }
}

impl Drop for AvPlayer {
    fn drop(&mut self) {
        self.core.teardown();
    }
}
