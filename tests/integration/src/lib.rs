//! Integration test utilities for avplayer-core
//!
//! This module provides common utilities for integration testing including:
//! - A fixture bundling a scripted opener, an event recorder and a temp dir
//! - Helpers for waiting on asynchronous state changes
//! - Frame feeding for the scripted source

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use avplayer_core::player::{EventHandler, EventId, PlayerConfig, PlayerEvent};
use avplayer_core::{AvPlayer, AvPlayerBuilder, LifecycleState, ScriptedOpener, ScriptedSource};

/// Upper bound for anything the controller thread has to do
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Test fixture for integration tests
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub opener: Arc<ScriptedOpener>,
    pub recorder: Arc<EventRecorder>,
}

impl TestFixture {
    /// Create a fixture around a one-audio, one-video clip
    pub fn new() -> Result<Self> {
        Self::with_opener(ScriptedOpener::av_clip())
    }

    pub fn with_opener(opener: ScriptedOpener) -> Result<Self> {
        init_test_logging();
        Ok(Self {
            temp_dir: TempDir::new()?,
            opener: Arc::new(opener),
            recorder: Arc::new(EventRecorder::default()),
        })
    }

    /// Get the path to the temporary directory
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a config file into the temp dir
    pub fn config_file(&self, contents: &str) -> Result<PathBuf> {
        let path = self.path().join("config.toml");
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Player delivering events to the fixture's recorder
    pub fn player(&self, config: PlayerConfig) -> Result<AvPlayer> {
        Ok(AvPlayerBuilder::new()
            .with_config(config)
            .with_opener(self.opener.clone())
            .with_event_handler(self.recorder.clone())
            .build()?)
    }

    /// Player queueing events for `poll_event`
    pub fn polling_player(&self, config: PlayerConfig) -> Result<AvPlayer> {
        Ok(AvPlayerBuilder::new()
            .with_config(config)
            .with_opener(self.opener.clone())
            .build()?)
    }

    /// The most recently opened scripted source
    pub fn source(&self) -> Result<Arc<ScriptedSource>> {
        self.opener.last_opened().ok_or_else(|| anyhow!("no source opened"))
    }
}

/// Event handler remembering everything it receives
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<PlayerEvent>>,
}

impl EventHandler for EventRecorder {
    fn handle_event(&self, event: &PlayerEvent) {
        self.events.lock().push(event.clone());
    }
}

impl EventRecorder {
    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    pub fn ids(&self) -> Vec<EventId> {
        self.events.lock().iter().map(|e| e.id).collect()
    }

    pub fn count(&self, id: EventId) -> usize {
        self.events.lock().iter().filter(|e| e.id == id).count()
    }

    /// Wait until at least `n` events with `id` arrived
    pub fn wait_for(&self, id: EventId, n: usize) -> bool {
        wait_until(|| self.count(id) >= n)
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// Poll `condition` until it holds or `SETTLE_TIMEOUT` passes
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + SETTLE_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub fn wait_for_state(player: &AvPlayer, state: LifecycleState) -> bool {
    wait_until(|| player.state() == state)
}

/// Push `count` audio and video frames, 40 ms apart, starting at `start_ms`
pub fn feed(source: &ScriptedSource, start_ms: u64, count: u64) {
    for i in 0..count {
        let timestamp = start_ms + i * 40;
        source.push_audio(source.make_audio_frame(timestamp));
        source.push_video(source.make_video_frame(timestamp));
    }
}

/// Attach the fixture clip, enable both streams and start
pub fn start_clip(player: &AvPlayer) -> Result<()> {
    player.add_source("clip.mp4", avplayer_core::SourceType::File)?;
    player.enable_stream(0)?;
    player.enable_stream(1)?;
    player.start()?;
    Ok(())
}

pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
    log::debug!("Test logging initialized");
}
