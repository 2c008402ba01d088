//! State shared by the facade and the controller thread
//!
//! Facade-initiated transitions run on the caller's thread. Reactions to
//! queued records run on the controller thread through the same methods, so
//! every transition goes through `PlayerCore::transition`.

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::decoder::{
    Decoder, FrameInfo, FrameInfoEx, Source, SourceOpener, SourceType, StreamDescriptor, StreamType,
};
use crate::player::controller::{CancellationToken, Controller};
use crate::player::{
    EventDispatcher, EventQueue, EventRecord, LifecycleState, PlayerConfig, SourceEvents, StateMachine,
};
use crate::utils::error::{AvPlayerError, Result};

/// The attached source and the player-owned view of it
pub(crate) struct AttachedSource {
    pub source: Arc<dyn Source>,
    pub decoder: Arc<dyn Decoder>,
    pub streams: Vec<StreamDescriptor>,
    /// Stream indices enabled on the source
    pub enabled: BTreeSet<u32>,
}

/// Source queued for auto-play-next
#[derive(Debug, Clone)]
pub(crate) struct PendingSource {
    pub path: String,
    pub source_type: SourceType,
}

pub(crate) struct PlayerCore {
    pub config: PlayerConfig,
    pub state: StateMachine,
    pub queue: Arc<EventQueue>,
    pub dispatcher: EventDispatcher,
    pub cancel: CancellationToken,

    opener: Arc<dyn SourceOpener>,
    source: RwLock<Option<AttachedSource>>,
    next_source: Mutex<Option<PendingSource>>,

    /// Serializes `stop` across host threads
    stop_lock: ReentrantMutex<()>,

    /// Join handle of the controller; held while joining
    controller: Mutex<Option<Controller>>,
    controller_spawned: AtomicBool,
    controller_thread: Mutex<Option<ThreadId>>,

    /// Highest decoder clock value handed out, in ms
    last_time: AtomicU64,
}

impl PlayerCore {
    pub fn new(config: PlayerConfig, opener: Arc<dyn SourceOpener>) -> Self {
        let dispatcher = EventDispatcher::new(config.event_replacement.clone());
        Self {
            config,
            state: StateMachine::new(),
            queue: Arc::new(EventQueue::new()),
            dispatcher,
            cancel: CancellationToken::new(),
            opener,
            source: RwLock::new(None),
            next_source: Mutex::new(None),
            stop_lock: ReentrantMutex::new(()),
            controller: Mutex::new(None),
            controller_spawned: AtomicBool::new(false),
            controller_thread: Mutex::new(None),
            last_time: AtomicU64::new(0),
        }
    }

    /// Reporting handle for the current source generation
    pub fn source_events(&self) -> SourceEvents {
        SourceEvents::for_source(Arc::clone(&self.queue), self.dispatcher.source_id())
    }

    /// Whether a record tagged with `source_id` belongs to the attached source
    pub fn is_current_source(&self, source_id: i32) -> bool {
        source_id == self.dispatcher.source_id()
    }

    /// Apply a transition and announce it
    ///
    /// The host is notified synchronously and the controller through the
    /// queue, both after the transition lock has been released.
    pub fn transition(&self, target: LifecycleState) -> bool {
        match self.state.request_transition(target) {
            Some(change) => {
                self.dispatcher.on_state_changed(change);
                self.queue.push(EventRecord::StateChanged(change));
                true
            }
            None => false,
        }
    }

    fn transition_or_err(&self, target: LifecycleState) -> Result<()> {
        let from = self.state.current();
        if self.transition(target) {
            Ok(())
        } else {
            Err(AvPlayerError::InvalidTransition { from, to: target })
        }
    }

    pub fn add_source(self: &Arc<Self>, path: &str, source_type: SourceType) -> Result<()> {
        if path.is_empty() {
            return Err(AvPlayerError::InvalidInput("source path is empty".to_string()));
        }
        if self.state.current() != LifecycleState::Initial || self.source.read().is_some() {
            return Err(AvPlayerError::SourceAlreadyAttached);
        }
        if !self.opener.supports(source_type) {
            return Err(AvPlayerError::UnsupportedSourceType(source_type));
        }
        self.ensure_controller_running()?;

        log::info!("Adding {:?} source {}", source_type, path);
        let source = match self.opener.open(path, source_type, self.source_events()) {
            Ok(source) => source,
            Err(e) => {
                log::error!("Failed to open {}: {}", path, e);
                self.transition(LifecycleState::Error);
                return Err(e);
            }
        };

        {
            let mut slot = self.source.write();
            if slot.is_some() {
                let _ = source.stop();
                return Err(AvPlayerError::SourceAlreadyAttached);
            }
            *slot = Some(AttachedSource {
                decoder: source.decoder(),
                streams: source.streams(),
                source: Arc::clone(&source),
                enabled: BTreeSet::new(),
            });
        }

        if !self.transition(LifecycleState::SourceAttached) {
            // Stopped or faulted while opening
            self.source.write().take();
            if let Err(e) = source.stop() {
                log::warn!("Failed to stop discarded source: {}", e);
            }
            return Err(AvPlayerError::InvalidState(self.state.current()));
        }
        Ok(())
    }

    fn with_attached<T>(&self, f: impl FnOnce(&AttachedSource) -> Result<T>) -> Result<T> {
        let slot = self.source.read();
        let attached = slot.as_ref().ok_or(AvPlayerError::NoSource)?;
        f(attached)
    }

    pub fn stream_count(&self) -> Result<usize> {
        self.with_attached(|attached| Ok(attached.streams.len()))
    }

    pub fn stream_info(&self, index: u32) -> Result<StreamDescriptor> {
        self.with_attached(|attached| {
            attached.streams.get(index as usize).cloned().ok_or(AvPlayerError::StreamIndexOutOfRange {
                index,
                count: attached.streams.len(),
            })
        })
    }

    pub fn enable_stream(&self, index: u32) -> Result<()> {
        {
            let mut slot = self.source.write();
            let attached = slot.as_mut().ok_or(AvPlayerError::NoSource)?;

            let state = self.state.current();
            if !matches!(state, LifecycleState::SourceAttached | LifecycleState::Ready) {
                return Err(AvPlayerError::InvalidState(state));
            }

            let stream_index = attached.streams.get(index as usize)
                .map(|s| s.index)
                .ok_or(AvPlayerError::StreamIndexOutOfRange { index, count: attached.streams.len() })?;

            if attached.enabled.contains(&stream_index) {
                return Ok(());
            }
            attached.source.enable_stream(stream_index)?;
            attached.enabled.insert(stream_index);
            log::debug!("Enabled stream {}", stream_index);
        }

        if self.state.current() == LifecycleState::SourceAttached {
            self.transition(LifecycleState::Ready);
        }
        Ok(())
    }

    /// Pick streams by type and the configured language
    ///
    /// Returns whether at least one stream ended up enabled. A source without
    /// any streams is stopped.
    pub fn auto_select_streams(&self) -> Result<bool> {
        let streams = self.with_attached(|attached| Ok(attached.streams.clone()))?;
        if streams.is_empty() {
            log::warn!("Source has no streams, stopping");
            self.stop()?;
            return Ok(false);
        }

        let language = self.config.default_language;
        let matches_language = |s: &StreamDescriptor| s.language().is_some_and(|l| language.accepts(l));

        let video = streams.iter().position(|s| s.stream_type() == StreamType::Video);
        let audio = streams.iter()
            .position(|s| s.stream_type() == StreamType::Audio && matches_language(s));
        let text = streams.iter()
            .rposition(|s| s.stream_type() == StreamType::TimedText && matches_language(s));

        let chosen: Vec<usize> = [video, audio, text].into_iter().flatten().collect();
        if chosen.is_empty() {
            log::warn!("No stream matches language '{}', nothing selected", language);
            return Ok(false);
        }

        for position in chosen {
            self.enable_stream(position as u32)?;
        }
        Ok(true)
    }

    /// Ready -> Playing, starting the source first
    ///
    /// Never touches the controller slot, so it is safe on the controller
    /// thread.
    pub fn start_playback(&self) -> Result<()> {
        let source = self.with_attached(|attached| Ok(Arc::clone(&attached.source)))?;
        source.start()?;
        self.transition_or_err(LifecycleState::Playing)
    }

    /// Select streams and start, as done for auto-start and auto-play-next
    pub fn auto_play(&self) -> Result<()> {
        if self.auto_select_streams()? {
            self.start_playback()?;
        }
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        match self.state.current() {
            LifecycleState::Initial => Err(AvPlayerError::NoSource),
            LifecycleState::SourceAttached => Err(AvPlayerError::NoStreamEnabled),
            LifecycleState::Playing | LifecycleState::Buffering => Ok(()),
            LifecycleState::Paused => self.resume(),
            LifecycleState::Ready => self.start_playback(),
            state => Err(AvPlayerError::InvalidState(state)),
        }
    }

    pub fn pause(&self) -> Result<()> {
        match self.state.current() {
            LifecycleState::Playing | LifecycleState::Buffering => {
                self.transition_or_err(LifecycleState::Paused)
            }
            LifecycleState::Paused => Ok(()),
            state => Err(AvPlayerError::InvalidState(state)),
        }
    }

    pub fn resume(&self) -> Result<()> {
        match self.state.current() {
            LifecycleState::Paused => self.transition_or_err(LifecycleState::Playing),
            LifecycleState::Playing | LifecycleState::Buffering => Ok(()),
            state => Err(AvPlayerError::InvalidState(state)),
        }
    }

    /// Stop playback and tear down the controller and the source
    ///
    /// Host callers return only once the player is Stopped (or Error). The
    /// controller thread skips the lock since a host caller holding it may be
    /// joining the controller.
    pub fn stop(&self) -> Result<()> {
        let _serialized = (!self.on_controller_thread()).then(|| self.stop_lock.lock());

        match self.state.current() {
            LifecycleState::Stopped => return Ok(()),
            LifecycleState::Error | LifecycleState::Stopping => {
                self.teardown();
                return Ok(());
            }
            _ => {}
        }

        if !self.transition(LifecycleState::Stopping) {
            let state = self.state.current();
            return match state {
                LifecycleState::Stopped => Ok(()),
                LifecycleState::Error | LifecycleState::Stopping => {
                    self.teardown();
                    Ok(())
                }
                _ => Err(AvPlayerError::InvalidTransition { from: state, to: LifecycleState::Stopping }),
            };
        }

        self.teardown();
        self.transition_or_err(LifecycleState::Stopped)
    }

    /// Stop the controller and the source without touching the state
    pub fn teardown(&self) {
        self.shutdown_controller();
        self.stop_source();
    }

    fn stop_source(&self) {
        let source = self.source.read().as_ref().map(|attached| Arc::clone(&attached.source));
        if let Some(source) = source {
            if let Err(e) = source.stop() {
                log::warn!("Source failed to stop: {}", e);
            }
        }
    }

    pub fn on_controller_thread(&self) -> bool {
        *self.controller_thread.lock() == Some(thread::current().id())
    }

    pub fn register_controller_thread(&self) {
        *self.controller_thread.lock() = Some(thread::current().id());
    }

    /// Cancel the controller and wait for it to exit
    ///
    /// From the controller thread itself this only cancels.
    pub fn shutdown_controller(&self) {
        self.cancel.cancel();
        self.queue.interrupt();

        if self.on_controller_thread() {
            return;
        }

        let mut slot = self.controller.lock();
        if let Some(controller) = slot.take() {
            if let Err(e) = controller.join() {
                log::error!("{}", e);
            }
        }
    }

    /// Spawn the controller unless it has been spawned before
    pub fn ensure_controller_running(self: &Arc<Self>) -> Result<()> {
        if self.on_controller_thread() {
            return Ok(());
        }

        let mut slot = self.controller.lock();
        if self.controller_spawned() {
            return Ok(());
        }
        *slot = Some(Controller::spawn(Arc::clone(self))?);
        self.controller_spawned.store(true, Ordering::Release);
        Ok(())
    }

    pub fn controller_spawned(&self) -> bool {
        self.controller_spawned.load(Ordering::Acquire)
    }

    pub fn set_next_source(&self, path: &str, source_type: SourceType) -> Result<()> {
        if path.is_empty() {
            return Err(AvPlayerError::InvalidInput("source path is empty".to_string()));
        }
        if !self.opener.supports(source_type) {
            return Err(AvPlayerError::UnsupportedSourceType(source_type));
        }

        *self.next_source.lock() = Some(PendingSource {
            path: path.to_string(),
            source_type,
        });
        if self.state.current() == LifecycleState::EndOfStream {
            self.queue.push(EventRecord::AutoPlayNext);
        }
        Ok(())
    }

    pub fn has_next_source(&self) -> bool {
        self.next_source.lock().is_some()
    }

    /// Replace the finished source with the pending one and play it
    ///
    /// Returns `Ok(false)` when there was nothing to advance to.
    pub fn advance_to_next_source(&self) -> Result<bool> {
        if self.state.current() != LifecycleState::EndOfStream {
            return Ok(false);
        }
        let Some(pending) = self.next_source.lock().take() else {
            return Ok(false);
        };

        log::info!("Advancing to next source {}", pending.path);
        let next_id = self.dispatcher.source_id() + 1;
        let events = SourceEvents::for_source(Arc::clone(&self.queue), next_id);
        let source = self.opener.open(&pending.path, pending.source_type, events)?;
        let previous = self.source.write().replace(AttachedSource {
            decoder: source.decoder(),
            streams: source.streams(),
            source,
            enabled: BTreeSet::new(),
        });
        if let Some(previous) = previous {
            if let Err(e) = previous.source.stop() {
                log::warn!("Finished source failed to stop: {}", e);
            }
        }

        self.last_time.store(0, Ordering::Release);
        let source_id = self.dispatcher.advance_source();
        log::debug!("Source generation is now {}", source_id);

        self.transition_or_err(LifecycleState::SourceAttached)?;
        self.auto_play()?;
        Ok(true)
    }

    fn running_decoder(&self) -> Option<Arc<dyn Decoder>> {
        if !self.state.current().is_running() {
            return None;
        }
        self.source.read().as_ref().map(|attached| Arc::clone(&attached.decoder))
    }

    pub fn audio_data(&self) -> Option<FrameInfo> {
        self.running_decoder()?.audio_frame()
    }

    pub fn video_data(&self) -> Option<FrameInfo> {
        self.running_decoder()?.video_frame()
    }

    pub fn video_data_ex(&self) -> Option<FrameInfoEx> {
        self.running_decoder()?.video_frame_ex()
    }

    pub fn current_time(&self) -> u64 {
        match self.running_decoder() {
            Some(decoder) => {
                let now = decoder.current_time();
                self.last_time.fetch_max(now, Ordering::AcqRel).max(now)
            }
            None => self.last_time.load(Ordering::Acquire),
        }
    }

    pub fn is_active(&self) -> bool {
        self.source.read().is_some() && !self.state.current().is_terminal()
    }

    pub fn enabled_streams(&self) -> Vec<u32> {
        self.source.read().as_ref()
            .map(|attached| attached.enabled.iter().copied().collect())
            .unwrap_or_default()
    }
}
