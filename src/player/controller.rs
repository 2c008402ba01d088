//! Controller thread
//!
//! One background thread per player drains the event queue, reacts to the
//! records (faults, end of stream, auto-play, buffering levels) and runs the
//! buffering gate. It idles on the queue with a bounded poll interval and
//! exits once cancelled, flushing whatever is still queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::internal_error;
use crate::player::shared::PlayerCore;
use crate::player::{
    BufferingMonitor, BufferingSignal, EventData, EventId, EventRecord, LifecycleState, WaitOutcome,
};
use crate::utils::error::{AvPlayerError, Result};

/// Name given to the controller thread
pub const CONTROLLER_THREAD_NAME: &str = "avplayer-controller";

/// Shared stop flag checked by the controller at loop boundaries
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handle to the running controller thread
pub(crate) struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Spawn the controller for `core`
    ///
    /// Priority and affinity are passed along as hints and logged; the thread
    /// itself runs with the platform defaults.
    pub fn spawn(core: Arc<PlayerCore>) -> Result<Self> {
        let settings = core.config.controller;
        info!(
            "Spawning {} (priority {}, affinity {:#x}, poll interval {} ms)",
            CONTROLLER_THREAD_NAME, settings.priority, settings.affinity, settings.poll_interval_ms
        );

        let handle = thread::Builder::new()
            .name(CONTROLLER_THREAD_NAME.to_string())
            .spawn(move || ControllerLoop::new(core).run())
            .map_err(|e| AvPlayerError::Controller(format!("failed to spawn controller: {}", e)))?;

        Ok(Self { handle })
    }

    /// Wait for the thread to exit
    pub fn join(self) -> Result<()> {
        self.handle.join().map_err(|_| internal_error!("controller thread panicked"))
    }
}

struct ControllerLoop {
    core: Arc<PlayerCore>,
    monitor: BufferingMonitor,
    poll_interval: Duration,
}

impl ControllerLoop {
    fn new(core: Arc<PlayerCore>) -> Self {
        let monitor = BufferingMonitor::new(core.config.buffering);
        let poll_interval = Duration::from_millis(core.config.controller.poll_interval_ms.max(1));
        Self { core, monitor, poll_interval }
    }

    fn run(mut self) {
        self.core.register_controller_thread();
        debug!("Controller started");

        loop {
            if self.core.cancel.is_cancelled() {
                break;
            }

            // A handler may stop the player halfway through a batch
            for record in self.core.queue.drain() {
                if self.core.cancel.is_cancelled() {
                    self.flush(record);
                } else {
                    self.react(record);
                }
            }

            if self.core.cancel.is_cancelled() {
                break;
            }

            self.check_buffering();

            if self.core.queue.wait(self.poll_interval) == WaitOutcome::Interrupted
                && self.core.cancel.is_cancelled()
            {
                break;
            }
        }

        // Nothing queued before cancellation is dropped silently
        for record in self.core.queue.drain() {
            self.flush(record);
        }
        debug!("Controller exited");
    }

    fn faulted(&self) -> bool {
        self.core.state.current() == LifecycleState::Error
    }

    fn react(&mut self, record: EventRecord) {
        match record {
            EventRecord::FromSource { source_id, record } => {
                if self.core.is_current_source(source_id) {
                    self.react(*record);
                } else {
                    debug!("Ignoring {:?} from replaced source {}", record.kind(), source_id);
                }
            }
            EventRecord::Warning { id } => {
                warn!("Source warning {}", id);
                self.core.dispatcher.emit(EventId::WarningId, Some(EventData::Warning(id)));
            }
            EventRecord::Error => {
                error!("Source reported a fatal error");
                self.core.transition(LifecycleState::Error);
            }
            EventRecord::EndOfStream => {
                if self.core.transition(LifecycleState::EndOfStream) && self.core.has_next_source() {
                    self.core.queue.push(EventRecord::AutoPlayNext);
                }
            }
            EventRecord::AutoPlayNext => {
                if self.faulted() {
                    return;
                }
                match self.core.advance_to_next_source() {
                    Ok(true) => self.monitor.reset(),
                    Ok(false) => debug!("No source to advance to"),
                    Err(e) => {
                        error!("Failed to advance to next source: {}", e);
                        self.core.transition(LifecycleState::Error);
                    }
                }
            }
            EventRecord::BufferingChanged { frames } => {
                self.monitor.record(frames);
            }
            EventRecord::StateChanged(change) => {
                debug!("Observed {} -> {}", change.previous, change.current);
                let attached = change.previous == LifecycleState::Initial
                    && change.current == LifecycleState::SourceAttached;
                if attached && self.core.config.auto_start && !self.faulted() {
                    if let Err(e) = self.core.auto_play() {
                        warn!("Auto-start failed: {}", e);
                    }
                }
            }
            EventRecord::Custom { id, data } => {
                self.core.dispatcher.emit(EventId::from_raw(id), data);
            }
        }
    }

    /// Deliver what can still be delivered after cancellation
    fn flush(&self, record: EventRecord) {
        match record {
            EventRecord::FromSource { source_id, record } => {
                if self.core.is_current_source(source_id) {
                    self.flush(*record);
                }
            }
            EventRecord::Warning { id } => {
                self.core.dispatcher.emit(EventId::WarningId, Some(EventData::Warning(id)));
            }
            EventRecord::Custom { id, data } => {
                self.core.dispatcher.emit(EventId::from_raw(id), data);
            }
            other => debug!("Dropping {:?} after shutdown", other.kind()),
        }
    }

    fn check_buffering(&self) {
        let state = self.core.state.current();
        if !state.is_running() {
            return;
        }

        match (self.monitor.current_signal(), state) {
            (BufferingSignal::Insufficient, LifecycleState::Playing) => {
                info!("Buffer ran dry, buffering");
                self.core.transition(LifecycleState::Buffering);
            }
            (BufferingSignal::Sufficient, LifecycleState::Buffering) => {
                info!("Buffer refilled, resuming playback");
                self.core.transition(LifecycleState::Playing);
            }
            _ => {}
        }
    }
}
