use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};

use crate::models::configuration::ConfigurationSpec;
use crate::models::error::RecorderError;
use crate::models::options::OptionSet;
use crate::models::state::{RecordingId, RecordingState};
use crate::models::stream_request::{StreamRequest, DEFAULT_BLOCK_SIZE};
use crate::traits::session_backend::SessionBackend;

const ANY_OPEN: [RecordingState; 3] = [RecordingState::New, RecordingState::Active, RecordingState::Stopped];
const WITH_DATA: [RecordingState; 2] = [RecordingState::Active, RecordingState::Stopped];

/// Value held by the lifecycle cell.
///
/// `Starting` and `Stopping` mark a transition whose remote call is in
/// flight. Only the caller that set them may move the cell out of them,
/// except `close`, which may overwrite anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Phase {
    New = 0,
    Active = 1,
    Stopped = 2,
    Closed = 3,
    Starting = 4,
    Stopping = 5,
}

impl Phase {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::New,
            1 => Self::Active,
            2 => Self::Stopped,
            4 => Self::Starting,
            5 => Self::Stopping,
            _ => Self::Closed,
        }
    }

    fn from_state(state: RecordingState) -> Self {
        match state {
            RecordingState::New => Self::New,
            RecordingState::Active => Self::Active,
            RecordingState::Stopped => Self::Stopped,
            RecordingState::Closed => Self::Closed,
        }
    }

    /// In-flight phases report the state they are moving to.
    fn public(self) -> RecordingState {
        match self {
            Self::New => RecordingState::New,
            Self::Active | Self::Starting => RecordingState::Active,
            Self::Stopped | Self::Stopping => RecordingState::Stopped,
            Self::Closed => RecordingState::Closed,
        }
    }

    fn is_in_flight(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }
}

/// Single atomic state word plus a wake-up channel for callers that need
/// an in-flight transition to finish.
struct LifecycleCell {
    phase: AtomicU8,
    wake_lock: Mutex<()>,
    settled: Condvar,
}

impl LifecycleCell {
    fn new(state: RecordingState) -> Self {
        Self {
            phase: AtomicU8::new(Phase::from_state(state) as u8),
            wake_lock: Mutex::new(()),
            settled: Condvar::new(),
        }
    }

    fn load(&self) -> Phase {
        Phase::from_raw(self.phase.load(Ordering::SeqCst))
    }

    /// Current phase once no transition is in flight.
    fn settled(&self) -> Phase {
        let phase = self.load();
        if !phase.is_in_flight() {
            return phase;
        }
        let mut guard = self.wake_lock.lock();
        loop {
            let phase = self.load();
            if !phase.is_in_flight() {
                return phase;
            }
            self.settled.wait(&mut guard);
        }
    }

    fn compare_and_set(&self, from: Phase, to: Phase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn swap(&self, to: Phase) -> Phase {
        Phase::from_raw(self.phase.swap(to as u8, Ordering::SeqCst))
    }

    /// Leave an in-flight phase. Returns false if `close` got there first.
    fn finish(&self, from: Phase, to: Phase) -> bool {
        let committed = self.compare_and_set(from, to);
        self.wake_all();
        committed
    }

    fn wake_all(&self) {
        let _guard = self.wake_lock.lock();
        self.settled.notify_all();
    }
}

/// Moves the cell back to the source phase if the remote call unwinds.
struct TransitionGuard<'a> {
    cell: &'a LifecycleCell,
    in_flight: Phase,
    revert_to: Phase,
    armed: bool,
}

impl<'a> TransitionGuard<'a> {
    fn new(cell: &'a LifecycleCell, in_flight: Phase, revert_to: Phase) -> Self {
        Self {
            cell,
            in_flight,
            revert_to,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cell.finish(self.in_flight, self.revert_to);
        }
    }
}

/// A remote flight recording and its lifecycle.
///
/// Safe to drive from many threads at once (share it behind an `Arc`).
/// Exactly one caller wins each `start`/`stop` transition and issues the
/// remote call; the others observe a no-op. Dropping a recording closes it.
pub struct Recording<B: SessionBackend> {
    backend: Arc<B>,
    options: Arc<OptionSet>,
    configuration: Arc<ConfigurationSpec>,
    default_block_size: i64,
    id: AtomicI64,
    cell: LifecycleCell,
}

impl<B: SessionBackend> Recording<B> {
    /// A recording in state `New`. No remote call is made.
    pub fn new(backend: Arc<B>, options: OptionSet, configuration: ConfigurationSpec) -> Self {
        Self::from_parts(
            backend,
            Arc::new(options),
            Arc::new(configuration),
            DEFAULT_BLOCK_SIZE,
            RecordingId::UNASSIGNED,
            RecordingState::New,
        )
    }

    /// Block size used by [`open_stream_default`](Self::open_stream_default).
    pub fn with_default_block_size(mut self, block_size: i64) -> Self {
        self.default_block_size = block_size;
        self
    }

    fn from_parts(
        backend: Arc<B>,
        options: Arc<OptionSet>,
        configuration: Arc<ConfigurationSpec>,
        default_block_size: i64,
        id: RecordingId,
        state: RecordingState,
    ) -> Self {
        Self {
            backend,
            options,
            configuration,
            default_block_size,
            id: AtomicI64::new(id.get()),
            cell: LifecycleCell::new(state),
        }
    }

    /// Remote identifier, or [`RecordingId::UNASSIGNED`] before the first start.
    pub fn id(&self) -> RecordingId {
        RecordingId::new(self.id.load(Ordering::SeqCst))
    }

    pub fn state(&self) -> RecordingState {
        self.cell.load().public()
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn configuration(&self) -> &ConfigurationSpec {
        &self.configuration
    }

    /// Start (or restart) recording. Transitions: new/stopped → active.
    ///
    /// Already active: returns the current id without a remote call.
    pub fn start(&self) -> Result<RecordingId, RecorderError> {
        loop {
            match self.cell.settled() {
                from @ (Phase::New | Phase::Stopped) => {
                    if self.cell.compare_and_set(from, Phase::Starting) {
                        return self.run_start(from);
                    }
                }
                Phase::Closed => {
                    return Err(RecorderError::invalid_state(RecordingState::Closed, &ANY_OPEN));
                }
                _ => return Ok(self.id()),
            }
        }
    }

    fn run_start(&self, from: Phase) -> Result<RecordingId, RecorderError> {
        let guard = TransitionGuard::new(&self.cell, Phase::Starting, from);
        let result = self.backend.start_recording(&self.options, &self.configuration);
        guard.disarm();
        match result {
            Ok(id) => {
                self.id.store(id.get(), Ordering::SeqCst);
                if self.cell.finish(Phase::Starting, Phase::Active) {
                    log::info!("recording {} started", id);
                    Ok(id)
                } else {
                    log::warn!("recording {} closed while starting, releasing remote session", id);
                    self.release_remote(id, true);
                    Err(RecorderError::invalid_state(RecordingState::Closed, &ANY_OPEN))
                }
            }
            Err(e) => {
                self.cell.finish(Phase::Starting, from);
                Err(e)
            }
        }
    }

    /// Stop recording. Transitions: active → stopped.
    ///
    /// New or already stopped: no-op.
    pub fn stop(&self) -> Result<(), RecorderError> {
        loop {
            match self.cell.settled() {
                Phase::Active => {
                    if self.cell.compare_and_set(Phase::Active, Phase::Stopping) {
                        return self.run_stop();
                    }
                }
                Phase::Closed => {
                    return Err(RecorderError::invalid_state(RecordingState::Closed, &ANY_OPEN));
                }
                _ => return Ok(()),
            }
        }
    }

    fn run_stop(&self) -> Result<(), RecorderError> {
        let id = self.id();
        let guard = TransitionGuard::new(&self.cell, Phase::Stopping, Phase::Active);
        let result = self.backend.stop_recording(id);
        guard.disarm();
        let settle_to = if result.is_ok() { Phase::Stopped } else { Phase::Active };
        if self.cell.finish(Phase::Stopping, settle_to) {
            if result.is_ok() {
                log::info!("recording {} stopped", id);
            }
        } else {
            log::warn!("recording {} closed while stopping, releasing remote session", id);
            self.release_remote(id, false);
        }
        result
    }

    /// Copy recorded data to `path` on the target host. State is unchanged.
    pub fn dump(&self, path: &str) -> Result<(), RecorderError> {
        let phase = self.cell.settled();
        if !phase.public().has_remote_data() {
            return Err(RecorderError::invalid_state(phase.public(), &WITH_DATA));
        }
        self.backend.dump_recording(self.id(), path)
    }

    /// Clone the remote session into a new, independently owned recording.
    ///
    /// With `stop`, the clone starts out stopped; otherwise it mirrors this
    /// recording's state.
    pub fn clone_recording(&self, stop: bool) -> Result<Recording<B>, RecorderError> {
        let phase = self.cell.settled();
        let state = phase.public();
        if !state.has_remote_data() {
            return Err(RecorderError::invalid_state(state, &WITH_DATA));
        }
        let new_id = self.backend.clone_recording(self.id(), stop)?;
        log::debug!("recording {} cloned as {}", self.id(), new_id);
        Ok(Self::from_parts(
            Arc::clone(&self.backend),
            Arc::clone(&self.options),
            Arc::clone(&self.configuration),
            self.default_block_size,
            new_id,
            if stop { RecordingState::Stopped } else { state },
        ))
    }

    /// Open a byte stream over a stopped recording's data.
    pub fn open_stream(
        &self,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        block_size: i64,
    ) -> Result<B::Stream, RecorderError> {
        let phase = self.cell.settled();
        if phase != Phase::Stopped {
            return Err(RecorderError::invalid_state(phase.public(), &[RecordingState::Stopped]));
        }
        let request = StreamRequest::new(start_time, end_time, block_size);
        self.backend.open_stream(self.id(), &request)
    }

    pub fn open_stream_default(
        &self,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<B::Stream, RecorderError> {
        self.open_stream(start_time, end_time, self.default_block_size)
    }

    /// Close the recording. Transitions: any → closed.
    ///
    /// Never fails. An active recording is stopped and released remotely on a
    /// best-effort basis; remote failures are logged and dropped.
    pub fn close(&self) {
        let previous = self.cell.swap(Phase::Closed);
        self.cell.wake_all();
        match previous {
            Phase::Active => self.release_remote(self.id(), true),
            Phase::Starting | Phase::Stopping => {
                log::debug!("recording closed during a transition, its owner releases the session");
            }
            _ => {}
        }
    }

    fn release_remote(&self, id: RecordingId, stop_first: bool) {
        if stop_first {
            if let Err(e) = self.backend.stop_recording(id) {
                log::warn!("ignoring failure to stop recording {} on close: {}", id, e);
                return;
            }
        }
        if let Err(e) = self.backend.close_recording(id) {
            log::warn!("ignoring failure to close recording {}: {}", id, e);
        }
    }
}

impl<B: SessionBackend> fmt::Debug for Recording<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recording")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<B: SessionBackend> Drop for Recording<B> {
    fn drop(&mut self) {
        self.close();
    }
}
